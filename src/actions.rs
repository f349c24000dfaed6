//! File operations applied to the generated application tree.
//! Every path is relative to the application root. Operations mutate the
//! real filesystem and report what they did through the `log` facade.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use regex::{NoExpand, Regex};

use crate::constants::KEEP_FILE;
use crate::error::{Error, Result};
use crate::renderer::{MiniJinjaRenderer, TemplateRenderer};
use crate::shell::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
use crate::store::TemplateStore;

/// Text to look for in a file: either a literal string or a regular expression.
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    /// # Errors
    /// * `Error::RegexError` if `pattern` is not a valid regular expression
    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Byte range of the first match.
    pub fn find(&self, text: &str) -> Option<Range<usize>> {
        match self {
            Pattern::Literal(needle) => text.find(needle).map(|start| start..start + needle.len()),
            Pattern::Regex(regex) => regex.find(text).map(|m| m.range()),
        }
    }

    /// Replaces matches of the pattern; `None` when nothing matched.
    /// Regex replacements are inserted literally, without `$group` expansion.
    pub fn replace(&self, text: &str, replacement: &str, occurrence: Occurrence) -> Option<String> {
        self.find(text)?;
        let replaced = match (self, occurrence) {
            (Pattern::Literal(needle), Occurrence::First) => text.replacen(needle, replacement, 1),
            (Pattern::Literal(needle), Occurrence::All) => text.replace(needle, replacement),
            (Pattern::Regex(regex), Occurrence::First) => {
                regex.replace(text, NoExpand(replacement)).into_owned()
            }
            (Pattern::Regex(regex), Occurrence::All) => {
                regex.replace_all(text, NoExpand(replacement)).into_owned()
            }
        };
        Some(replaced)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Literal(needle) => needle,
            Pattern::Regex(regex) => regex.as_str(),
        }
    }
}

impl From<&str> for Pattern {
    fn from(text: &str) -> Self {
        Pattern::literal(text)
    }
}

/// Where injected text goes relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Before,
    After,
}

/// How many matches `replace_pattern` rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    First,
    All,
}

/// The file operations layer bound to one application root.
pub struct Actions {
    root: PathBuf,
    store: Box<dyn TemplateStore>,
    renderer: Box<dyn TemplateRenderer>,
    runner: Box<dyn CommandRunner>,
    timeout: Option<Duration>,
}

impl Actions {
    /// Creates the file operations layer for one application tree.
    ///
    /// # Arguments
    /// * `root` - Application root every relative path is resolved against
    /// * `store` - Source of the templates `copy` and `render_template` read
    /// * `renderer` - Engine used by `render_template`
    /// * `runner` - Executes the commands issued through `run_external`
    ///
    /// # Returns
    /// * `Actions` - Layer with no external command timeout
    pub fn new<P: AsRef<Path>>(
        root: P,
        store: Box<dyn TemplateStore>,
        renderer: Box<dyn TemplateRenderer>,
        runner: Box<dyn CommandRunner>,
    ) -> Self {
        Self { root: root.as_ref().to_path_buf(), store, renderer, runner, timeout: None }
    }

    /// Actions rendering with MiniJinja and spawning real processes.
    pub fn system<P: AsRef<Path>>(root: P, store: Box<dyn TemplateStore>) -> Self {
        Self::new(root, store, Box::new(MiniJinjaRenderer::new()), Box::new(SystemRunner))
    }

    /// Sets the default timeout applied to every external command.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Absolute root of the application tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &dyn TemplateStore {
        &*self.store
    }

    fn resolve<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.root.join(path)
    }

    fn say_status(&self, status: &str, path: &Path) {
        let shown = path.strip_prefix(&self.root).unwrap_or(path);
        info!("{:>10}  {}", status, shown.display());
    }

    fn write(&self, target: &Path, content: &[u8]) -> Result<()> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, content).map_err(Error::IoError)
    }

    fn check_destination(&self, target: &Path, overwrite: bool) -> Result<bool> {
        let exists = target.exists();
        if exists && !overwrite {
            return Err(Error::AlreadyExists { path: target.display().to_string() });
        }
        Ok(exists)
    }

    /// Whether `path`, relative to the root, exists.
    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.resolve(path).exists()
    }

    /// Reads a file of the application tree as text.
    pub fn read<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        std::fs::read_to_string(self.resolve(path)).map_err(Error::IoError)
    }

    /// Materializes template `src` verbatim at `dest`.
    ///
    /// # Arguments
    /// * `src` - Template name in the store
    /// * `dest` - Destination relative to the root; missing parents are created
    /// * `overwrite` - Whether an existing destination may be replaced
    ///
    /// # Errors
    /// * `Error::AlreadyExists` if `dest` exists and `overwrite` is false; nothing is written
    /// * `Error::TemplateNotFound` if the store has no template `src`
    pub fn copy<P: AsRef<Path>>(&self, src: &str, dest: P, overwrite: bool) -> Result<()> {
        let target = self.resolve(dest);
        let existed = self.check_destination(&target, overwrite)?;
        let template = self.store.find(src)?;
        self.write(&target, template.bytes())?;
        self.say_status(if existed { "force" } else { "create" }, &target);
        Ok(())
    }

    /// Renders template `src` with `context` and writes the result to `dest`.
    ///
    /// # Errors
    /// * `Error::AlreadyExists` if `dest` exists and `overwrite` is false; nothing is written
    /// * `Error::TemplateError` on malformed syntax or an unresolved placeholder
    pub fn render_template<P: AsRef<Path>>(
        &self,
        src: &str,
        dest: P,
        context: &serde_json::Value,
        overwrite: bool,
    ) -> Result<()> {
        let target = self.resolve(dest);
        let existed = self.check_destination(&target, overwrite)?;
        let template = self.store.find(src)?;
        let rendered = self.renderer.render(template.name(), template.text()?, context)?;
        self.write(&target, rendered.as_bytes())?;
        self.say_status(if existed { "force" } else { "create" }, &target);
        Ok(())
    }

    /// Inserts `text` right before or after the first match of `anchor`.
    /// Does nothing when `text` already sits next to the anchor on that side.
    ///
    /// # Errors
    /// * `Error::NotFound` if `anchor` does not occur in the file
    pub fn inject_at<P: AsRef<Path>>(
        &self,
        path: P,
        text: &str,
        anchor: &Pattern,
        position: Position,
    ) -> Result<()> {
        let target = self.resolve(path);
        let content = std::fs::read_to_string(&target)?;
        let range = anchor.find(&content).ok_or_else(|| Error::NotFound {
            path: target.display().to_string(),
            pattern: anchor.as_str().to_string(),
        })?;

        let (already_present, at) = match position {
            Position::After => (content[range.end..].starts_with(text), range.end),
            Position::Before => (content[..range.start].ends_with(text), range.start),
        };
        if text.is_empty() || already_present {
            self.say_status("identical", &target);
            return Ok(());
        }

        let mut updated = String::with_capacity(content.len() + text.len());
        updated.push_str(&content[..at]);
        updated.push_str(text);
        updated.push_str(&content[at..]);
        self.write(&target, updated.as_bytes())?;
        self.say_status("inject", &target);
        Ok(())
    }

    /// Replaces the first or every match of `pattern` with `replacement`.
    ///
    /// # Errors
    /// * `Error::NotFound` if `pattern` does not occur in the file
    pub fn replace_pattern<P: AsRef<Path>>(
        &self,
        path: P,
        pattern: &Pattern,
        replacement: &str,
        occurrence: Occurrence,
    ) -> Result<()> {
        let target = self.resolve(path);
        let content = std::fs::read_to_string(&target)?;
        let updated = pattern.replace(&content, replacement, occurrence).ok_or_else(|| {
            Error::NotFound {
                path: target.display().to_string(),
                pattern: pattern.as_str().to_string(),
            }
        })?;
        self.write(&target, updated.as_bytes())?;
        self.say_status("gsub", &target);
        Ok(())
    }

    /// Adds `text` at the end of the file, creating it when absent.
    pub fn append<P: AsRef<Path>>(&self, path: P, text: &str) -> Result<()> {
        let target = self.resolve(path);
        let mut content = if target.exists() {
            std::fs::read_to_string(&target)?
        } else {
            String::new()
        };
        content.push_str(text);
        self.write(&target, content.as_bytes())?;
        self.say_status("append", &target);
        Ok(())
    }

    /// Adds `text` at the start of the file, creating it when absent.
    pub fn prepend<P: AsRef<Path>>(&self, path: P, text: &str) -> Result<()> {
        let target = self.resolve(path);
        let existing = if target.exists() {
            std::fs::read_to_string(&target)?
        } else {
            String::new()
        };
        let content = format!("{text}{existing}");
        self.write(&target, content.as_bytes())?;
        self.say_status("prepend", &target);
        Ok(())
    }

    /// Removes a file or directory; an absent target is not an error.
    pub fn remove_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let target = self.resolve(path);
        if target.is_dir() {
            std::fs::remove_dir_all(&target)?;
        } else if target.exists() {
            std::fs::remove_file(&target)?;
        } else {
            debug!("Nothing to remove at {}", target.display());
            return Ok(());
        }
        self.say_status("remove", &target);
        Ok(())
    }

    /// Creates a directory (and its parents); an existing directory is not an error.
    /// With `keep`, an empty `.keep` marker is written inside it when missing.
    pub fn ensure_directory<P: AsRef<Path>>(&self, path: P, keep: bool) -> Result<()> {
        let target = self.resolve(path);
        if target.is_dir() {
            self.say_status("exist", &target);
        } else {
            std::fs::create_dir_all(&target)?;
            self.say_status("create", &target);
        }

        let marker = target.join(KEEP_FILE);
        if keep && !marker.exists() {
            self.write(&marker, b"")?;
            self.say_status("create", &marker);
        }
        Ok(())
    }

    /// Marks a file as executable by everyone.
    pub fn make_executable<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let target = self.resolve(path);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut permissions = std::fs::metadata(&target)?.permissions();
            permissions.set_mode(permissions.mode() | 0o111);
            std::fs::set_permissions(&target, permissions)?;
        }
        #[cfg(not(unix))]
        std::fs::metadata(&target)?;
        self.say_status("chmod", &target);
        Ok(())
    }

    /// Runs an external program and waits for it.
    /// `cwd` defaults to the application root; a relative `cwd` is resolved against it.
    ///
    /// # Errors
    /// * `Error::ExternalCommandError` on a non-zero exit or timeout, carrying the captured output
    /// * `Error::IoError` if the program could not be started
    pub fn run_external<I, S>(&self, program: &str, args: I, cwd: Option<&Path>) -> Result<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let spec = CommandSpec {
            program: program.to_string(),
            args: args.into_iter().map(|a| a.as_ref().to_string()).collect(),
            cwd: cwd.map_or_else(|| self.root.clone(), |dir| self.resolve(dir)),
            timeout: self.timeout,
        };
        let command = spec.display();
        info!("{:>10}  {}", "run", command);

        let output = self.runner.run(&spec)?;
        if !output.success() {
            return Err(Error::ExternalCommandError {
                command,
                exit_code: output.exit_code,
                timed_out: output.timed_out,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_finds_first_match() {
        let pattern = Pattern::literal("end");
        assert_eq!(pattern.find("class A\nend\nend"), Some(8..11));
        assert_eq!(pattern.find("nothing"), None);
    }

    #[test]
    fn regex_replacement_is_literal() {
        let pattern = Pattern::regex(r"host: \w+").unwrap();
        let out = pattern.replace("host: a\nhost: b", "host: $1", Occurrence::All).unwrap();
        assert_eq!(out, "host: $1\nhost: $1");
    }

    #[test]
    fn replace_first_leaves_later_matches() {
        let pattern = Pattern::literal("false");
        let out = pattern.replace("false false", "true", Occurrence::First).unwrap();
        assert_eq!(out, "true false");
        assert!(pattern.replace("none", "x", Occurrence::First).is_none());
    }
}
