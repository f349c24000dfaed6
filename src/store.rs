//! Template lookup for the roll generator.
//! Templates are found by relative name in the built-in set compiled into
//! the binary, in a user supplied directory, or in an ordered overlay of both.

use crate::error::{Error, Result};
use include_dir::{include_dir, Dir};
use log::debug;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

static BUILTIN_TEMPLATES: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// A named template asset. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    content: Cow<'static, [u8]>,
}

impl Template {
    pub fn new(name: impl Into<String>, content: impl Into<Cow<'static, [u8]>>) -> Self {
        Self { name: name.into(), content: content.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.content
    }

    /// Returns the content as text, as required for rendering.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.content).map_err(|e| Error::TemplateError {
            template: self.name.clone(),
            reason: e.to_string(),
        })
    }
}

/// Read-only source of named templates.
pub trait TemplateStore {
    /// Returns the template registered under `name`.
    ///
    /// # Errors
    /// * `Error::TemplateNotFound` if no template has that name
    fn find(&self, name: &str) -> Result<Arc<Template>>;

    /// Lists every template name the store can resolve, sorted.
    fn names(&self) -> Vec<String>;
}

/// Rejects names that would escape the store root.
fn validate_name(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if name.is_empty() || escapes {
        return Err(Error::TemplateNotFound { name: name.to_string() });
    }
    Ok(path)
}

/// Templates shipped inside the binary.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedStore {
    dir: &'static Dir<'static>,
}

impl EmbeddedStore {
    pub fn new() -> Self {
        Self { dir: &BUILTIN_TEMPLATES }
    }
}

impl Default for EmbeddedStore {
    fn default() -> Self {
        EmbeddedStore::new()
    }
}

fn collect_files(dir: &'static Dir<'static>, names: &mut Vec<String>) {
    for file in dir.files() {
        names.push(file.path().to_string_lossy().replace('\\', "/"));
    }
    for sub in dir.dirs() {
        collect_files(sub, names);
    }
}

impl TemplateStore for EmbeddedStore {
    fn find(&self, name: &str) -> Result<Arc<Template>> {
        let path = validate_name(name)?;
        let file = self
            .dir
            .get_file(path)
            .ok_or_else(|| Error::TemplateNotFound { name: name.to_string() })?;
        Ok(Arc::new(Template::new(name, file.contents())))
    }

    fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_files(self.dir, &mut names);
        names.sort();
        names
    }
}

/// Templates stored under a directory on disk.
/// Each file is read on first lookup and cached for the lifetime of the store.
#[derive(Debug)]
pub struct DirectoryStore {
    root: PathBuf,
    cache: RefCell<HashMap<String, Arc<Template>>>,
}

impl DirectoryStore {
    /// # Errors
    /// * `Error::ConfigError` if `root` is not a directory
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::ConfigError(format!(
                "template directory '{}' does not exist",
                root.display()
            )));
        }
        Ok(Self { root: root.to_path_buf(), cache: RefCell::new(HashMap::new()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateStore for DirectoryStore {
    fn find(&self, name: &str) -> Result<Arc<Template>> {
        if let Some(template) = self.cache.borrow().get(name) {
            return Ok(Arc::clone(template));
        }

        let path = self.root.join(validate_name(name)?);
        if !path.is_file() {
            return Err(Error::TemplateNotFound { name: name.to_string() });
        }
        debug!("Loading template '{}' from {}", name, path.display());
        let content = std::fs::read(&path)?;
        let template = Arc::new(Template::new(name, content));
        self.cache.borrow_mut().insert(name.to_string(), Arc::clone(&template));
        Ok(template)
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        names.sort();
        names
    }
}

/// Ordered overlay of stores; the first layer holding a name wins.
#[derive(Default)]
pub struct LayeredStore {
    layers: Vec<Box<dyn TemplateStore>>,
}

impl LayeredStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a layer with lower precedence than every layer added before it.
    pub fn with_layer(mut self, layer: Box<dyn TemplateStore>) -> Self {
        self.layers.push(layer);
        self
    }
}

impl TemplateStore for LayeredStore {
    fn find(&self, name: &str) -> Result<Arc<Template>> {
        for layer in &self.layers {
            match layer.find(name) {
                Err(Error::TemplateNotFound { .. }) => continue,
                found => return found,
            }
        }
        Err(Error::TemplateNotFound { name: name.to_string() })
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.layers.iter().flat_map(|layer| layer.names()).collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Builds the store used by the binary: an optional user directory over the built-ins.
pub fn template_store<P: AsRef<Path>>(user_dir: Option<P>) -> Result<Box<dyn TemplateStore>> {
    let Some(dir) = user_dir else {
        return Ok(Box::new(EmbeddedStore::new()));
    };
    let store = LayeredStore::new()
        .with_layer(Box::new(DirectoryStore::new(dir)?))
        .with_layer(Box::new(EmbeddedStore::new()));
    Ok(Box::new(store))
}
