//! Resolved generator options.
//! An `Options` value is built once from the command line and config file
//! and is only ever read afterwards.

use cruet::Inflector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Persistence layer the generated application is configured for.
/// Config files and the command line share one parser, so aliases such as
/// `postgres` or `mongodb` resolve the same way everywhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Database {
    #[default]
    Postgresql,
    Mongoid,
    Other(String),
}

impl Database {
    pub fn as_str(&self) -> &str {
        match self {
            Database::Postgresql => "postgresql",
            Database::Mongoid => "mongoid",
            Database::Other(name) => name,
        }
    }
}

impl std::str::FromStr for Database {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Database::Postgresql,
            "mongoid" | "mongodb" => Database::Mongoid,
            other => Database::Other(other.to_string()),
        })
    }
}

impl From<String> for Database {
    fn from(name: String) -> Self {
        match name.parse() {
            Ok(database) => database,
            Err(never) => match never {},
        }
    }
}

impl From<Database> for String {
    fn from(database: Database) -> Self {
        database.as_str().to_string()
    }
}

impl std::fmt::Display for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Takes the application name from the last component of `app_root`.
/// Roots ending in `.` or `..` are resolved against the working directory
/// first, following symlinks when the directory already exists.
fn app_name_from(app_root: &Path) -> Option<String> {
    let name = match app_root.file_name() {
        Some(name) => name.to_os_string(),
        None => {
            let absolute = std::env::current_dir().ok()?.join(app_root);
            let resolved = absolute.canonicalize().unwrap_or_else(|_| normalize(&absolute));
            resolved.file_name()?.to_os_string()
        }
    };
    Some(name.to_string_lossy().to_snake_case())
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

/// Parts of the generated application the user asked to leave out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipFlag {
    /// The relational persistence layer (Active Record).
    ActiveRecord,
    /// Repository initialisation and gitignore setup.
    Git,
    /// Every `bundle` invocation and the steps that need installed gems.
    Bundle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HerokuOptions {
    /// When set, no Heroku apps, remotes or deploy scripts are created.
    pub skip: bool,
    /// Extra flags appended to every `heroku create` call.
    pub flags: String,
}

impl Default for HerokuOptions {
    fn default() -> Self {
        Self { skip: true, flags: String::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    pub app_name: String,
    pub app_root: PathBuf,
    pub database: Database,
    pub skip: BTreeSet<SkipFlag>,
    pub heroku: HerokuOptions,
}

impl Options {
    /// Creates options for an application generated at `app_root`.
    /// The application name is derived from the last path component.
    pub fn new<P: AsRef<Path>>(app_root: P) -> Self {
        let app_root = app_root.as_ref().to_path_buf();
        let app_name = app_name_from(&app_root).unwrap_or_else(|| "app".to_string());
        Self {
            app_name,
            app_root,
            database: Database::default(),
            skip: BTreeSet::new(),
            heroku: HerokuOptions::default(),
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = database;
        self
    }

    pub fn with_skip(mut self, flag: SkipFlag) -> Self {
        self.skip.insert(flag);
        self
    }

    pub fn with_heroku(mut self, flags: impl Into<String>) -> Self {
        self.heroku = HerokuOptions { skip: false, flags: flags.into() };
        self
    }

    pub fn skips(&self, flag: SkipFlag) -> bool {
        self.skip.contains(&flag)
    }

    pub fn using_active_record(&self) -> bool {
        !self.skips(SkipFlag::ActiveRecord)
    }

    pub fn using_mongoid(&self) -> bool {
        self.database == Database::Mongoid
    }

    pub fn using_heroku(&self) -> bool {
        !self.heroku.skip
    }

    /// Dash-separated name, valid as a Heroku app and host name.
    pub fn app_slug(&self) -> String {
        self.app_name.to_kebab_case()
    }

    /// Ruby constant name of the application module.
    pub fn app_module(&self) -> String {
        self.app_name.to_pascal_case()
    }

    /// Builds the rendering context shared by every template.
    pub fn template_context(&self) -> serde_json::Value {
        serde_json::json!({
            "app_name": self.app_name,
            "app_slug": self.app_slug(),
            "app_module": self.app_module(),
            "database": self.database.as_str(),
            "using_active_record": self.using_active_record(),
            "using_mongoid": self.using_mongoid(),
            "using_heroku": self.using_heroku(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_names_from_app_root() {
        let options = Options::new("/tmp/projects/MyBlog");
        assert_eq!(options.app_name, "my_blog");
        assert_eq!(options.app_slug(), "my-blog");
        assert_eq!(options.app_module(), "MyBlog");
    }

    #[test]
    fn resolves_names_for_relative_roots() {
        let cwd = std::env::current_dir().unwrap().canonicalize().unwrap();
        let expected = cwd.file_name().unwrap().to_string_lossy().to_snake_case();
        assert_eq!(Options::new(".").app_name, expected);
        let raw = std::env::current_dir().unwrap();
        let lexical = raw.file_name().unwrap().to_string_lossy().to_snake_case();
        assert_eq!(Options::new("./missing_app/..").app_name, lexical);

        let parent = cwd.parent().and_then(Path::file_name);
        if let Some(parent) = parent {
            assert_eq!(Options::new("..").app_name, parent.to_string_lossy().to_snake_case());
        }
        assert_eq!(normalize(Path::new("/srv/apps/./blog/../shop")), PathBuf::from("/srv/apps/shop"));
    }

    #[test]
    fn parses_database_names() {
        assert_eq!("postgresql".parse::<Database>().unwrap(), Database::Postgresql);
        assert_eq!("Mongoid".parse::<Database>().unwrap(), Database::Mongoid);
        assert_eq!(
            "sqlite3".parse::<Database>().unwrap(),
            Database::Other("sqlite3".to_string())
        );
    }

    #[test]
    fn template_context_reflects_flags() {
        let options = Options::new("shop")
            .with_database(Database::Mongoid)
            .with_skip(SkipFlag::ActiveRecord);
        let context = options.template_context();
        assert_eq!(context["using_mongoid"], true);
        assert_eq!(context["using_active_record"], false);
        assert_eq!(context["using_heroku"], false);
        assert_eq!(context["database"], "mongoid");
    }
}
