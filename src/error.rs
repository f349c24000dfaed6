//! Error handling for the roll generator.
//! Defines the error kinds raised by file operations, the step registry
//! and the pipeline runner.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}.")]
    IoError(#[from] std::io::Error),

    /// Destination exists and the operation was not allowed to overwrite it.
    #[error("Cannot write '{path}': file already exists.")]
    AlreadyExists { path: String },

    /// An anchor or replacement pattern was absent from the target file.
    #[error("Pattern '{pattern}' not found in '{path}'.")]
    NotFound { path: String, pattern: String },

    /// Malformed template or unresolved placeholder.
    #[error("Failed to render template '{template}'. Original error: {reason}")]
    TemplateError { template: String, reason: String },

    #[error("Template '{name}' does not exist in the template store.")]
    TemplateNotFound { name: String },

    #[error("Unknown step '{name}'.")]
    UnknownStep { name: String },

    #[error("Step '{name}' is already registered.")]
    DuplicateStep { name: String },

    #[error("Step '{name}' includes itself through its nested steps.")]
    RecursiveStep { name: String },

    /// An external process exited unsuccessfully or was killed after a timeout.
    #[error("{}", external_command_message(.command, .exit_code, .timed_out, .stderr))]
    ExternalCommandError {
        command: String,
        exit_code: Option<i32>,
        timed_out: bool,
        stdout: String,
        stderr: String,
    },

    /// Mutually exclusive options were selected.
    #[error("Invalid options for step '{step}': {message}.")]
    GuardConfigurationError { step: String, message: String },

    #[error("Configuration error: {0}.")]
    ConfigError(String),

    #[error("Failed to parse config file '{path}'. Original error: {reason}")]
    ConfigParseError { path: String, reason: String },

    #[error("Invalid pattern. Original error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Cannot proceed: application directory '{app_root}' already exists. Use --force to generate into it.")]
    OutputDirectoryExistsError { app_root: String },
}

fn external_command_message(
    command: &str,
    exit_code: &Option<i32>,
    timed_out: &bool,
    stderr: &str,
) -> String {
    let mut message = if *timed_out {
        format!("Command '{command}' timed out and was killed")
    } else {
        match exit_code {
            Some(code) => format!("Command '{command}' failed with exit code {code}"),
            None => format!("Command '{command}' was terminated by a signal"),
        }
    };
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        message.push_str(&format!(": {stderr}"));
    }
    message
}

impl Error {
    /// Whether this error is an external command that a signal terminated
    /// before it could exit on its own.
    pub fn is_interrupted_command(&self) -> bool {
        matches!(self, Error::ExternalCommandError { exit_code: None, timed_out: false, .. })
    }
}

/// Convenience type alias for Results with roll's Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Prints an error raised before the pipeline started and exits with status code 1.
pub fn default_error_handler(err: Error) -> ! {
    eprintln!("{err}");
    std::process::exit(1);
}
