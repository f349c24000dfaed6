use std::io;

use roll::error::Error;

#[test]
fn test_error_conversion() {
    let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let roll_err: Error = io_err.into();

    match roll_err {
        Error::IoError(_) => (),
        _ => panic!("Expected IoError variant"),
    }
}

#[test]
fn test_regex_error_conversion() {
    let regex_err = regex::Regex::new("(unclosed").unwrap_err();
    let roll_err: Error = regex_err.into();

    assert!(matches!(roll_err, Error::RegexError(_)));
}

#[test]
fn test_error_display() {
    let err = Error::ConfigError("invalid config".to_string());
    assert_eq!(err.to_string(), "Configuration error: invalid config.");

    let err = Error::UnknownStep { name: "setup_mongoid".to_string() };
    assert_eq!(err.to_string(), "Unknown step 'setup_mongoid'.");

    let err = Error::NotFound { path: "Gemfile".to_string(), pattern: "group :test do".to_string() };
    assert_eq!(err.to_string(), "Pattern 'group :test do' not found in 'Gemfile'.");
}

#[test]
fn test_external_command_display() {
    let failed = Error::ExternalCommandError {
        command: "bundle install".to_string(),
        exit_code: Some(1),
        timed_out: false,
        stdout: String::new(),
        stderr: "Could not find gem 'pg'\n".to_string(),
    };
    assert_eq!(
        failed.to_string(),
        "Command 'bundle install' failed with exit code 1: Could not find gem 'pg'"
    );

    let timed_out = Error::ExternalCommandError {
        command: "heroku create".to_string(),
        exit_code: None,
        timed_out: true,
        stdout: String::new(),
        stderr: String::new(),
    };
    assert_eq!(timed_out.to_string(), "Command 'heroku create' timed out and was killed");
}
