//! Command-line interface implementation for roll.
//! Parses arguments with clap, merges them with the optional config file
//! and drives one pipeline run.

use clap::{error::ErrorKind, CommandFactory, Parser};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::actions::Actions;
use crate::config::{load_config, Config};
use crate::constants::DEFAULT_RECIPE;
use crate::error::{Error, Result};
use crate::options::{Database, Options, SkipFlag};
use crate::pipeline::{CancelToken, Outcome, Pipeline, RunReport};
use crate::recipe;
use crate::registry::StepRegistry;
use crate::secret::OsSecretGenerator;
use crate::step::StepBody;
use crate::store::template_store;

/// Command-line arguments structure for roll.
#[derive(Parser, Debug)]
#[command(author, version, about = "roll: opinionated Rails application generator", long_about = None)]
pub struct Args {
    /// Directory where the application will be generated
    #[arg(value_name = "APP_PATH", required_unless_present = "list")]
    pub app_path: Option<PathBuf>,

    /// Preconfigure for the selected database
    #[arg(short, long, value_name = "DATABASE")]
    pub database: Option<String>,

    /// Use the Mongoid ODM
    #[arg(short = 'M', long)]
    pub mongoid: bool,

    /// Skip Active Record files
    #[arg(short = 'O', long)]
    pub skip_active_record: bool,

    /// Create staging and production Heroku apps
    #[arg(short = 'H', long)]
    pub heroku: bool,

    /// Extra flags passed to `heroku create`
    #[arg(long, value_name = "FLAGS", allow_hyphen_values = true)]
    pub heroku_flags: Option<String>,

    /// Do not initialise a git repository
    #[arg(long)]
    pub skip_git: bool,

    /// Do not run bundle or steps that need installed gems
    #[arg(long)]
    pub skip_bundle: bool,

    /// Directory with templates overriding the built-in ones
    #[arg(long, value_name = "DIR")]
    pub templates: Option<PathBuf>,

    /// Configuration file (defaults to roll.json, roll.yml or roll.yaml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Timeout for each external command, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Generate into an existing directory
    #[arg(short, long)]
    pub force: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the step tree and exit
    #[arg(long)]
    pub list: bool,

    /// Run a single step or group instead of the whole recipe
    #[arg(long, value_name = "NAME")]
    pub only: Option<String>,
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}

/// Checks that the application directory may be generated into and makes it absolute.
///
/// # Errors
/// * `Error::OutputDirectoryExistsError` if the directory exists and `force` is false
pub fn get_app_root<P: AsRef<Path>>(app_path: P, force: bool) -> Result<PathBuf> {
    let app_path = app_path.as_ref();
    if app_path.exists() && !force {
        return Err(Error::OutputDirectoryExistsError {
            app_root: app_path.display().to_string(),
        });
    }
    if app_path.is_absolute() {
        Ok(app_path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(app_path))
    }
}

/// Merges command-line flags over config values over built-in defaults.
pub fn resolve_options<P: AsRef<Path>>(args: &Args, config: &Config, app_root: P) -> Options {
    let database = if args.mongoid {
        Database::Mongoid
    } else if let Some(database) = &args.database {
        database.parse().unwrap_or_default()
    } else {
        config.database.clone().unwrap_or_default()
    };

    let mut options = Options::new(app_root).with_database(database);
    let flags = [
        (args.skip_active_record, SkipFlag::ActiveRecord),
        (args.skip_git, SkipFlag::Git),
        (args.skip_bundle, SkipFlag::Bundle),
    ];
    for (set, flag) in flags {
        if set {
            options = options.with_skip(flag);
        }
    }
    for flag in &config.skip {
        options = options.with_skip(*flag);
    }

    if args.heroku || config.heroku.unwrap_or(false) {
        let flags = args.heroku_flags.clone().or_else(|| config.heroku_flags.clone());
        options = options.with_heroku(flags.unwrap_or_default());
    }
    options
}

/// Timeout for external commands; the flag wins over the config file.
pub fn resolve_timeout(args: &Args, config: &Config) -> Option<Duration> {
    args.timeout.or(config.timeout).map(Duration::from_secs)
}

/// Renders the nested step tree below `names`, one step per line.
pub fn format_step_tree(registry: &StepRegistry, names: &[&str]) -> Result<String> {
    let mut out = String::new();
    for name in names {
        write_step(registry, name, 0, &mut out)?;
    }
    Ok(out)
}

fn write_step(registry: &StepRegistry, name: &str, depth: usize, out: &mut String) -> Result<()> {
    let step = registry.resolve(name)?;
    let descriptor = step.describe();
    out.push_str(&"  ".repeat(depth));
    out.push_str(&descriptor.name);
    if let Some(guard) = &descriptor.guard {
        out.push_str(&format!(" [when {guard}]"));
    }
    if !descriptor.args.is_empty() {
        out.push_str(&format!(" ({})", descriptor.args.join(", ")));
    }
    out.push('\n');

    if let StepBody::Group(children) = step.body() {
        for child in children {
            write_step(registry, child, depth + 1, out)?;
        }
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!();
    for entry in report.log.entries() {
        println!("{entry}");
    }
    let failed = report.log.entries().iter().filter(|e| e.outcome.is_failure()).count();
    let skipped = report
        .log
        .entries()
        .iter()
        .filter(|e| matches!(e.outcome, Outcome::Skipped))
        .count();
    println!(
        "Run {:?}: {} steps recorded, {} skipped, {} failed.",
        report.state,
        report.log.len(),
        skipped,
        failed
    );
}

/// Main application logic execution.
///
/// # Returns
/// * `Result<i32>` - Process exit status of the run
///
/// # Flow
/// 1. Loads the config file and the step catalog
/// 2. Resolves the application root and options
/// 3. Builds the template store and file operations layer
/// 4. Runs the selected steps, stopping early on Ctrl-C
/// 5. Prints the execution log
pub fn run(args: Args) -> Result<i32> {
    let config = load_config(args.config.as_deref(), std::env::current_dir()?)?;
    let registry = recipe::catalog()?;

    if args.list {
        print!("{}", format_step_tree(&registry, &[DEFAULT_RECIPE])?);
        return Ok(0);
    }

    let app_path = args
        .app_path
        .as_deref()
        .ok_or_else(|| Error::ConfigError("no application path given".to_string()))?;
    let app_root = get_app_root(app_path, args.force)?;
    let options = resolve_options(&args, &config, &app_root);
    debug!("Resolved options: {options:?}");

    let store = template_store(args.templates.as_ref().or(config.templates.as_ref()))?;
    let actions = Actions::system(&app_root, store).with_timeout(resolve_timeout(&args, &config));

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("Could not install the Ctrl-C handler: {e}");
    }

    let target = args.only.as_deref().unwrap_or(DEFAULT_RECIPE);
    let secrets = OsSecretGenerator::new();
    let report = Pipeline::new(&registry, &actions, &secrets)
        .with_cancel_token(cancel)
        .run(&[target], &options)?;

    print_summary(&report);
    Ok(report.exit_code())
}
