mod common;

use std::path::PathBuf;

use common::{actions_with, fake_rails_tree, ok, read, FixedSecrets, RecordingRunner};
use roll::constants::DEFAULT_RECIPE;
use roll::error::Error;
use roll::options::{Database, Options, SkipFlag};
use roll::pipeline::{Outcome, Pipeline, RunState};
use roll::recipe::catalog;
use roll::shell::CommandSpec;
use roll::store::EmbeddedStore;
use tempfile::TempDir;

fn app_root(dir: &TempDir) -> PathBuf {
    let root = dir.path().join("blog");
    fake_rails_tree(&root);
    root
}

fn ruby_aware_runner() -> (RecordingRunner, std::sync::Arc<std::sync::Mutex<Vec<CommandSpec>>>) {
    RecordingRunner::responding(|spec| if spec.program == "ruby" { ok("2.2.2") } else { ok("") })
}

fn skipped(report: &roll::pipeline::RunReport) -> Vec<&str> {
    report
        .log
        .entries()
        .iter()
        .filter(|entry| matches!(entry.outcome, Outcome::Skipped))
        .map(|entry| entry.step.as_str())
        .collect()
}

#[test]
fn test_catalog_validates_default_recipe() {
    let registry = catalog().unwrap();

    assert!(registry.validate(&[DEFAULT_RECIPE], &Options::new("blog")).is_ok());
    assert!(registry.contains("roll_customization"));
    assert_eq!(
        registry.resolve("customize_error_page_404").unwrap().args(),
        &["404".to_string()]
    );
}

#[test]
fn test_catalog_rejects_mongoid_with_active_record() {
    let registry = catalog().unwrap();
    let options = Options::new("blog").with_database(Database::Mongoid);

    match registry.validate(&[DEFAULT_RECIPE], &options) {
        Err(Error::GuardConfigurationError { step, .. }) => assert_eq!(step, "setup_database"),
        other => panic!("Expected GuardConfigurationError, got {other:?}"),
    }
    assert!(registry
        .validate(&[DEFAULT_RECIPE], &options.with_skip(SkipFlag::ActiveRecord))
        .is_ok());
}

#[test]
fn test_create_rails_app_command() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("blog");
    let (runner, calls) = RecordingRunner::succeeding();
    let actions = actions_with(&root, Box::new(EmbeddedStore::new()), runner);
    let registry = catalog().unwrap();
    let options = Options::new(&root).with_skip(SkipFlag::Git);

    let report = Pipeline::new(&registry, &actions, &FixedSecrets)
        .run(&["create_rails_app"], &options)
        .unwrap();

    assert_eq!(report.state, RunState::Completed);
    let calls = calls.lock().unwrap();
    assert_eq!(calls[0].program, "rails");
    assert_eq!(calls[0].cwd, dir.path());
    assert_eq!(
        calls[0].args,
        vec![
            "new".to_string(),
            root.display().to_string(),
            "--skip-bundle".to_string(),
            "--skip-test-unit".to_string(),
            "--database".to_string(),
            "postgresql".to_string(),
            "--skip-git".to_string(),
        ]
    );
}

#[test_log::test]
fn test_roll_customization_on_rails_tree() {
    let dir = TempDir::new().unwrap();
    let root = app_root(&dir);
    let (runner, calls) = ruby_aware_runner();
    let actions = actions_with(&root, Box::new(EmbeddedStore::new()), runner);
    let registry = catalog().unwrap();
    let options = Options::new(&root);

    let report = Pipeline::new(&registry, &actions, &FixedSecrets)
        .run(&["roll_customization"], &options)
        .unwrap();

    assert_eq!(report.state, RunState::Completed, "{:?}", report.log.failure());
    assert_eq!(
        skipped(&report),
        vec!["setup_heroku_specific_gems", "use_mongoid_config_template", "setup_heroku"]
    );

    assert!(read(&root, "Gemfile").contains("gem 'pg'"));
    assert_eq!(read(&root, ".ruby-version"), "2.2.2\n");
    assert!(read(&root, "config/database.yml").contains("blog_development"));

    let application = read(&root, "config/application.rb");
    assert!(application.contains("action_on_unpermitted_parameters = :raise"));
    assert!(application.contains("generate.test_framework :rspec"));
    assert!(application.contains("default_timezone = :utc"));

    let development = read(&root, "config/environments/development.rb");
    assert!(development.contains("raise_delivery_errors = true"));
    assert!(development.contains("host: 'blog.local'"));
    assert!(development.trim_end().ends_with("end"));
    assert!(read(&root, "config/environments/staging.rb").contains("staging.blog.com"));

    let production = read(&root, "config/environments/production.rb");
    assert!(production.starts_with("require Rails.root.join('config/smtp')\n"));
    assert!(production.contains("config.middleware.use Rack::Deflater"));

    assert!(read(&root, "config/secrets.yml").contains(&"ab".repeat(64)));
    assert_eq!(read(&root, "config/routes.rb"), "Rails.application.routes.draw do\nend\n");

    let not_found = read(&root, "public/404.html");
    assert!(not_found.contains("<meta name='ROBOTS' content='NOODP' />"));
    assert!(!not_found.contains("<!--"));

    assert!(root.join("spec/support/features/.keep").is_file());
    assert!(root.join("spec/lib/.keep").is_file());
    assert!(root.join("app/assets/stylesheets/application.scss").is_file());
    assert!(!root.join("app/assets/stylesheets/application.css").exists());
    assert!(read(&root, ".gitignore").contains("/coverage/*"));

    let commands: Vec<String> = calls.lock().unwrap().iter().map(|c| c.display()).collect();
    assert_eq!(commands.first().map(String::as_str), Some("ruby -e print RUBY_VERSION"));
    assert!(commands.contains(&"bundle install".to_string()));
    assert!(commands.contains(&"bundle exec rails generate delayed_job:active_record".to_string()));
    assert_eq!(commands.last().map(String::as_str), Some("git init"));
}

#[test]
fn test_mongoid_without_active_record() {
    let dir = TempDir::new().unwrap();
    let root = app_root(&dir);
    let (runner, calls) = ruby_aware_runner();
    let actions = actions_with(&root, Box::new(EmbeddedStore::new()), runner);
    let registry = catalog().unwrap();
    let options = Options::new(&root)
        .with_database(Database::Mongoid)
        .with_skip(SkipFlag::ActiveRecord)
        .with_skip(SkipFlag::Git);

    let report = Pipeline::new(&registry, &actions, &FixedSecrets)
        .run(
            &[
                "customize_gemfile",
                "setup_database",
                "setup_staging_environment",
                "configure_app",
                "setup_git",
            ],
            &options,
        )
        .unwrap();

    assert_eq!(report.state, RunState::Completed, "{:?}", report.log.failure());
    assert!(skipped(&report).contains(&"use_postgres_config_template"));
    assert!(skipped(&report).contains(&"configure_time_zone"));
    assert!(skipped(&report).contains(&"setup_git"));
    assert!(read(&root, "Gemfile").contains("gem 'mongoid'"));
    assert!(read(&root, "config/mongoid.yml").contains("blog_development"));
    assert!(!root.join("config/database.yml").exists());
    assert!(!read(&root, "config/application.rb").contains("default_timezone"));
    assert!(!calls.lock().unwrap().iter().any(|c| c.program == "git"));
}

#[test]
fn test_skip_bundle_runs_no_bundler() {
    let dir = TempDir::new().unwrap();
    let root = app_root(&dir);
    let (runner, calls) = ruby_aware_runner();
    let actions = actions_with(&root, Box::new(EmbeddedStore::new()), runner);
    let registry = catalog().unwrap();
    let options = Options::new(&root).with_skip(SkipFlag::Bundle);

    let report = Pipeline::new(&registry, &actions, &FixedSecrets)
        .run(&["customize_gemfile", "setup_database", "setup_test_environment"], &options)
        .unwrap();

    assert_eq!(report.state, RunState::Completed, "{:?}", report.log.failure());
    assert!(!calls.lock().unwrap().iter().any(|c| c.program == "bundle"));
    assert!(root.join("spec/rails_helper.rb").is_file());
}

#[test]
fn test_heroku_setup() {
    let dir = TempDir::new().unwrap();
    let root = app_root(&dir);
    let (runner, calls) = RecordingRunner::succeeding();
    let actions = actions_with(&root, Box::new(EmbeddedStore::new()), runner);
    let registry = catalog().unwrap();
    let options = Options::new(&root).with_heroku("--region eu");

    let report = Pipeline::new(&registry, &actions, &FixedSecrets)
        .run(&["setup_heroku"], &options)
        .unwrap();

    assert_eq!(report.state, RunState::Completed, "{:?}", report.log.failure());
    let commands: Vec<String> = calls.lock().unwrap().iter().map(|c| c.display()).collect();
    assert_eq!(commands.len(), 8);
    assert_eq!(commands[0], "heroku create blog-staging --remote staging --region eu");
    assert_eq!(commands[1], "heroku config:set RACK_ENV=staging RAILS_ENV=staging --remote staging");
    assert!(commands[7].starts_with("heroku config:set SECRET_KEY_BASE=abab"));
    assert!(read(&root, "bin/setup").contains("git@heroku.com:blog-production.git"));
    assert!(read(&root, "README.md").contains("./bin/deploy staging"));
}

#[test]
fn test_recipe_failure_on_missing_anchor() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("blog");
    std::fs::create_dir_all(root.join("config")).unwrap();
    std::fs::write(root.join("config/routes.rb"), "routes\n").unwrap();
    let (runner, _) = RecordingRunner::succeeding();
    let actions = actions_with(&root, Box::new(EmbeddedStore::new()), runner);
    let registry = catalog().unwrap();

    let report = Pipeline::new(&registry, &actions, &FixedSecrets)
        .run(&["remove_routes_comment_lines", "outro"], &Options::new(&root))
        .unwrap();

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(report.log.len(), 1);
    assert!(matches!(report.log.failure().unwrap().outcome, Outcome::Failed(Error::NotFound { .. })));
}
