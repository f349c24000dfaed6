#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use roll::actions::Actions;
use roll::error::Result;
use roll::renderer::MiniJinjaRenderer;
use roll::secret::SecretGenerator;
use roll::shell::{CommandOutput, CommandRunner, CommandSpec};
use roll::store::{EmbeddedStore, TemplateStore};

type Responder = Box<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

/// Records every command instead of spawning it.
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<CommandSpec>>>,
    respond: Responder,
}

impl RecordingRunner {
    pub fn succeeding() -> (Self, Arc<Mutex<Vec<CommandSpec>>>) {
        Self::responding(|_| ok(""))
    }

    pub fn responding<F>(respond: F) -> (Self, Arc<Mutex<Vec<CommandSpec>>>)
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (Self { calls: Arc::clone(&calls), respond: Box::new(respond) }, calls)
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok((self.respond)(spec))
    }
}

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput { exit_code: Some(0), stdout: stdout.to_string(), ..Default::default() }
}

pub fn exit(code: i32) -> CommandOutput {
    CommandOutput { exit_code: Some(code), stderr: "boom".to_string(), ..Default::default() }
}

/// Returns predictable secrets so generated trees can be compared.
pub struct FixedSecrets;

impl SecretGenerator for FixedSecrets {
    fn generate(&self) -> String {
        "ab".repeat(64)
    }
}

pub fn actions_with(root: &Path, store: Box<dyn TemplateStore>, runner: RecordingRunner) -> Actions {
    Actions::new(root, store, Box::new(MiniJinjaRenderer::new()), Box::new(runner))
}

pub fn embedded_actions(root: &Path) -> (Actions, Arc<Mutex<Vec<CommandSpec>>>) {
    let (runner, calls) = RecordingRunner::succeeding();
    (actions_with(root, Box::new(EmbeddedStore::new()), runner), calls)
}

pub fn write(root: &Path, path: &str, content: &str) {
    let target = root.join(path);
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(target, content).unwrap();
}

pub fn read(root: &Path, path: &str) -> String {
    std::fs::read_to_string(root.join(path)).unwrap()
}

/// The parts of a freshly generated Rails tree the recipe edits.
pub fn fake_rails_tree(root: &Path) {
    write(
        root,
        "config/application.rb",
        "require File.expand_path('../boot', __FILE__)\n\nmodule Blog\n  class Application < Rails::Application\n    config.active_record.raise_in_transactional_callbacks = true\n  end\nend\n",
    );
    write(
        root,
        "config/environments/development.rb",
        "Rails.application.configure do\n  config.action_mailer.raise_delivery_errors = false\nend\n",
    );
    write(root, "config/environments/test.rb", "Rails.application.configure do\n  config.cache_classes = true\nend\n");
    write(
        root,
        "config/environments/production.rb",
        "Rails.application.configure do\n  config.serve_static_files = ENV['RAILS_SERVE_STATIC_FILES'].present?\n  config.action_mailer.raise_delivery_errors = false\nend\n",
    );
    write(
        root,
        "config/routes.rb",
        "Rails.application.routes.draw do\n  # The priority is based upon order of creation\n  # root 'welcome#index'\nend\n",
    );
    write(root, "config/database.yml", "development:\n  adapter: sqlite3\n");
    write(root, "config/locales/en.yml", "en:\n  hello: \"Hello world\"\n");
    write(root, "app/assets/stylesheets/application.css", "/* manifest */\n");
    write(root, "Gemfile", "source 'https://rubygems.org'\ngem 'rails'\n");
    write(root, "Rakefile", "require File.expand_path('../config/application', __FILE__)\n");
    write(root, ".gitignore", "/log\n");
    write(root, "README.rdoc", "== README\n");
    for page in ["404", "422", "500"] {
        write(
            root,
            &format!("public/{page}.html"),
            "<!DOCTYPE html>\n<html>\n<head>\n  <title>Error</title>\n</head>\n<body>\n  <!-- This file lives in public/ -->\n  <p>Oops</p>\n</body>\n</html>\n",
        );
    }
}
