//! Individual file-level steps of the Rails recipe.

use serde_json::json;

use super::{configure_environment, inject_into_class, merge_context};
use crate::actions::{Occurrence, Pattern, Position};
use crate::error::Result;
use crate::options::{Database, Options, SkipFlag};
use crate::step::{Step, StepContext};

const ENVIRONMENTS: [&str; 2] = ["staging", "production"];
const ERROR_PAGES: [&str; 3] = ["500", "404", "422"];

const UNPERMITTED_PARAMETERS: &str = "
    # Raise an ActionController::UnpermittedParameters exception when
    # a parameter is not explicitly permitted but is passed anyway.
    config.action_controller.action_on_unpermitted_parameters = :raise

";

const GENERATORS: &str = "    config.generators do |generate|
      generate.helper false
      generate.request_specs false
      generate.routing_specs false
      generate.stylesheets false
      generate.test_framework :rspec
      generate.view_specs false
    end

";

const MAILER_PREVIEWS: &str = "

  # Specific mailers path
  config.action_mailer.preview_path = Rails.root.join('spec/mailers/previews')";

const SMTP_DELIVERY: &str = "

  config.action_mailer.delivery_method = :smtp
  config.action_mailer.smtp_settings = SMTP_SETTINGS";

const RACK_DEFLATER: &str = "

  # Enable deflate / gzip compression of controller-generated responses
  config.middleware.use Rack::Deflater";

const STAGING_CONFIGURE: &str = "
Rails.application.configure do
  # Overrides of production settings go here
end
";

const I18N_LOCALES: &str = "    config.i18n.enforce_available_locales = true

";

const UTC_TIME_ZONE: &str = "    config.active_record.default_timezone = :utc

";

const DEFAULT_RAKE_TASK: &str = "
task(:default).clear
task default: [:spec]
if defined? RSpec
  task(:spec).clear
  RSpec::Core::RakeTask.new(:spec) do |t|
    t.verbose = false
  end
end
";

const ERROR_PAGE_META: &str = "  <meta charset='utf-8' />
  <meta name='ROBOTS' content='NOODP' />
";

const DEPLOY_INSTRUCTIONS: &str = "
## Deploying

If you have previously run the `./bin/setup` script,
you can deploy to staging and production with:

    $ ./bin/deploy staging
    $ ./bin/deploy production
";

const KEPT_DIRECTORIES: [&str; 7] = [
    "app/views/pages",
    "spec/lib",
    "spec/controllers",
    "spec/helpers",
    "spec/support/matchers",
    "spec/support/mixins",
    "spec/support/shared_examples",
];

fn create_rails_app(ctx: &StepContext<'_>) -> Result<()> {
    let options = ctx.options;
    let root = ctx.actions.root();
    let mut args = vec![
        "new".to_string(),
        root.display().to_string(),
        "--skip-bundle".to_string(),
        "--skip-test-unit".to_string(),
    ];
    if options.using_mongoid() {
        args.push("--skip-active-record".to_string());
    } else {
        args.extend(["--database".to_string(), options.database.as_str().to_string()]);
        if options.skips(SkipFlag::ActiveRecord) {
            args.push("--skip-active-record".to_string());
        }
    }
    if options.skips(SkipFlag::Git) {
        args.push("--skip-git".to_string());
    }
    let parent = match root.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.to_path_buf(),
        None => std::env::current_dir()?,
    };
    ctx.actions.run_external("rails", &args, Some(parent.as_path()))?;
    Ok(())
}

fn readme(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.render_template("README.md.j2", "README.md", &ctx.template_context(), true)
}

fn bundle_install(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.run_external("bundle", ["install"], None)?;
    Ok(())
}

fn replace_gemfile(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.remove_file("Gemfile")?;
    ctx.actions.render_template("Gemfile.j2", "Gemfile", &ctx.template_context(), false)
}

fn set_ruby_to_version_being_used(ctx: &StepContext<'_>) -> Result<()> {
    let probe = ctx.actions.run_external("ruby", ["-e", "print RUBY_VERSION"], None)?;
    let context = merge_context(ctx, json!({ "ruby_version": probe.stdout.trim() }));
    ctx.actions.render_template("ruby-version.j2", ".ruby-version", &context, true)
}

fn setup_heroku_specific_gems(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.inject_at(
        "Gemfile",
        "\n  gem 'rails_stdout_logging'",
        &Pattern::regex(r"group :staging, :production do")?,
        Position::After,
    )
}

fn use_postgres_config_template(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.render_template(
        "postgresql_database.yml.j2",
        "config/database.yml",
        &ctx.template_context(),
        true,
    )
}

fn use_mongoid_config_template(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.remove_file("config/database.yml")?;
    ctx.actions.render_template("mongoid.yml.j2", "config/mongoid.yml", &ctx.template_context(), false)
}

fn create_database(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.run_external("bundle", ["exec", "rake", "db:create", "db:migrate"], None)?;
    Ok(())
}

fn raise_on_delivery_errors(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.replace_pattern(
        "config/environments/development.rb",
        &Pattern::literal("raise_delivery_errors = false"),
        "raise_delivery_errors = true",
        Occurrence::First,
    )
}

fn raise_on_unpermitted_parameters(ctx: &StepContext<'_>) -> Result<()> {
    inject_into_class(ctx, "config/application.rb", "Application", UNPERMITTED_PARAMETERS)
}

fn provide_setup_script(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("bin_setup", "bin/setup", true)?;
    ctx.actions.make_executable("bin/setup")
}

fn provide_dev_prime_task(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("dev_prime_task.rb", "lib/tasks/dev.rake", false)
}

fn configure_generators(ctx: &StepContext<'_>) -> Result<()> {
    inject_into_class(ctx, "config/application.rb", "Application", GENERATORS)
}

fn configure_mailers_preview_path(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.ensure_directory("spec/mailers/previews", true)?;
    ctx.actions.inject_at(
        "config/environments/development.rb",
        MAILER_PREVIEWS,
        &Pattern::literal("\nend"),
        Position::Before,
    )
}

fn configure_hound(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("hound.yml", ".hound.yml", false)?;
    ctx.actions.copy("style_guides/ruby.yml", "config/style_guides/ruby.yml", false)?;
    ctx.actions.copy("style_guides/javascript.json", "config/style_guides/javascript.json", false)?;
    ctx.actions.copy(
        "style_guides/javascript_ignore",
        "config/style_guides/.javascript_ignore",
        false,
    )
}

fn set_up_factory_girl_for_rspec(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("factory_girl_rspec.rb", "spec/support/factory_girl.rb", false)
}

fn test_factories_first(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("factories_spec_rake_task.rb", "lib/tasks/factories_test.rake", false)
}

fn generate_rspec(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.run_external("bundle", ["exec", "rails", "generate", "rspec:install"], None)?;
    Ok(())
}

fn configure_rspec(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.remove_file("spec/spec_helper.rb")?;
    ctx.actions.remove_file("spec/rails_helper.rb")?;
    ctx.actions.render_template(
        "rails_helper.rb.j2",
        "spec/rails_helper.rb",
        &ctx.template_context(),
        false,
    )?;
    ctx.actions.copy("spec_helper.rb", "spec/spec_helper.rb", false)
}

fn use_spring_binstubs(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.run_external("bundle", ["exec", "spring", "binstub", "--all"], None)?;
    Ok(())
}

fn configure_background_jobs_for_rspec(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("background_jobs_rspec.rb", "spec/support/background_jobs.rb", false)?;
    if ctx.options.using_active_record() {
        ctx.actions.run_external(
            "bundle",
            ["exec", "rails", "generate", "delayed_job:active_record"],
            None,
        )?;
    }
    if ctx.options.using_mongoid() {
        ctx.actions.run_external("bundle", ["exec", "rails", "generate", "delayed_job"], None)?;
    }
    Ok(())
}

fn enable_database_cleaner(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.render_template(
        "database_cleaner_rspec.rb.j2",
        "spec/support/database_cleaner.rb",
        &ctx.template_context(),
        false,
    )
}

fn configure_spec_support_features(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.ensure_directory("spec/features", true)?;
    ctx.actions.ensure_directory("spec/support/features", true)
}

fn configure_i18n_in_specs(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("i18n.rb", "spec/support/i18n.rb", false)
}

fn configure_action_mailer_in_specs(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("action_mailer.rb", "spec/support/action_mailer.rb", false)
}

fn configure_travis(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.render_template("travis.yml.j2", ".travis.yml", &ctx.template_context(), false)
}

fn configure_smtp(ctx: &StepContext<'_>) -> Result<()> {
    let production = "config/environments/production.rb";
    ctx.actions.copy("smtp.rb", "config/smtp.rb", false)?;
    ctx.actions.prepend(production, "require Rails.root.join('config/smtp')\n")?;
    ctx.actions.inject_at(
        production,
        SMTP_DELIVERY,
        &Pattern::literal("config.action_mailer.raise_delivery_errors = false"),
        Position::After,
    )
}

fn enable_rack_deflater(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.inject_at(
        "config/environments/production.rb",
        RACK_DEFLATER,
        &Pattern::regex(r"config\.serve_static_(assets|files) = .*")?,
        Position::After,
    )
}

fn configure_newrelic(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.render_template("newrelic.yml.j2", "config/newrelic.yml", &ctx.template_context(), false)
}

fn setup_staging_environment(ctx: &StepContext<'_>) -> Result<()> {
    let staging_file = "config/environments/staging.rb";
    ctx.actions.copy("staging.rb", staging_file, false)?;
    ctx.actions.append(staging_file, STAGING_CONFIGURE)
}

fn setup_secret_token(ctx: &StepContext<'_>) -> Result<()> {
    let context = merge_context(
        ctx,
        json!({
            "development_secret": ctx.generate_secret(),
            "test_secret": ctx.generate_secret(),
        }),
    );
    ctx.actions.render_template("secrets.yml.j2", "config/secrets.yml", &context, true)
}

fn create_partials_directory(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.ensure_directory("app/views/application", false)
}

fn create_shared_flashes(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("_flashes.html.erb", "app/views/application/_flashes.html.erb", false)
}

fn create_shared_javascripts(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("_javascript.html.erb", "app/views/application/_javascript.html.erb", false)
}

fn create_application_layout(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.render_template(
        "roll_layout.html.erb.j2",
        "app/views/layouts/application.html.erb",
        &ctx.template_context(),
        true,
    )
}

fn configure_action_mailer(ctx: &StepContext<'_>) -> Result<()> {
    let name = &ctx.options.app_slug();
    let hosts = [
        ("development", format!("{name}.local")),
        ("test", "www.example.com".to_string()),
        ("staging", format!("staging.{name}.com")),
        ("production", format!("{name}.com")),
    ];
    for (environment, host) in hosts {
        let setting = format!("config.action_mailer.default_url_options = {{ host: '{host}' }}");
        configure_environment(ctx, environment, &setting)?;
    }
    Ok(())
}

fn configure_time_zone(ctx: &StepContext<'_>) -> Result<()> {
    inject_into_class(ctx, "config/application.rb", "Application", UTC_TIME_ZONE)
}

fn fix_i18n_deprecation_warning(ctx: &StepContext<'_>) -> Result<()> {
    inject_into_class(ctx, "config/application.rb", "Application", I18N_LOCALES)
}

fn configure_time_formats(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.remove_file("config/locales/en.yml")?;
    ctx.actions.copy("config_locales_en.yml", "config/locales/en.yml", false)
}

fn configure_rack_timeout(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("rack_timeout.rb", "config/initializers/rack_timeout.rb", false)
}

fn configure_simple_form(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.run_external("bundle", ["exec", "rails", "generate", "simple_form:install"], None)?;
    Ok(())
}

fn disable_xml_params(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("disable_xml_params.rb", "config/initializers/disable_xml_params.rb", false)
}

fn setup_default_rake_task(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.append("Rakefile", DEFAULT_RAKE_TASK)
}

fn configure_unicorn(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("unicorn.rb", "config/unicorn.rb", false)
}

fn setup_foreman(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("sample.env", ".sample.env", false)?;
    ctx.actions.copy("Procfile", "Procfile", false)
}

fn setup_bourbon(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.remove_file("app/assets/stylesheets/application.css")?;
    ctx.actions.copy("application.scss", "app/assets/stylesheets/application.scss", false)
}

fn install_bitters(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.run_external(
        "bundle",
        ["exec", "bitters", "install", "--path", "app/assets/stylesheets"],
        None,
    )?;
    Ok(())
}

fn copy_miscellaneous_files(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("errors.rb", "config/initializers/errors.rb", false)?;
    ctx.actions.copy("json_encoding.rb", "config/initializers/json_encoding.rb", false)
}

fn customize_error_page(ctx: &StepContext<'_>) -> Result<()> {
    for page in ctx.args() {
        let path = format!("public/{page}.html");
        ctx.actions.inject_at(&path, ERROR_PAGE_META, &Pattern::literal("<head>\n"), Position::After)?;
        ctx.actions.replace_pattern(&path, &Pattern::regex(r"<!--.+-->\n")?, "", Occurrence::All)?;
    }
    Ok(())
}

fn remove_routes_comment_lines(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.replace_pattern(
        "config/routes.rb",
        &Pattern::regex(r"(?s)Rails\.application\.routes\.draw do.*end")?,
        "Rails.application.routes.draw do\nend",
        Occurrence::First,
    )
}

fn gitignore_files(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.remove_file(".gitignore")?;
    ctx.actions.copy("roll_gitignore", ".gitignore", false)?;
    for dir in KEPT_DIRECTORIES {
        ctx.actions.ensure_directory(dir, true)?;
    }
    Ok(())
}

fn init_git(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.run_external("git", ["init"], None)?;
    Ok(())
}

fn create_heroku_apps(ctx: &StepContext<'_>) -> Result<()> {
    let slug = ctx.options.app_slug();
    let extra: Vec<&str> = ctx.options.heroku.flags.split_whitespace().collect();
    for environment in ENVIRONMENTS {
        let app = format!("{slug}-{environment}");
        let mut create = vec!["create", app.as_str(), "--remote", environment];
        create.extend(extra.iter().copied());
        ctx.actions.run_external("heroku", &create, None)?;

        let rack_env = format!("RACK_ENV={environment}");
        let rails_env = format!("RAILS_ENV={environment}");
        ctx.actions.run_external(
            "heroku",
            ["config:set", rack_env.as_str(), rails_env.as_str(), "--remote", environment],
            None,
        )?;
        ctx.actions.run_external(
            "heroku",
            ["config:set", "RAILS_SERVE_STATIC_FILES=true", "--remote", environment],
            None,
        )?;
    }
    Ok(())
}

fn set_heroku_remotes(ctx: &StepContext<'_>) -> Result<()> {
    let slug = ctx.options.app_slug();
    let remotes = format!(
        "
# Set up staging and production git remotes
git remote add staging git@heroku.com:{slug}-staging.git
git remote add production git@heroku.com:{slug}-production.git
"
    );
    ctx.actions.append("bin/setup", &remotes)
}

fn set_heroku_rails_secrets(ctx: &StepContext<'_>) -> Result<()> {
    for environment in ENVIRONMENTS {
        let secret = format!("SECRET_KEY_BASE={}", ctx.generate_secret());
        ctx.actions.run_external("heroku", ["config:set", secret.as_str(), "--remote", environment], None)?;
    }
    Ok(())
}

fn provide_deploy_script(ctx: &StepContext<'_>) -> Result<()> {
    ctx.actions.copy("bin_deploy", "bin/deploy", false)?;
    ctx.actions.make_executable("bin/deploy")?;
    ctx.actions.append("README.md", DEPLOY_INSTRUCTIONS)
}

fn outro(_ctx: &StepContext<'_>) -> Result<()> {
    Ok(())
}

fn uses_bundle(options: &Options) -> bool {
    !options.skips(SkipFlag::Bundle)
}

/// Every file-level step of the recipe.
pub fn steps() -> Vec<Step> {
    let mut steps = vec![
        Step::action("create_rails_app", create_rails_app),
        Step::action("readme", readme),
        Step::action("bundle_install", bundle_install).when("bundle", uses_bundle),
        Step::action("replace_gemfile", replace_gemfile),
        Step::action("set_ruby_to_version_being_used", set_ruby_to_version_being_used),
        Step::action("setup_heroku_specific_gems", setup_heroku_specific_gems)
            .when("heroku", |o| o.using_heroku()),
        Step::action("use_postgres_config_template", use_postgres_config_template)
            .when("database postgresql", |o| o.database == Database::Postgresql),
        Step::action("use_mongoid_config_template", use_mongoid_config_template)
            .when("database mongoid", |o| o.using_mongoid()),
        Step::action("create_database", create_database).when("bundle", uses_bundle),
        Step::action("raise_on_delivery_errors", raise_on_delivery_errors),
        Step::action("raise_on_unpermitted_parameters", raise_on_unpermitted_parameters),
        Step::action("provide_setup_script", provide_setup_script),
        Step::action("provide_dev_prime_task", provide_dev_prime_task),
        Step::action("configure_generators", configure_generators),
        Step::action("configure_mailers_preview_path", configure_mailers_preview_path),
        Step::action("configure_hound", configure_hound),
        Step::action("set_up_factory_girl_for_rspec", set_up_factory_girl_for_rspec),
        Step::action("test_factories_first", test_factories_first),
        Step::action("generate_rspec", generate_rspec).when("bundle", uses_bundle),
        Step::action("configure_rspec", configure_rspec),
        Step::action("use_spring_binstubs", use_spring_binstubs).when("bundle", uses_bundle),
        Step::action("configure_background_jobs_for_rspec", configure_background_jobs_for_rspec)
            .when("bundle", uses_bundle),
        Step::action("enable_database_cleaner", enable_database_cleaner),
        Step::action("configure_spec_support_features", configure_spec_support_features),
        Step::action("configure_i18n_in_specs", configure_i18n_in_specs),
        Step::action("configure_action_mailer_in_specs", configure_action_mailer_in_specs),
        Step::action("configure_travis", configure_travis),
        Step::action("configure_smtp", configure_smtp),
        Step::action("enable_rack_deflater", enable_rack_deflater),
        Step::action("configure_newrelic", configure_newrelic),
        Step::action("setup_staging_environment", setup_staging_environment)
            .say("Setting up the staging environment"),
        Step::action("setup_secret_token", setup_secret_token)
            .say("Moving secret token out of version control"),
        Step::action("create_partials_directory", create_partials_directory),
        Step::action("create_shared_flashes", create_shared_flashes),
        Step::action("create_shared_javascripts", create_shared_javascripts),
        Step::action("create_application_layout", create_application_layout),
        Step::action("configure_action_mailer", configure_action_mailer),
        Step::action("configure_time_zone", configure_time_zone)
            .when("active record", |o| o.using_active_record()),
        Step::action("fix_i18n_deprecation_warning", fix_i18n_deprecation_warning),
        Step::action("configure_time_formats", configure_time_formats),
        Step::action("configure_rack_timeout", configure_rack_timeout),
        Step::action("configure_simple_form", configure_simple_form).when("bundle", uses_bundle),
        Step::action("disable_xml_params", disable_xml_params),
        Step::action("setup_default_rake_task", setup_default_rake_task),
        Step::action("configure_unicorn", configure_unicorn),
        Step::action("setup_foreman", setup_foreman),
        Step::action("setup_bourbon", setup_bourbon),
        Step::action("install_bitters", install_bitters).when("bundle", uses_bundle),
        Step::action("copy_miscellaneous_files", copy_miscellaneous_files)
            .say("Copying miscellaneous support files"),
        Step::action("remove_routes_comment_lines", remove_routes_comment_lines),
        Step::action("gitignore_files", gitignore_files),
        Step::action("init_git", init_git),
        Step::action("create_heroku_apps", create_heroku_apps),
        Step::action("set_heroku_remotes", set_heroku_remotes),
        Step::action("set_heroku_rails_secrets", set_heroku_rails_secrets),
        Step::action("provide_deploy_script", provide_deploy_script),
        Step::action("outro", outro).say("Congratulations!"),
    ];
    steps.extend(ERROR_PAGES.iter().map(|page| {
        Step::action(format!("customize_error_page_{page}"), customize_error_page).with_args([*page])
    }));
    steps
}

/// Names of the per-page error customisation steps.
pub fn error_page_steps() -> Vec<String> {
    ERROR_PAGES.iter().map(|page| format!("customize_error_page_{page}")).collect()
}
