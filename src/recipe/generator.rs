//! Generator groups: the ordered composition of builder steps.

use super::builder::error_page_steps;
use crate::constants::DEFAULT_RECIPE;
use crate::options::SkipFlag;
use crate::step::Step;

pub fn groups() -> Vec<Step> {
    vec![
        Step::group(
            "customize_gemfile",
            [
                "replace_gemfile",
                "set_ruby_to_version_being_used",
                "setup_heroku_specific_gems",
                "bundle_install",
            ],
        ),
        Step::group(
            "setup_database",
            ["use_postgres_config_template", "use_mongoid_config_template", "create_database"],
        )
        .conflicts_with("Active Record should be skipped when using mongoid", |o| {
            o.using_mongoid() && o.using_active_record()
        })
        .say("Setting up database"),
        Step::group(
            "setup_development_environment",
            [
                "raise_on_delivery_errors",
                "raise_on_unpermitted_parameters",
                "provide_setup_script",
                "provide_dev_prime_task",
                "configure_generators",
                "configure_mailers_preview_path",
            ],
        )
        .say("Setting up the development environment"),
        Step::group(
            "setup_test_environment",
            [
                "set_up_factory_girl_for_rspec",
                "test_factories_first",
                "generate_rspec",
                "configure_rspec",
                "use_spring_binstubs",
                "configure_background_jobs_for_rspec",
                "enable_database_cleaner",
                "configure_spec_support_features",
                "configure_i18n_in_specs",
                "configure_action_mailer_in_specs",
                "configure_hound",
                "configure_travis",
            ],
        )
        .say("Setting up the test environment"),
        Step::group(
            "setup_production_environment",
            ["configure_smtp", "enable_rack_deflater", "configure_newrelic"],
        )
        .say("Setting up the production environment"),
        Step::group(
            "create_roll_views",
            [
                "create_partials_directory",
                "create_shared_flashes",
                "create_shared_javascripts",
                "create_application_layout",
            ],
        )
        .say("Creating roll views"),
        Step::group(
            "configure_app",
            [
                "configure_action_mailer",
                "configure_time_zone",
                "fix_i18n_deprecation_warning",
                "configure_time_formats",
                "configure_rack_timeout",
                "configure_simple_form",
                "disable_xml_params",
                "setup_default_rake_task",
                "configure_unicorn",
                "setup_foreman",
            ],
        )
        .say("Configuring app"),
        Step::group("setup_stylesheets", ["setup_bourbon", "install_bitters"])
            .say("Setting up stylesheets"),
        Step::group("customize_error_pages", error_page_steps())
            .say("Customizing the 500/404/422 pages"),
        Step::group("setup_git", ["gitignore_files", "init_git"])
            .when("git", |o| !o.skips(SkipFlag::Git))
            .say("Initializing git"),
        Step::group(
            "setup_heroku",
            [
                "create_heroku_apps",
                "set_heroku_remotes",
                "set_heroku_rails_secrets",
                "provide_deploy_script",
            ],
        )
        .when("heroku", |o| o.using_heroku())
        .say("Creating Heroku apps"),
        Step::group(
            "roll_customization",
            [
                "customize_gemfile",
                "setup_database",
                "setup_development_environment",
                "setup_test_environment",
                "setup_production_environment",
                "setup_staging_environment",
                "setup_secret_token",
                "create_roll_views",
                "configure_app",
                "setup_stylesheets",
                "copy_miscellaneous_files",
                "customize_error_pages",
                "remove_routes_comment_lines",
                "setup_git",
                "setup_heroku",
                "outro",
            ],
        ),
        Step::group(DEFAULT_RECIPE, ["create_rails_app", "readme", "roll_customization"]),
    ]
}
