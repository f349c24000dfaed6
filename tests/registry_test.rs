use roll::error::Error;
use roll::options::{Database, Options, SkipFlag};
use roll::registry::StepRegistry;
use roll::step::Step;

fn noop(name: &str) -> Step {
    Step::action(name, |_| Ok(()))
}

fn registry(steps: Vec<Step>) -> StepRegistry {
    let mut registry = StepRegistry::new();
    for step in steps {
        registry.register(step).unwrap();
    }
    registry
}

#[test]
fn test_resolve_is_deterministic() {
    let registry = registry(vec![
        noop("readme").when("always", |_| true).say("Writing README"),
        Step::group("setup", ["readme"]),
    ]);

    let first = registry.resolve("readme").unwrap().describe();
    let second = registry.resolve("readme").unwrap().describe();

    assert_eq!(first, second);
    assert_eq!(first.guard.as_deref(), Some("always"));
    assert_eq!(first.announcement.as_deref(), Some("Writing README"));
    assert_eq!(registry.resolve("setup").unwrap().describe().children, Some(vec!["readme".to_string()]));
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["readme", "setup"]);
}

#[test]
fn test_resolve_unknown_step() {
    let registry = registry(vec![noop("readme")]);

    match registry.resolve("missing") {
        Err(Error::UnknownStep { name }) => assert_eq!(name, "missing"),
        other => panic!("Expected UnknownStep, got {other:?}"),
    }
}

#[test]
fn test_register_duplicate_step() {
    let mut registry = registry(vec![noop("readme")]);

    let result = registry.register(noop("readme"));

    assert!(matches!(result, Err(Error::DuplicateStep { .. })));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_validate_unknown_nested_step() {
    let registry = registry(vec![Step::group("setup", ["readme", "ghost"]), noop("readme")]);

    let result = registry.validate(&["setup"], &Options::new("blog"));

    match result {
        Err(Error::UnknownStep { name }) => assert_eq!(name, "ghost"),
        other => panic!("Expected UnknownStep, got {other:?}"),
    }
}

#[test]
fn test_validate_recursive_group() {
    let registry = registry(vec![
        Step::group("outer", ["inner"]),
        Step::group("inner", ["readme", "outer"]),
        noop("readme"),
    ]);

    let result = registry.validate(&["outer"], &Options::new("blog"));

    assert!(matches!(result, Err(Error::RecursiveStep { name }) if name == "outer"));
}

#[test]
fn test_validate_repeated_sibling_is_not_recursion() {
    let registry = registry(vec![Step::group("twice", ["readme", "readme"]), noop("readme")]);

    assert!(registry.validate(&["twice", "readme"], &Options::new("blog")).is_ok());
}

#[test]
fn test_validate_conflict_ignores_guards() {
    let registry = registry(vec![
        Step::group("database", ["readme"])
            .when("never", |_| false)
            .conflicts_with("Active Record should be skipped when using mongoid", |o| {
                o.using_mongoid() && o.using_active_record()
            }),
        noop("readme"),
    ]);
    let mongoid = Options::new("blog").with_database(Database::Mongoid);

    match registry.validate(&["database"], &mongoid) {
        Err(Error::GuardConfigurationError { step, message }) => {
            assert_eq!(step, "database");
            assert!(message.contains("mongoid"));
        }
        other => panic!("Expected GuardConfigurationError, got {other:?}"),
    }

    let without_active_record = mongoid.with_skip(SkipFlag::ActiveRecord);
    assert!(registry.validate(&["database"], &without_active_record).is_ok());
}
