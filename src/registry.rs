//! Lookup table of named steps.

use indexmap::IndexMap;
use log::debug;

use crate::error::{Error, Result};
use crate::options::Options;
use crate::step::{Step, StepBody};

/// Steps keyed by name, in registration order.
#[derive(Debug, Default, Clone)]
pub struct StepRegistry {
    steps: IndexMap<String, Step>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a step under its name.
    ///
    /// # Arguments
    /// * `step` - Step to register; group children may be registered later
    ///
    /// # Errors
    /// * `Error::DuplicateStep` if a step with the same name is already registered
    pub fn register(&mut self, step: Step) -> Result<()> {
        if self.steps.contains_key(step.name()) {
            return Err(Error::DuplicateStep { name: step.name().to_string() });
        }
        debug!("Registering step '{}'", step.name());
        self.steps.insert(step.name().to_string(), step);
        Ok(())
    }

    /// Looks up a step by name.
    ///
    /// # Returns
    /// * `Result<&Step>` - The registered step
    ///
    /// # Errors
    /// * `Error::UnknownStep` if nothing is registered under `name`
    pub fn resolve(&self, name: &str) -> Result<&Step> {
        self.steps.get(name).ok_or_else(|| Error::UnknownStep { name: name.to_string() })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Registered step names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.steps.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Checks a step list before anything runs: every name (including nested
    /// ones) must be registered, groups must not include themselves, and no
    /// step may declare a conflict present in `options`.
    ///
    /// # Errors
    /// * `Error::UnknownStep`, `Error::RecursiveStep` or `Error::GuardConfigurationError`
    pub fn validate<S: AsRef<str>>(&self, names: &[S], options: &Options) -> Result<()> {
        let mut trail = Vec::new();
        for name in names {
            self.validate_step(name.as_ref(), options, &mut trail)?;
        }
        Ok(())
    }

    fn validate_step<'a>(
        &'a self,
        name: &str,
        options: &Options,
        trail: &mut Vec<&'a str>,
    ) -> Result<()> {
        let step = self.resolve(name)?;
        if trail.contains(&step.name()) {
            return Err(Error::RecursiveStep { name: step.name().to_string() });
        }

        if let Some(conflict) = step.conflicts().iter().find(|c| c.is_present(options)) {
            return Err(Error::GuardConfigurationError {
                step: step.name().to_string(),
                message: conflict.message().to_string(),
            });
        }

        if let StepBody::Group(children) = step.body() {
            trail.push(step.name());
            for child in children {
                self.validate_step(child, options, trail)?;
            }
            trail.pop();
        }
        Ok(())
    }
}
