//! Named, guarded units of scaffolding work.

use std::fmt;
use std::sync::Arc;

use crate::actions::Actions;
use crate::error::Result;
use crate::options::Options;
use crate::secret::SecretGenerator;

pub type Predicate = Arc<dyn Fn(&Options) -> bool + Send + Sync>;
pub type Action = Arc<dyn Fn(&StepContext<'_>) -> Result<()> + Send + Sync>;

/// Everything a step body may touch while it runs.
pub struct StepContext<'a> {
    pub options: &'a Options,
    pub actions: &'a Actions,
    secrets: &'a dyn SecretGenerator,
    args: &'a [String],
}

impl<'a> StepContext<'a> {
    /// Bundles what a single step invocation needs.
    ///
    /// # Arguments
    /// * `options` - Resolved, read-only generator options
    /// * `actions` - File operations bound to the application root
    /// * `secrets` - Source of fresh secrets for credential steps
    /// * `args` - Positional arguments the step was registered with
    pub fn new(
        options: &'a Options,
        actions: &'a Actions,
        secrets: &'a dyn SecretGenerator,
        args: &'a [String],
    ) -> Self {
        Self { options, actions, secrets, args }
    }

    /// Positional arguments the step was registered with.
    pub fn args(&self) -> &[String] {
        self.args
    }

    /// Rendering context derived from the options.
    pub fn template_context(&self) -> serde_json::Value {
        self.options.template_context()
    }

    /// A fresh secret; only credential steps should ask for one.
    pub fn generate_secret(&self) -> String {
        self.secrets.generate()
    }
}

/// Condition deciding whether a step runs.
#[derive(Clone)]
pub struct Guard {
    description: String,
    predicate: Predicate,
}

impl Guard {
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Options) -> bool + Send + Sync + 'static,
    {
        Self { description: description.into(), predicate: Arc::new(predicate) }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn allows(&self, options: &Options) -> bool {
        (self.predicate)(options)
    }
}

/// Combination of options a step cannot work with. Checked before any step runs.
#[derive(Clone)]
pub struct Conflict {
    message: String,
    predicate: Predicate,
}

impl Conflict {
    pub fn new<F>(message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Options) -> bool + Send + Sync + 'static,
    {
        Self { message: message.into(), predicate: Arc::new(predicate) }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_present(&self, options: &Options) -> bool {
        (self.predicate)(options)
    }
}

#[derive(Clone)]
pub enum StepBody {
    /// Operations performed directly by the step.
    Action(Action),
    /// An ordered list of other registered steps.
    Group(Vec<String>),
}

#[derive(Clone)]
pub struct Step {
    name: String,
    guard: Option<Guard>,
    conflicts: Vec<Conflict>,
    args: Vec<String>,
    announcement: Option<String>,
    body: StepBody,
}

impl Step {
    /// Creates a step that performs file operations or commands directly.
    ///
    /// # Arguments
    /// * `name` - Unique name the step is registered and invoked under
    /// * `body` - Operations to perform; an `Err` halts the run
    ///
    /// # Returns
    /// * `Step` - Unguarded step without arguments
    pub fn action<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&StepContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self::with_body(name, StepBody::Action(Arc::new(body)))
    }

    /// Creates a step that runs other registered steps in order.
    ///
    /// # Arguments
    /// * `name` - Unique name the group is registered and invoked under
    /// * `steps` - Names of the nested steps, resolved when the run starts
    ///
    /// # Returns
    /// * `Step` - Unguarded group
    pub fn group<I, S>(name: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_body(name, StepBody::Group(steps.into_iter().map(Into::into).collect()))
    }

    fn with_body(name: impl Into<String>, body: StepBody) -> Self {
        Self {
            name: name.into(),
            guard: None,
            conflicts: Vec::new(),
            args: Vec::new(),
            announcement: None,
            body,
        }
    }

    /// Runs the step only when `predicate` holds for the resolved options.
    pub fn when<F>(mut self, description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Options) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(description, predicate));
        self
    }

    /// Declares an option combination that makes the whole run invalid.
    pub fn conflicts_with<F>(mut self, message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Options) -> bool + Send + Sync + 'static,
    {
        self.conflicts.push(Conflict::new(message, predicate));
        self
    }

    /// Positional arguments handed to the body through `StepContext::args`.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Message logged when the step starts.
    pub fn say(mut self, announcement: impl Into<String>) -> Self {
        self.announcement = Some(announcement.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn guard(&self) -> Option<&Guard> {
        self.guard.as_ref()
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn announcement(&self) -> Option<&str> {
        self.announcement.as_deref()
    }

    pub fn body(&self) -> &StepBody {
        &self.body
    }

    /// Whether the guard, if any, allows the step for `options`.
    pub fn should_run(&self, options: &Options) -> bool {
        self.guard.as_ref().map_or(true, |guard| guard.allows(options))
    }

    /// Summary of the definition, without the closures.
    pub fn describe(&self) -> StepDescriptor {
        StepDescriptor {
            name: self.name.clone(),
            guard: self.guard.as_ref().map(|g| g.description.clone()),
            conflicts: self.conflicts.iter().map(|c| c.message.clone()).collect(),
            args: self.args.clone(),
            announcement: self.announcement.clone(),
            children: match &self.body {
                StepBody::Action(_) => None,
                StepBody::Group(names) => Some(names.clone()),
            },
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("descriptor", &self.describe()).finish()
    }
}

/// Comparable summary of a step definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    pub name: String,
    pub guard: Option<String>,
    pub conflicts: Vec<String>,
    pub args: Vec<String>,
    pub announcement: Option<String>,
    /// Nested step names for groups, `None` for actions.
    pub children: Option<Vec<String>>,
}
