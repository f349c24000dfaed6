//! Sequential execution of a step list for one scaffolding run.
//! Steps run one at a time in declared order; the first failure halts the
//! run and nothing is rolled back.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};

use crate::actions::Actions;
use crate::constants::{EXIT_ABORTED, EXIT_FAILED};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::registry::StepRegistry;
use crate::secret::SecretGenerator;
use crate::step::{StepBody, StepContext};

/// Shared flag requesting that a run stops before its next step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the run stops before its next step.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl RunState {
    /// Process exit status for a finished run.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunState::Completed => 0,
            RunState::Aborted => EXIT_ABORTED,
            RunState::NotStarted | RunState::Running | RunState::Failed => EXIT_FAILED,
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Completed,
    Skipped,
    Failed(Error),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct LogEntry {
    pub step: String,
    pub outcome: Outcome,
    pub message: String,
    /// Nesting level; children of a group sit one level below it.
    pub depth: usize,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = match self.outcome {
            Outcome::Completed => "✓",
            Outcome::Skipped => "⊘",
            Outcome::Failed(_) => "✗",
        };
        write!(f, "{}{} {}", "  ".repeat(self.depth), mark, self.step)?;
        if !self.message.is_empty() {
            write!(f, " ({})", self.message)?;
        }
        Ok(())
    }
}

/// Ordered record of per-step outcomes.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

impl ExecutionLog {
    fn record(&mut self, step: &str, outcome: Outcome, message: impl Into<String>, depth: usize) {
        self.entries.push(LogEntry { step: step.to_string(), outcome, message: message.into(), depth });
    }

    /// Entries in the order the steps finished.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry of the step that halted the run, if any.
    pub fn failure(&self) -> Option<&LogEntry> {
        self.entries.iter().find(|entry| entry.outcome.is_failure())
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub log: ExecutionLog,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        self.state.exit_code()
    }
}

enum Flow {
    Continue,
    Halt(RunState),
}

/// Runs step lists from a registry against one application tree.
pub struct Pipeline<'a> {
    registry: &'a StepRegistry,
    actions: &'a Actions,
    secrets: &'a dyn SecretGenerator,
    cancel: CancelToken,
    state: RunState,
    log: ExecutionLog,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline that has not started yet.
    ///
    /// # Arguments
    /// * `registry` - Catalog the run list is resolved against
    /// * `actions` - File operations bound to the application root
    /// * `secrets` - Source of secrets handed to every step
    ///
    /// # Returns
    /// * `Pipeline` - Pipeline in `RunState::NotStarted` with its own cancel token
    pub fn new(
        registry: &'a StepRegistry,
        actions: &'a Actions,
        secrets: &'a dyn SecretGenerator,
    ) -> Self {
        Self {
            registry,
            actions,
            secrets,
            cancel: CancelToken::new(),
            state: RunState::NotStarted,
            log: ExecutionLog::default(),
        }
    }

    /// Replaces the cancel token, typically with one shared with a signal handler.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Validates and then executes `names` in order.
    ///
    /// Step failures do not surface as `Err`: they end the run in
    /// `RunState::Failed` with the cause recorded in the log. A step whose
    /// external command was killed by a signal after cancellation was
    /// requested ends the run in `RunState::Aborted` instead.
    ///
    /// # Errors
    /// * `Error::UnknownStep`, `Error::RecursiveStep` or
    ///   `Error::GuardConfigurationError` when validation fails; no step has run
    pub fn run<S: AsRef<str>>(mut self, names: &[S], options: &Options) -> Result<RunReport> {
        self.registry.validate(names, options)?;

        self.state = RunState::Running;
        let names: Vec<&str> = names.iter().map(|name| name.as_ref()).collect();
        self.state = match self.run_steps(&names, options, 0) {
            Flow::Continue => RunState::Completed,
            Flow::Halt(state) => state,
        };
        debug!("Pipeline finished with state {:?}", self.state);

        Ok(RunReport { state: self.state, log: self.log })
    }

    fn run_steps(&mut self, names: &[&str], options: &Options, depth: usize) -> Flow {
        for name in names {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping before '{name}'");
                return Flow::Halt(RunState::Aborted);
            }
            if let Flow::Halt(state) = self.run_step(name, options, depth) {
                return Flow::Halt(state);
            }
        }
        Flow::Continue
    }

    fn run_step(&mut self, name: &str, options: &Options, depth: usize) -> Flow {
        let registry = self.registry;
        let step = match registry.resolve(name) {
            Ok(step) => step,
            Err(e) => {
                self.log.record(name, Outcome::Failed(e), "step is not registered", depth);
                return Flow::Halt(RunState::Failed);
            }
        };

        if let Some(guard) = step.guard().filter(|guard| !guard.allows(options)) {
            debug!("Skipping '{}': {}", step.name(), guard.description());
            let message = format!("requires {}", guard.description());
            self.log.record(step.name(), Outcome::Skipped, message, depth);
            return Flow::Continue;
        }

        if let Some(announcement) = step.announcement() {
            info!("{announcement}");
        }
        debug!("Running step '{}'", step.name());

        match step.body() {
            StepBody::Group(children) => {
                let children: Vec<&str> = children.iter().map(String::as_str).collect();
                if let Flow::Halt(state) = self.run_steps(&children, options, depth + 1) {
                    return Flow::Halt(state);
                }
                self.log.record(step.name(), Outcome::Completed, "", depth);
                Flow::Continue
            }
            StepBody::Action(body) => {
                let context = StepContext::new(options, self.actions, self.secrets, step.args());
                match body(&context) {
                    Ok(()) => {
                        self.log.record(step.name(), Outcome::Completed, "", depth);
                        Flow::Continue
                    }
                    Err(e) if self.cancel.is_cancelled() && e.is_interrupted_command() => {
                        info!("Step '{}' was interrupted by cancellation", step.name());
                        let message = e.to_string();
                        self.log.record(step.name(), Outcome::Failed(e), message, depth);
                        Flow::Halt(RunState::Aborted)
                    }
                    Err(e) => {
                        error!("Step '{}' failed: {}", step.name(), e);
                        let message = e.to_string();
                        self.log.record(step.name(), Outcome::Failed(e), message, depth);
                        Flow::Halt(RunState::Failed)
                    }
                }
            }
        }
    }
}
