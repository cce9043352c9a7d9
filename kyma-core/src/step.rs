//! Trackable units of pipeline work
//!
//! A step has an immutable description, a lifecycle state and three
//! append-only logs (statuses, infos, errors). The [`Step`] trait is the
//! capability set used by workflow bodies; implementations decide where the
//! logs go:
//! - [`RecordingStep`]: in-memory accumulation, queried by tests
//! - [`TracingStep`]: structured tracing events for non-interactive runs
//! - the CLI renders steps to the terminal
//!
//! [`StepRecord`] holds the state machine shared by all implementations.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{error, info, warn};

/// Lifecycle state of a step
///
/// `Pending -> Running -> {Succeeded | Failed | Stopped}`. Terminal states are
/// never left once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Aborted by the operator's choice, not an error
    Stopped,
}

impl StepState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Stopped)
    }
}

/// Which log stream an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepLog {
    Status,
    Info,
    Error,
}

/// State machine and logs of a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    description: String,
    state: StepState,
    statuses: Vec<String>,
    infos: Vec<String>,
    errors: Vec<String>,
}

impl StepRecord {
    /// Creates a pending step record
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            state: StepState::Pending,
            statuses: Vec::new(),
            infos: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }

    pub fn infos(&self) -> &[String] {
        &self.infos
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Moves the step from Pending to Running
    ///
    /// Returns false and leaves the state untouched if the step is not pending.
    pub fn begin(&mut self) -> bool {
        self.transition(StepState::Pending, StepState::Running)
    }

    /// Moves a running step into a terminal state
    ///
    /// Returns false and leaves the state untouched if the step is not running
    /// or `state` is not terminal.
    pub fn finish(&mut self, state: StepState) -> bool {
        if !state.is_terminal() {
            warn!(
                step = %self.description,
                ?state,
                "Refusing to finish step with a non-terminal state"
            );
            return false;
        }
        self.transition(StepState::Running, state)
    }

    /// Appends a message to one of the logs
    pub fn push(&mut self, log: StepLog, message: impl Into<String>) {
        let message = message.into();
        match log {
            StepLog::Status => self.statuses.push(message),
            StepLog::Info => self.infos.push(message),
            StepLog::Error => self.errors.push(message),
        }
    }

    fn transition(&mut self, from: StepState, to: StepState) -> bool {
        if self.state != from {
            warn!(
                step = %self.description,
                current = ?self.state,
                requested = ?to,
                "Ignoring illegal step transition"
            );
            return false;
        }
        self.state = to;
        true
    }
}

/// Capability set of a running step
///
/// Workflow bodies only see this trait, so the same body runs against the
/// terminal renderer, the tracing backend and the in-memory recorder.
pub trait Step {
    fn description(&self) -> &str;

    fn state(&self) -> StepState;

    /// Moves the step to Running. Called by the pipeline before the body runs.
    fn begin(&mut self);

    /// Records a visible progress marker
    fn status(&mut self, message: &str);

    /// Records a non-essential detail
    fn info(&mut self, message: &str);

    /// Records an error. Does not terminate the step.
    fn error(&mut self, message: &str);

    fn succeed(&mut self);

    fn fail(&mut self);

    fn stop(&mut self);

    fn is_successful(&self) -> bool {
        self.state() == StepState::Succeeded
    }

    fn is_stopped(&self) -> bool {
        self.state() == StepState::Stopped
    }
}

/// Creates the step for each pipeline stage
pub trait StepFactory {
    type Step: Step;

    /// Creates a new pending step
    fn start(&mut self, description: &str) -> Self::Step;
}

// =============================================================================
// In-memory recorder
// =============================================================================

/// Step that accumulates its logs in memory
///
/// Clones share the same record, so a test can keep a handle while the
/// pipeline owns and drops the other.
#[derive(Debug, Clone)]
pub struct RecordingStep {
    description: String,
    record: Rc<RefCell<StepRecord>>,
}

impl RecordingStep {
    /// Creates a pending recording step
    pub fn new(description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            record: Rc::new(RefCell::new(StepRecord::new(description.clone()))),
            description,
        }
    }

    /// Creates a recording step that is already running
    ///
    /// Useful for exercising a step body directly, without a pipeline.
    pub fn running(description: impl Into<String>) -> Self {
        let mut step = Self::new(description);
        step.begin();
        step
    }

    pub fn statuses(&self) -> Vec<String> {
        self.record.borrow().statuses().to_vec()
    }

    pub fn infos(&self) -> Vec<String> {
        self.record.borrow().infos().to_vec()
    }

    pub fn errors(&self) -> Vec<String> {
        self.record.borrow().errors().to_vec()
    }

    /// Snapshot of the full record
    pub fn record(&self) -> StepRecord {
        self.record.borrow().clone()
    }
}

impl Step for RecordingStep {
    fn description(&self) -> &str {
        &self.description
    }

    fn state(&self) -> StepState {
        self.record.borrow().state()
    }

    fn begin(&mut self) {
        self.record.borrow_mut().begin();
    }

    fn status(&mut self, message: &str) {
        self.record.borrow_mut().push(StepLog::Status, message);
    }

    fn info(&mut self, message: &str) {
        self.record.borrow_mut().push(StepLog::Info, message);
    }

    fn error(&mut self, message: &str) {
        self.record.borrow_mut().push(StepLog::Error, message);
    }

    fn succeed(&mut self) {
        self.record.borrow_mut().finish(StepState::Succeeded);
    }

    fn fail(&mut self) {
        self.record.borrow_mut().finish(StepState::Failed);
    }

    fn stop(&mut self) {
        self.record.borrow_mut().finish(StepState::Stopped);
    }
}

/// Factory that remembers every step it started
#[derive(Debug, Default)]
pub struct RecordingFactory {
    steps: Vec<RecordingStep>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// All steps started so far, in order
    pub fn steps(&self) -> &[RecordingStep] {
        &self.steps
    }

    /// Descriptions of all steps started so far, in order
    pub fn descriptions(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| step.description().to_string())
            .collect()
    }

    /// Looks up a started step by description
    pub fn step(&self, description: &str) -> Option<&RecordingStep> {
        self.steps
            .iter()
            .find(|step| step.description() == description)
    }
}

impl StepFactory for RecordingFactory {
    type Step = RecordingStep;

    fn start(&mut self, description: &str) -> RecordingStep {
        let step = RecordingStep::new(description);
        self.steps.push(step.clone());
        step
    }
}

// =============================================================================
// Tracing backend
// =============================================================================

/// Step that reports through tracing events
///
/// Used when output is not attached to an interactive terminal.
#[derive(Debug)]
pub struct TracingStep {
    record: StepRecord,
}

impl Step for TracingStep {
    fn description(&self) -> &str {
        self.record.description()
    }

    fn state(&self) -> StepState {
        self.record.state()
    }

    fn begin(&mut self) {
        if self.record.begin() {
            info!(step = %self.record.description(), "Step started");
        }
    }

    fn status(&mut self, message: &str) {
        info!(step = %self.record.description(), "{}", message);
        self.record.push(StepLog::Status, message);
    }

    fn info(&mut self, message: &str) {
        info!(step = %self.record.description(), detail = true, "{}", message);
        self.record.push(StepLog::Info, message);
    }

    fn error(&mut self, message: &str) {
        error!(step = %self.record.description(), "{}", message);
        self.record.push(StepLog::Error, message);
    }

    fn succeed(&mut self) {
        if self.record.finish(StepState::Succeeded) {
            info!(step = %self.record.description(), "Step succeeded");
        }
    }

    fn fail(&mut self) {
        if self.record.finish(StepState::Failed) {
            error!(
                step = %self.record.description(),
                errors = self.record.errors().len(),
                "Step failed"
            );
        }
    }

    fn stop(&mut self) {
        if self.record.finish(StepState::Stopped) {
            warn!(step = %self.record.description(), "Step stopped");
        }
    }
}

/// Factory for [`TracingStep`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFactory;

impl StepFactory for TracingFactory {
    type Step = TracingStep;

    fn start(&mut self, description: &str) -> TracingStep {
        TracingStep {
            record: StepRecord::new(description),
        }
    }
}
