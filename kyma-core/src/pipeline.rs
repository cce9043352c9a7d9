//! Fail-fast step pipeline
//!
//! Runs workflow stages one at a time. Each stage gets a fresh step from the
//! factory, and the first failing stage aborts the pipeline: later stages are
//! never started and already completed stages are not compensated.

use tracing::{debug, error};

use crate::error::PipelineError;
use crate::step::{Step, StepFactory, StepState};

/// Sequences steps and enforces fail-fast semantics
pub struct StepPipeline<F: StepFactory> {
    factory: F,
    completed: Vec<String>,
    aborted: bool,
}

impl<F: StepFactory> StepPipeline<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            completed: Vec::new(),
            aborted: false,
        }
    }

    /// Runs one stage of the pipeline
    ///
    /// The step is moved to Running before `body` is called. The body owns
    /// the outcome of its step and finishes it with `succeed()` or `stop()`;
    /// a body returning `Ok` without doing so leaves the step unfinished. If
    /// the body returns `Err`, a still running step is marked failed and the
    /// pipeline refuses to start any further step.
    ///
    /// # Arguments
    /// * `description` - Human readable description of the stage
    /// * `body` - The work, usually one call into an external collaborator
    ///
    /// # Returns
    /// The body's value, or the body's error wrapped with the step description
    pub fn run<T, E, B>(&mut self, description: &str, body: B) -> Result<T, PipelineError>
    where
        B: FnOnce(&mut dyn Step) -> Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if self.aborted {
            debug!(step = description, "Skipping step of aborted pipeline");
            return Err(PipelineError::Aborted {
                step: description.to_string(),
            });
        }

        let mut step = self.factory.start(description);
        step.begin();

        match body(&mut step) {
            Ok(value) => {
                if step.state() == StepState::Running {
                    debug!(step = description, "Step body returned without finishing its step");
                }
                self.completed.push(description.to_string());
                Ok(value)
            }
            Err(err) => {
                if step.state() == StepState::Running {
                    step.fail();
                }
                self.aborted = true;

                let source = err.into();
                error!(step = description, error = %source, "Step failed, aborting pipeline");
                Err(PipelineError::StepFailed {
                    step: description.to_string(),
                    source,
                })
            }
        }
    }

    /// Descriptions of the steps whose bodies returned without error
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn into_factory(self) -> F {
        self.factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExternalError;
    use crate::step::RecordingFactory;

    #[test]
    fn test_run_returns_body_value() {
        let mut pipeline = StepPipeline::new(RecordingFactory::new());

        let value = pipeline
            .run("Provisioning", |step| {
                step.status("cluster created");
                step.succeed();
                Ok::<_, ExternalError>(42)
            })
            .unwrap();

        assert_eq!(value, 42);
        let step = pipeline.factory().step("Provisioning").unwrap();
        assert!(step.is_successful());
        assert_eq!(step.statuses(), vec!["cluster created".to_string()]);
        assert_eq!(pipeline.completed(), ["Provisioning"]);
    }

    #[test]
    fn test_run_marks_step_failed_and_wraps_error() {
        let mut pipeline = StepPipeline::new(RecordingFactory::new());

        let err = pipeline
            .run("Provisioning", |_| {
                Err::<(), _>(ExternalError::Parse("no clusters".to_string()))
            })
            .unwrap_err();

        assert_eq!(err.step(), Some("Provisioning"));
        assert!(err.to_string().contains("no clusters"));

        let step = pipeline.factory().step("Provisioning").unwrap();
        assert_eq!(step.state(), StepState::Failed);
        assert!(pipeline.is_aborted());
        assert!(pipeline.completed().is_empty());
    }

    #[test]
    fn test_failed_pipeline_starts_no_further_steps() {
        let mut pipeline = StepPipeline::new(RecordingFactory::new());
        let mut later_ran = false;

        let first = pipeline.run("first", |_| Err::<(), _>("boom"));
        assert_eq!(first.unwrap_err().to_string(), "first: boom");
        let err = pipeline
            .run("second", |_| {
                later_ran = true;
                Ok::<_, ExternalError>(())
            })
            .unwrap_err();

        assert!(!later_ran);
        assert!(matches!(err, PipelineError::Aborted { ref step } if step == "second"));
        assert_eq!(pipeline.factory().descriptions(), vec!["first"]);
    }

    #[test]
    fn test_body_may_stop_step() {
        let mut pipeline = StepPipeline::new(RecordingFactory::new());

        pipeline
            .run("Importing certificate", |step| {
                step.stop();
                Ok::<_, ExternalError>(())
            })
            .unwrap();

        let step = pipeline.factory().step("Importing certificate").unwrap();
        assert!(step.is_stopped());
        assert!(!pipeline.is_aborted());

        pipeline
            .run("next", |_| Ok::<_, ExternalError>(()))
            .unwrap();
        assert_eq!(pipeline.completed().len(), 2);
    }

    #[test]
    fn test_unfinished_step_is_left_running() {
        let mut pipeline = StepPipeline::new(RecordingFactory::new());

        pipeline
            .run("Importing certificate", |step| {
                step.error("manual steps required");
                Ok::<_, ExternalError>(())
            })
            .unwrap();

        let step = pipeline.factory().step("Importing certificate").unwrap();
        assert_eq!(step.state(), StepState::Running);
        assert!(!step.is_successful());
        assert!(!step.is_stopped());
        assert!(!pipeline.is_aborted());
    }

    #[test]
    fn test_body_may_fail_step_without_error() {
        let mut pipeline = StepPipeline::new(RecordingFactory::new());

        pipeline
            .run("Importing certificate", |step| {
                step.error("manual steps required");
                step.fail();
                Ok::<_, ExternalError>(())
            })
            .unwrap();

        let step = pipeline.factory().step("Importing certificate").unwrap();
        assert_eq!(step.state(), StepState::Failed);
        assert!(!pipeline.is_aborted());
    }
}
