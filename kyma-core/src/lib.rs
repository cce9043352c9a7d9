//! Kyma Core
//!
//! Core types and abstractions shared by the Kyma command-line tooling.
//!
//! This crate contains:
//! - Domain types: cluster and provider descriptions handed to provisioners
//! - Steps: trackable units of work with status/info/error logs
//! - Pipeline: fail-fast sequencing of steps
//! - Errors: validation, external collaborator and pipeline failures

pub mod domain;
pub mod error;
pub mod pipeline;
pub mod step;

pub use error::{ExternalError, PipelineError, ValidationError};
pub use pipeline::StepPipeline;
pub use step::{Step, StepFactory, StepState};
