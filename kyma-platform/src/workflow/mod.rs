//! Workflows
//!
//! Each workflow validates its inputs up front and then runs its stages
//! through a [`StepPipeline`](kyma_core::StepPipeline), talking to the
//! outside world only through the collaborator traits of this crate.

pub mod certificate;
pub mod install;
pub mod provision;

pub use certificate::{ImportError, import_certificate};
pub use install::{InstallCollaborators, InstallError, InstallOptions, install};
pub use provision::{GcpOptions, ProvisionCollaborators, provision_gcp};
