//! Kyma Platform
//!
//! External collaborators and the workflows that drive them.
//!
//! Collaborators are trait-based so workflows can be tested against fakes:
//! - [`provider`]: cluster provisioning through the gcloud CLI
//! - [`state`]: persisted cluster records
//! - [`kubeconfig`]: merging credentials into the user's kubeconfig
//! - [`kubectl`]: applying manifests and watching the installation
//! - [`trust`]: certificate retrieval and OS trust store import
//!
//! Workflows live in [`workflow`] and run as fail-fast step pipelines.

pub mod command;
pub mod kubeconfig;
pub mod kubectl;
pub mod provider;
pub mod state;
pub mod trust;
pub mod workflow;

pub use command::{CommandRunner, ToolOutput};
pub use kubeconfig::{FileKubeconfig, Kubeconfig, KubeconfigWriter};
pub use kubectl::{InstallationMonitor, Kubectl, ManifestApplier};
pub use provider::{GcloudProvisioner, Provisioner};
pub use state::{ClusterStateStore, FileStateStore};
pub use trust::{Certifier, KubectlCertifier, SystemTrustStore, TrustStore};
