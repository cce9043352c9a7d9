//! Kyma installation workflow
//!
//! Deploys the Kyma installer, hands it the `Installation` custom resource
//! and, unless asked not to, waits for the installer to finish before
//! trusting the cluster's root certificate.

use kyma_core::{ExternalError, PipelineError, StepFactory, StepPipeline};
use kyma_manifest::{
    ImageRewriter, LabelStripper, ManifestDocumentSet, ManifestError, StructuralError, Value, path,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::kubectl::{InstallationMonitor, ManifestApplier};
use crate::trust::{Certifier, TrustStore};
use crate::workflow::certificate::{ImportError, import_certificate};

pub const STEP_LOAD: &str = "Loading installation files";
pub const STEP_PREPARE: &str = "Preparing installation files";
pub const STEP_DEPLOY_INSTALLER: &str = "Deploying Kyma installer";
pub const STEP_REQUEST: &str = "Requesting Kyma installation";
pub const STEP_WAIT: &str = "Waiting for Kyma installation";
pub const STEP_CERTIFICATE: &str = "Importing Kyma certificate";

/// Label that makes the installer start working
pub const INSTALL_TRIGGER: &str = "action=install";

const INSTALLATION_KIND: &str = "Installation";
const DEFAULT_INSTALLATION: &str = "kyma-installation";
const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    External(#[from] ExternalError),

    #[error("invalid manifest {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("{} contains no Installation resource", .0.display())]
    MissingInstallation(PathBuf),
}

/// Flag values of `install`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// Manifest of the installer Deployment and its supporting resources
    pub installer_manifest: PathBuf,
    /// Manifest holding the `Installation` custom resource
    pub installation_cr: PathBuf,
    /// Replaces the installer image
    pub custom_image: Option<String>,
    pub no_wait: bool,
    pub timeout: Duration,
}

/// External systems the installation workflow talks to
pub struct InstallCollaborators<'a> {
    pub applier: &'a dyn ManifestApplier,
    pub monitor: &'a dyn InstallationMonitor,
    pub certifier: &'a dyn Certifier,
    pub trust_store: &'a dyn TrustStore,
}

/// Where the `Installation` resource lives in the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
struct InstallationRef {
    resource: String,
    namespace: String,
}

impl InstallationRef {
    fn from_documents(set: &ManifestDocumentSet, source: &Path) -> Result<Self, InstallError> {
        let installation = set
            .documents_of_kind(INSTALLATION_KIND)
            .next()
            .ok_or_else(|| InstallError::MissingInstallation(source.to_path_buf()))?;

        let field = |key: &str| {
            installation
                .get(&path(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Ok(Self {
            resource: format!(
                "installation/{}",
                field("metadata.name").unwrap_or_else(|| DEFAULT_INSTALLATION.to_string())
            ),
            namespace: field("metadata.namespace")
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        })
    }
}

fn load(path: &Path) -> Result<ManifestDocumentSet, InstallError> {
    let content = std::fs::read_to_string(path).map_err(|e| ExternalError::io(path, e))?;
    ManifestDocumentSet::from_yaml_str(&content).map_err(|source| InstallError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Rewrites the image of the Deployments in `set`, leaving other documents alone
fn rewrite_installer_image(
    set: &ManifestDocumentSet,
    rewriter: &ImageRewriter,
) -> Result<ManifestDocumentSet, StructuralError> {
    let positions: Vec<usize> = set
        .documents()
        .iter()
        .enumerate()
        .filter(|(_, document)| document.kind() == Some("Deployment"))
        .map(|(index, _)| index)
        .collect();
    let deployments: ManifestDocumentSet = positions
        .iter()
        .map(|&index| set.documents()[index].clone())
        .collect::<Vec<_>>()
        .into();

    let rewritten = rewriter.rewrite(&deployments).map_err(|err| match err {
        StructuralError::Document { index, source } => StructuralError::Document {
            index: positions.get(index).copied().unwrap_or(index),
            source,
        },
        other => other,
    })?;

    let mut result = set.clone();
    for (index, document) in positions.into_iter().zip(rewritten) {
        result.documents_mut()[index] = document;
    }
    Ok(result)
}

/// Installs Kyma on the cluster kubectl points to
///
/// The `action` label is stripped from the Installation resource so that
/// applying it does not start the installer early; the label is set again
/// once the resource exists. With `no_wait` the workflow does not wait for
/// the installer and leaves the certificate import to the operator.
pub fn install<F: StepFactory>(
    pipeline: &mut StepPipeline<F>,
    options: &InstallOptions,
    collaborators: &InstallCollaborators<'_>,
) -> Result<(), PipelineError> {
    let (installer, mut installation) = pipeline.run(STEP_LOAD, |step| {
        let installer = load(&options.installer_manifest)?;
        let installation = load(&options.installation_cr)?;
        step.info(&format!(
            "{} installer and {} installation document(s)",
            installer.len(),
            installation.len()
        ));
        step.succeed();
        Ok::<_, InstallError>((installer, installation))
    })?;

    let (installer, target) = pipeline.run(STEP_PREPARE, |step| {
        let target = InstallationRef::from_documents(&installation, &options.installation_cr)?;
        LabelStripper::action().apply(&mut installation)?;

        let installer = match &options.custom_image {
            Some(image) => {
                step.info(&format!("Using installer image {}", image));
                rewrite_installer_image(&installer, &ImageRewriter::new(image.as_str()))?
            }
            None => installer,
        };
        step.succeed();
        Ok::<_, InstallError>((installer, target))
    })?;

    pipeline.run(STEP_DEPLOY_INSTALLER, |step| {
        collaborators.applier.apply(&installer)?;
        step.succeed();
        Ok::<_, InstallError>(())
    })?;

    pipeline.run(STEP_REQUEST, |step| {
        collaborators.applier.apply(&installation)?;
        collaborators
            .applier
            .label(&target.resource, Some(target.namespace.as_str()), INSTALL_TRIGGER)?;
        step.status(&format!("Requested {}", target.resource));
        step.succeed();
        Ok::<_, InstallError>(())
    })?;

    if options.no_wait {
        debug!("Not waiting for the installation to finish");
    } else {
        pipeline.run(STEP_WAIT, |step| {
            collaborators.monitor.wait_until_installed(
                &target.resource,
                Some(target.namespace.as_str()),
                options.timeout,
            )?;
            step.succeed();
            Ok::<_, InstallError>(())
        })?;
    }

    pipeline.run(STEP_CERTIFICATE, |step| {
        import_certificate(
            step,
            collaborators.certifier,
            collaborators.trust_store,
            !options.no_wait,
        )
        .map_err(InstallError::from)
    })?;

    info!("Kyma installation requested through {}", target.resource);
    Ok(())
}
