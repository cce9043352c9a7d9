//! Root certificate import

use kyma_core::{ExternalError, Step};
use thiserror::Error;
use tracing::debug;

use crate::trust::{Certifier, TrustStore};

pub const CERTIFICATE_IMPORTED: &str = "Kyma root certificate imported";
pub const MANUAL_IMPORT: &str = "Manual OS-specific instructions for certificate import";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Could not retrieve the certificate")]
    Retrieval,

    #[error("failed to import the certificate: {0}")]
    TrustStore(#[source] ExternalError),
}

/// Imports the Kyma root certificate into the OS trust store
///
/// Without `wait` the installation may still be running and the certificate
/// may not exist yet. Nothing is attempted then: the step gets one error
/// entry pointing to the manual instructions and stays unfinished.
///
/// # Arguments
/// * `step` - Running step to report on
/// * `certifier` - Source of the certificate
/// * `trust_store` - Destination of the certificate
/// * `wait` - Whether the installation was awaited
pub fn import_certificate(
    step: &mut dyn Step,
    certifier: &dyn Certifier,
    trust_store: &dyn TrustStore,
    wait: bool,
) -> Result<(), ImportError> {
    if !wait {
        step.error(MANUAL_IMPORT);
        return Ok(());
    }

    let certificate = match certifier.retrieve() {
        Some(certificate) if !certificate.is_empty() => certificate,
        _ => return Err(ImportError::Retrieval),
    };
    debug!("Retrieved {} byte root certificate", certificate.len());

    trust_store
        .import(&certificate)
        .map_err(ImportError::TrustStore)?;

    step.status(CERTIFICATE_IMPORTED);
    step.succeed();
    Ok(())
}
