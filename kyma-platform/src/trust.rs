//! Kyma root certificate handling
//!
//! [`Certifier`] fetches the self-signed root certificate the Kyma gateway
//! serves with, [`TrustStore`] adds it to the operating system's trusted roots.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kyma_core::ExternalError;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::kubectl::Kubectl;

const CERT_SECRET: &str = "secret/kyma-gateway-certs-cacert";
const CERT_NAMESPACE: &str = "istio-system";
const CERT_KEY: &str = "cacert";

/// Source of the Kyma root certificate
pub trait Certifier {
    /// Returns the certificate, or `None` when it is not available
    fn retrieve(&self) -> Option<Vec<u8>>;
}

/// Reads the certificate from the gateway secret
#[derive(Debug, Clone)]
pub struct KubectlCertifier {
    kubectl: Kubectl,
}

impl KubectlCertifier {
    pub fn new(kubectl: Kubectl) -> Self {
        Self { kubectl }
    }
}

impl Certifier for KubectlCertifier {
    fn retrieve(&self) -> Option<Vec<u8>> {
        let encoded = match self.kubectl.get_jsonpath(
            CERT_SECRET,
            Some(CERT_NAMESPACE),
            &format!("{{.data.{}}}", CERT_KEY),
        ) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!("Failed to read {}: {}", CERT_SECRET, err);
                return None;
            }
        };

        match STANDARD.decode(encoded.trim()) {
            Ok(certificate) => Some(certificate),
            Err(err) => {
                warn!("Certificate in {} is not valid base64: {}", CERT_SECRET, err);
                None
            }
        }
    }
}

/// Operating system certificate store
pub trait TrustStore {
    /// Adds `certificate` (PEM) to the trusted roots
    fn import(&self, certificate: &[u8]) -> Result<(), ExternalError>;

    /// How an operator imports the certificate by hand
    fn instructions(&self) -> String;
}

/// Platforms with a known trust store layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustPlatform {
    MacOs,
    Linux,
    Other(String),
}

impl TrustPlatform {
    /// The platform this binary was built for
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Imports certificates with the platform's own tooling, through `sudo`
#[derive(Debug, Clone)]
pub struct SystemTrustStore {
    runner: CommandRunner,
    platform: TrustPlatform,
}

impl SystemTrustStore {
    pub fn new(runner: CommandRunner) -> Self {
        Self::for_platform(runner, TrustPlatform::current())
    }

    pub fn for_platform(runner: CommandRunner, platform: TrustPlatform) -> Self {
        Self { runner, platform }
    }

    /// Commands that import the certificate stored at `certificate`
    pub fn import_commands(&self, certificate: &Path) -> Result<Vec<Command>, ExternalError> {
        match &self.platform {
            TrustPlatform::MacOs => {
                let mut add = Command::new("sudo");
                add.args([
                    "security",
                    "add-trusted-cert",
                    "-d",
                    "-r",
                    "trustRoot",
                    "-k",
                    "/Library/Keychains/System.keychain",
                ])
                .arg(certificate);
                Ok(vec![add])
            }
            TrustPlatform::Linux => {
                let mut copy = Command::new("sudo");
                copy.arg("cp")
                    .arg(certificate)
                    .arg("/usr/local/share/ca-certificates/kyma.crt");
                let mut update = Command::new("sudo");
                update.arg("update-ca-certificates");
                Ok(vec![copy, update])
            }
            TrustPlatform::Other(os) => Err(ExternalError::Unsupported(format!(
                "automatic certificate import on {}",
                os
            ))),
        }
    }
}

impl TrustStore for SystemTrustStore {
    fn import(&self, certificate: &[u8]) -> Result<(), ExternalError> {
        let mut staged = tempfile::Builder::new()
            .prefix("kyma-")
            .suffix(".crt")
            .tempfile()
            .map_err(|e| ExternalError::io(std::env::temp_dir(), e))?;
        staged
            .write_all(certificate)
            .and_then(|_| staged.flush())
            .map_err(|e| ExternalError::io(staged.path(), e))?;
        debug!("Staged certificate at {}", staged.path().display());

        for mut command in self.import_commands(staged.path())? {
            self.runner.run(&mut command)?;
        }

        info!("Imported Kyma root certificate into the system trust store");
        Ok(())
    }

    fn instructions(&self) -> String {
        let fetch = format!(
            "kubectl get {} -n {} -o jsonpath='{{.data.{}}}' | base64 --decode > kyma.crt",
            CERT_SECRET, CERT_NAMESPACE, CERT_KEY
        );
        let import = match &self.platform {
            TrustPlatform::MacOs => "sudo security add-trusted-cert -d -r trustRoot -k /Library/Keychains/System.keychain kyma.crt".to_string(),
            TrustPlatform::Linux => "sudo cp kyma.crt /usr/local/share/ca-certificates/ && sudo update-ca-certificates".to_string(),
            TrustPlatform::Other(os) => format!("Import kyma.crt as a trusted root certificate using the {} certificate manager", os),
        };
        format!(
            "Once the installation has finished, import the Kyma root certificate:\n  {}\n  {}",
            fetch, import
        )
    }
}
