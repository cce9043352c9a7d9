//! Cluster access through kubectl
//!
//! [`Kubectl`] applies manifests, labels resources and watches the Kyma
//! installation until the installer reports a final state.

use kyma_core::ExternalError;
use kyma_manifest::ManifestDocumentSet;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::command::CommandRunner;

/// Default pause between two installation status queries
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

const STATE_INSTALLED: &str = "Installed";
const STATE_ERROR: &str = "Error";

/// Creates and labels resources in the cluster
pub trait ManifestApplier {
    /// Creates or updates every document of the set
    fn apply(&self, manifests: &ManifestDocumentSet) -> Result<(), ExternalError>;

    /// Sets a `key=value` label on a resource, overwriting an existing value
    ///
    /// # Arguments
    /// * `resource` - Resource in `kind/name` form
    /// * `namespace` - Namespace of the resource, `None` for the current one
    /// * `label` - Label in `key=value` form
    fn label(&self, resource: &str, namespace: Option<&str>, label: &str) -> Result<(), ExternalError>;
}

/// Watches the installer
pub trait InstallationMonitor {
    /// Blocks until the installation resource reports it is installed
    ///
    /// # Errors
    /// Fails when the installer reports an error or `timeout` elapses
    fn wait_until_installed(
        &self,
        resource: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<(), ExternalError>;
}

/// kubectl bound to one kubeconfig
#[derive(Debug, Clone)]
pub struct Kubectl {
    runner: CommandRunner,
    binary: PathBuf,
    kubeconfig: Option<PathBuf>,
    poll_interval: Duration,
}

impl Kubectl {
    pub fn new(runner: CommandRunner) -> Self {
        Self {
            runner,
            binary: PathBuf::from("kubectl"),
            kubeconfig: None,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Uses an explicit kubeconfig instead of kubectl's default lookup
    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Starts a kubectl invocation with the global flags applied
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        if let Some(kubeconfig) = &self.kubeconfig {
            command.arg("--kubeconfig").arg(kubeconfig);
        }
        command
    }

    /// Reads one field of a resource through a JSONPath expression
    pub fn get_jsonpath(
        &self,
        resource: &str,
        namespace: Option<&str>,
        jsonpath: &str,
    ) -> Result<String, ExternalError> {
        let mut command = self.command();
        command.args(["get", resource]);
        with_namespace(&mut command, namespace);
        command.arg(format!("-o=jsonpath={}", jsonpath));
        self.runner.run(&mut command)
    }
}

fn with_namespace(command: &mut Command, namespace: Option<&str>) {
    if let Some(namespace) = namespace {
        command.args(["--namespace", namespace]);
    }
}

impl ManifestApplier for Kubectl {
    fn apply(&self, manifests: &ManifestDocumentSet) -> Result<(), ExternalError> {
        let yaml = manifests
            .to_yaml_string()
            .map_err(|e| ExternalError::Parse(e.to_string()))?;
        debug!("Applying {} document(s)", manifests.len());

        let mut command = self.command();
        command.args(["apply", "-f", "-"]);
        let output = self.runner.run_with_input(&mut command, &yaml)?;
        for line in output.lines() {
            debug!("{}", line);
        }
        Ok(())
    }

    fn label(&self, resource: &str, namespace: Option<&str>, label: &str) -> Result<(), ExternalError> {
        let mut command = self.command();
        command.args(["label", resource, label, "--overwrite"]);
        with_namespace(&mut command, namespace);
        self.runner.run(&mut command)?;
        info!("Labeled {} with {}", resource, label);
        Ok(())
    }
}

impl InstallationMonitor for Kubectl {
    fn wait_until_installed(
        &self,
        resource: &str,
        namespace: Option<&str>,
        timeout: Duration,
    ) -> Result<(), ExternalError> {
        poll_until_installed(timeout, self.poll_interval, || {
            let state = self.get_jsonpath(resource, namespace, "{.status.state}")?;
            let description = self
                .get_jsonpath(resource, namespace, "{.status.description}")
                .unwrap_or_default();
            Ok((state, description))
        })
    }
}

/// Polls `probe` until it reports the installed state
///
/// `probe` returns the installer state and its description. Failed probes
/// are logged and retried; the installer is often briefly unreachable while
/// it restarts components.
pub fn poll_until_installed<P>(timeout: Duration, interval: Duration, mut probe: P) -> Result<(), ExternalError>
where
    P: FnMut() -> Result<(String, String), ExternalError>,
{
    let started = Instant::now();
    let mut last_state = String::new();

    loop {
        match probe() {
            Ok((state, description)) => {
                let state = state.trim().to_string();
                if state == STATE_INSTALLED {
                    info!("Kyma installation finished");
                    return Ok(());
                }
                if state == STATE_ERROR {
                    return Err(ExternalError::Reported(format!(
                        "installation failed: {}",
                        description.trim()
                    )));
                }
                if state != last_state {
                    info!("Installation state: {} {}", state, description.trim());
                    last_state = state;
                }
            }
            Err(err) => warn!("Failed to read installation status: {}", err),
        }

        if started.elapsed() + interval > timeout {
            return Err(ExternalError::Timeout {
                operation: "Kyma installation".to_string(),
                after: timeout,
            });
        }
        std::thread::sleep(interval);
    }
}
