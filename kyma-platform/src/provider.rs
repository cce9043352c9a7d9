//! Cluster provisioning
//!
//! The [`Provisioner`] trait is the seam between the provisioning workflow and
//! the infrastructure provider. [`GcloudProvisioner`] drives the `gcloud` CLI;
//! cleanup of half-created infrastructure is left to the provider.

use kyma_core::ExternalError;
use kyma_core::domain::cluster::{ClusterDescriptor, ClusterSpec, ProviderSpec};
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

use crate::command::CommandRunner;

/// Environment variable gcloud reads a service account key file from
const CREDENTIALS_ENV: &str = "CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE";

/// Creates clusters and hands out their credentials
pub trait Provisioner {
    /// Creates a cluster and waits until the provider reports it
    ///
    /// # Arguments
    /// * `cluster` - Desired cluster shape
    /// * `provider` - Account, credentials and provider specific settings
    ///
    /// # Returns
    /// The provisioned cluster
    fn provision(
        &self,
        cluster: &ClusterSpec,
        provider: &ProviderSpec,
    ) -> Result<ClusterDescriptor, ExternalError>;

    /// Renders a kubeconfig document for a provisioned cluster
    fn credentials(
        &self,
        cluster: &ClusterDescriptor,
        provider: &ProviderSpec,
    ) -> Result<String, ExternalError>;
}

// =============================================================================
// gcloud
// =============================================================================

/// Provisions GKE clusters through the `gcloud` CLI
#[derive(Debug, Clone)]
pub struct GcloudProvisioner {
    runner: CommandRunner,
    binary: PathBuf,
}

impl GcloudProvisioner {
    pub fn new(runner: CommandRunner) -> Self {
        Self::with_binary(runner, "gcloud")
    }

    /// Uses a specific `gcloud` executable
    pub fn with_binary(runner: CommandRunner, binary: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    fn command(&self, provider: &ProviderSpec) -> Command {
        let mut command = Command::new(&self.binary);
        command.env(CREDENTIALS_ENV, &provider.credentials_file);
        command
    }

    /// Builds the arguments of `gcloud container clusters create`
    pub fn create_args(cluster: &ClusterSpec, provider: &ProviderSpec) -> Vec<String> {
        let mut args = vec![
            "container".to_string(),
            "clusters".to_string(),
            "create".to_string(),
            cluster.name.clone(),
            format!("--project={}", provider.project),
            format!("--zone={}", cluster.location),
            format!("--cluster-version={}", cluster.kubernetes_version),
            format!("--machine-type={}", cluster.machine_type),
            format!("--disk-size={}", cluster.disk_size_gb),
            format!("--num-nodes={}", cluster.node_count),
        ];
        args.extend(
            provider
                .custom_configurations
                .iter()
                .map(|(name, value)| format!("--{}={}", name, value)),
        );
        args.push("--format=json".to_string());
        args.push("--quiet".to_string());
        args
    }

    fn describe(
        &self,
        cluster: &ClusterDescriptor,
        provider: &ProviderSpec,
    ) -> Result<GkeCluster, ExternalError> {
        let project = format!("--project={}", provider.project);
        let zone = format!("--zone={}", cluster.location);
        let output = self.runner.run(self.command(provider).args([
            "container",
            "clusters",
            "describe",
            cluster.name.as_str(),
            project.as_str(),
            zone.as_str(),
            "--format=json",
        ]))?;
        GkeCluster::from_json(&output)
    }
}

impl Provisioner for GcloudProvisioner {
    fn provision(
        &self,
        cluster: &ClusterSpec,
        provider: &ProviderSpec,
    ) -> Result<ClusterDescriptor, ExternalError> {
        info!(
            "Creating {} cluster {} in {} (project {})",
            provider.provider_type, cluster.name, cluster.location, provider.project
        );

        let output = self
            .runner
            .run(self.command(provider).args(Self::create_args(cluster, provider)))?;
        let created = GkeCluster::from_json(&output)?;

        debug!(
            "Cluster {} reported status {:?}",
            cluster.name, created.status
        );
        Ok(ClusterDescriptor {
            name: created.name.unwrap_or_else(|| cluster.name.clone()),
            location: created.location.unwrap_or_else(|| cluster.location.clone()),
            endpoint: created.endpoint,
            status: created.status,
            provisioned_at: chrono::Utc::now(),
        })
    }

    fn credentials(
        &self,
        cluster: &ClusterDescriptor,
        provider: &ProviderSpec,
    ) -> Result<String, ExternalError> {
        let described = self.describe(cluster, provider)?;
        render_kubeconfig(&provider.project, cluster, &described)
    }
}

/// The fields of a GKE cluster resource this tool reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GkeCluster {
    pub name: Option<String>,
    pub location: Option<String>,
    pub endpoint: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub master_auth: MasterAuth,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterAuth {
    pub cluster_ca_certificate: Option<String>,
}

/// `create` prints a list, `describe` a single object
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(GkeCluster),
    Many(Vec<GkeCluster>),
}

impl GkeCluster {
    pub fn from_json(output: &str) -> Result<Self, ExternalError> {
        let parsed: OneOrMany = serde_json::from_str(output)
            .map_err(|e| ExternalError::Parse(format!("invalid gcloud output: {}", e)))?;
        match parsed {
            OneOrMany::One(cluster) => Ok(cluster),
            OneOrMany::Many(clusters) => clusters
                .into_iter()
                .next()
                .ok_or_else(|| ExternalError::Parse("gcloud returned no cluster".to_string())),
        }
    }
}

/// Context, cluster and user name gcloud itself uses for GKE clusters
pub fn context_name(project: &str, cluster: &ClusterDescriptor) -> String {
    format!("gke_{}_{}_{}", project, cluster.location, cluster.name)
}

/// Renders a single-context kubeconfig for a described GKE cluster
///
/// The user entry authenticates through the `gke-gcloud-auth-plugin`
/// exec plugin, so no secret ends up in the file.
pub fn render_kubeconfig(
    project: &str,
    cluster: &ClusterDescriptor,
    described: &GkeCluster,
) -> Result<String, ExternalError> {
    let endpoint = described
        .endpoint
        .as_deref()
        .or(cluster.endpoint.as_deref())
        .ok_or_else(|| {
            ExternalError::Parse(format!("cluster {} has no endpoint yet", cluster.name))
        })?;
    let ca = described
        .master_auth
        .cluster_ca_certificate
        .as_deref()
        .ok_or_else(|| {
            ExternalError::Parse(format!("cluster {} has no CA certificate", cluster.name))
        })?;

    let name = context_name(project, cluster);
    let document = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": name,
            "cluster": {
                "server": format!("https://{}", endpoint),
                "certificate-authority-data": ca,
            },
        }],
        "users": [{
            "name": name,
            "user": {
                "exec": {
                    "apiVersion": "client.authentication.k8s.io/v1beta1",
                    "command": "gke-gcloud-auth-plugin",
                    "provideClusterInfo": true,
                    "installHint": "Install gke-gcloud-auth-plugin for use with kubectl",
                },
            },
        }],
        "contexts": [{
            "name": name,
            "context": {
                "cluster": name,
                "user": name,
            },
        }],
        "current-context": name,
    });

    serde_yaml::to_string(&document)
        .map_err(|e| ExternalError::Parse(format!("failed to render kubeconfig: {}", e)))
}
