//! Cluster domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::ValidationError;

/// Desired shape of a cluster to provision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub kubernetes_version: String,
    pub location: String,
    pub machine_type: String,
    pub disk_size_gb: u32,
    pub node_count: u32,
}

/// Supported infrastructure providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Gcp,
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Gcp => write!(f, "GCP"),
        }
    }
}

/// Provider account and credentials used for provisioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub provider_type: ProviderType,
    pub project: String,
    pub credentials_file: PathBuf,
    /// Provider specific settings passed through untouched
    #[serde(default)]
    pub custom_configurations: BTreeMap<String, String>,
}

impl ProviderSpec {
    /// Creates a provider spec without custom configurations
    pub fn new(
        provider_type: ProviderType,
        project: impl Into<String>,
        credentials_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider_type,
            project: project.into(),
            credentials_file: credentials_file.into(),
            custom_configurations: BTreeMap::new(),
        }
    }

    /// Adds `NAME=VALUE` extra configurations
    ///
    /// Every entry must split into exactly two parts on `=`. The first malformed
    /// entry fails the whole call and none of the entries are applied.
    ///
    /// # Arguments
    /// * `extras` - Raw `NAME=VALUE` strings as given on the command line
    pub fn with_extras<I, S>(mut self, extras: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = BTreeMap::new();
        for extra in extras {
            let extra = extra.as_ref();
            let parts: Vec<&str> = extra.split('=').collect();
            if parts.len() != 2 {
                return Err(ValidationError::MalformedExtra(extra.to_string()));
            }
            parsed.insert(parts[0].to_string(), parts[1].to_string());
        }

        self.custom_configurations.extend(parsed);
        Ok(self)
    }
}

/// A provisioned cluster as reported by the provisioner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    pub name: String,
    pub location: String,
    /// API server address, when the provider reports one
    pub endpoint: Option<String>,
    pub status: Option<String>,
    pub provisioned_at: chrono::DateTime<chrono::Utc>,
}

/// Persisted record of a provisioned cluster and the provider that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    pub cluster: ClusterDescriptor,
    pub provider: ProviderSpec,
    pub saved_at: chrono::DateTime<chrono::Utc>,
}

impl ClusterState {
    pub fn new(cluster: ClusterDescriptor, provider: ProviderSpec) -> Self {
        Self {
            cluster,
            provider,
            saved_at: chrono::Utc::now(),
        }
    }
}
