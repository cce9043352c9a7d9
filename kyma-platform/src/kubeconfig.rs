//! Kubeconfig merging
//!
//! Adds the cluster, user and context of a freshly provisioned cluster to the
//! operator's kubeconfig without disturbing the entries already there.

use kyma_core::ExternalError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// A named entry of the `clusters`, `users` or `contexts` lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedEntry {
    pub name: String,
    /// The `cluster`, `user` or `context` body, kept verbatim
    #[serde(flatten)]
    pub body: BTreeMap<String, serde_yaml::Value>,
}

/// The parts of a kubeconfig file this tool touches
///
/// Unknown top-level fields are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub clusters: Vec<NamedEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contexts: Vec<NamedEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: Vec<NamedEntry>,
    #[serde(rename = "current-context", default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// client-go writes empty lists as `null`
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Kubeconfig {
    /// An empty `v1` config
    pub fn empty() -> Self {
        Self {
            api_version: Some("v1".to_string()),
            kind: Some("Config".to_string()),
            ..Self::default()
        }
    }

    pub fn from_yaml(source: &str) -> Result<Self, ExternalError> {
        if source.trim().is_empty() {
            return Ok(Self::empty());
        }
        serde_yaml::from_str(source)
            .map_err(|e| ExternalError::Parse(format!("invalid kubeconfig: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String, ExternalError> {
        serde_yaml::to_string(self)
            .map_err(|e| ExternalError::Parse(format!("failed to serialize kubeconfig: {}", e)))
    }

    /// Merges `other` into this config
    ///
    /// Entries of `other` replace same-named entries and are appended
    /// otherwise. The current context follows `other` when it names one.
    pub fn merge(&mut self, other: Kubeconfig) {
        merge_entries(&mut self.clusters, other.clusters);
        merge_entries(&mut self.contexts, other.contexts);
        merge_entries(&mut self.users, other.users);
        if other.current_context.is_some() {
            self.current_context = other.current_context;
        }
    }

    pub fn context(&self, name: &str) -> Option<&NamedEntry> {
        self.contexts.iter().find(|entry| entry.name == name)
    }
}

fn merge_entries(into: &mut Vec<NamedEntry>, entries: Vec<NamedEntry>) {
    for entry in entries {
        match into.iter_mut().find(|existing| existing.name == entry.name) {
            Some(existing) => *existing = entry,
            None => into.push(entry),
        }
    }
}

/// Destination for new cluster credentials
pub trait KubeconfigWriter {
    /// Adds the contexts of `kubeconfig` (a kubeconfig document)
    fn append(&self, kubeconfig: &str) -> Result<(), ExternalError>;
}

/// Kubeconfig file on disk
#[derive(Debug, Clone)]
pub struct FileKubeconfig {
    path: PathBuf,
}

impl FileKubeconfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file, treating a missing file as an empty config
    pub fn load(&self) -> Result<Kubeconfig, ExternalError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Kubeconfig::from_yaml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Kubeconfig {} does not exist yet", self.path.display());
                Ok(Kubeconfig::empty())
            }
            Err(e) => Err(ExternalError::io(&self.path, e)),
        }
    }
}

impl KubeconfigWriter for FileKubeconfig {
    fn append(&self, kubeconfig: &str) -> Result<(), ExternalError> {
        let incoming = Kubeconfig::from_yaml(kubeconfig)?;
        let context = incoming.current_context.clone();

        let mut config = self.load()?;
        config.merge(incoming);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| ExternalError::io(dir, e))?;

        // Replace the file in one rename so a failed write leaves the old config intact
        let mut staged = NamedTempFile::new_in(dir).map_err(|e| ExternalError::io(dir, e))?;
        staged
            .write_all(config.to_yaml()?.as_bytes())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| ExternalError::io(staged.path(), e))?;
        staged
            .persist(&self.path)
            .map_err(|e| ExternalError::io(&self.path, e.error))?;

        info!(
            "Updated kubeconfig {} (current context: {})",
            self.path.display(),
            context.as_deref().unwrap_or("unchanged")
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EXISTING: &str = r#"
apiVersion: v1
kind: Config
preferences: {}
clusters:
- name: minikube
  cluster:
    server: https://192.168.99.100:8443
contexts:
- name: minikube
  context:
    cluster: minikube
    user: minikube
users:
- name: minikube
  user:
    token: abc
current-context: minikube
"#;

    const NEW_CLUSTER: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: gke_proj_europe-west3-a_kyma
  cluster:
    server: https://35.1.2.3
contexts:
- name: gke_proj_europe-west3-a_kyma
  context:
    cluster: gke_proj_europe-west3-a_kyma
    user: gke_proj_europe-west3-a_kyma
users:
- name: gke_proj_europe-west3-a_kyma
  user:
    token: xyz
current-context: gke_proj_europe-west3-a_kyma
"#;

    #[test]
    fn test_merge_appends_and_switches_context() {
        let mut config = Kubeconfig::from_yaml(EXISTING).unwrap();
        config.merge(Kubeconfig::from_yaml(NEW_CLUSTER).unwrap());

        assert_eq!(config.clusters.len(), 2);
        assert_eq!(config.users.len(), 2);
        assert!(config.context("minikube").is_some());
        assert!(config.context("gke_proj_europe-west3-a_kyma").is_some());
        assert_eq!(
            config.current_context.as_deref(),
            Some("gke_proj_europe-west3-a_kyma")
        );
        assert!(config.extra.contains_key("preferences"));
    }

    #[test]
    fn test_merge_replaces_same_named_entries() {
        let mut config = Kubeconfig::from_yaml(NEW_CLUSTER).unwrap();
        let replacement = NEW_CLUSTER.replace("35.1.2.3", "35.9.9.9");
        config.merge(Kubeconfig::from_yaml(&replacement).unwrap());

        assert_eq!(config.clusters.len(), 1);
        let server = config.clusters[0].body["cluster"]["server"].as_str();
        assert_eq!(server, Some("https://35.9.9.9"));
    }

    #[test]
    fn test_append_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let file = FileKubeconfig::new(dir.path().join(".kube").join("config"));

        file.append(NEW_CLUSTER).unwrap();

        let written = file.load().unwrap();
        assert_eq!(written.contexts.len(), 1);
        assert_eq!(written.api_version.as_deref(), Some("v1"));
    }

    #[test]
    fn test_append_keeps_existing_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, EXISTING).unwrap();
        let file = FileKubeconfig::new(&path);

        file.append(NEW_CLUSTER).unwrap();

        let written = file.load().unwrap();
        assert_eq!(written.contexts.len(), 2);
        assert_eq!(written.users[0].name, "minikube");
        assert_eq!(written.users[0].body["user"]["token"].as_str(), Some("abc"));
    }

    #[test]
    fn test_append_accepts_null_lists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(
            &path,
            "apiVersion: v1\nclusters: null\ncontexts: null\ncurrent-context: \"\"\nkind: Config\npreferences: {}\nusers: null\n",
        )
        .unwrap();
        let file = FileKubeconfig::new(&path);

        file.append(NEW_CLUSTER).unwrap();

        let written = file.load().unwrap();
        assert_eq!(written.clusters.len(), 1);
        assert_eq!(written.contexts.len(), 1);
        assert_eq!(written.users.len(), 1);
        assert_eq!(
            written.current_context.as_deref(),
            Some("gke_proj_europe-west3-a_kyma")
        );
        assert!(written.extra.contains_key("preferences"));
    }

    #[test]
    fn test_append_replaces_file_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, EXISTING).unwrap();
        let file = FileKubeconfig::new(&path);

        file.append(NEW_CLUSTER).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, ["config"]);
        let written = Kubeconfig::from_yaml(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.contexts.len(), 2);
    }

    #[test]
    fn test_append_rejects_invalid_kubeconfig() {
        let dir = TempDir::new().unwrap();
        let file = FileKubeconfig::new(dir.path().join("config"));

        let err = file.append("clusters: {not: a list}").unwrap_err();
        assert!(matches!(err, ExternalError::Parse(_)));
        assert!(!file.path().exists());
    }
}
