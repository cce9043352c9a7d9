//! Multi-document manifest sets

use serde::Deserialize;
use tracing::debug;

use crate::error::ManifestError;
use crate::value::Value;

/// Ordered documents parsed from one YAML stream
///
/// Each document is expected, but not required, to be a mapping with
/// `apiVersion` and `kind` fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestDocumentSet {
    documents: Vec<Value>,
}

impl ManifestDocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a multi-document YAML stream
    ///
    /// Empty documents (for example a trailing `---`) are skipped.
    ///
    /// # Errors
    /// Returns an error if the stream is not valid YAML or a mapping uses a
    /// sequence or mapping as key.
    pub fn from_yaml_str(source: &str) -> Result<Self, ManifestError> {
        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(source) {
            let raw = serde_yaml::Value::deserialize(document).map_err(ManifestError::Parse)?;
            if raw.is_null() {
                continue;
            }
            documents.push(Value::try_from(raw)?);
        }

        debug!("Parsed {} manifest document(s)", documents.len());
        Ok(Self { documents })
    }

    /// Serializes all documents into one YAML stream separated by `---`
    pub fn to_yaml_string(&self) -> Result<String, ManifestError> {
        let mut out = String::new();
        for (index, document) in self.documents.iter().enumerate() {
            if index > 0 {
                out.push_str("---\n");
            }
            let rendered = serde_yaml::to_string(&serde_yaml::Value::from(document))
                .map_err(ManifestError::Serialize)?;
            out.push_str(&rendered);
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn push(&mut self, document: Value) {
        self.documents.push(document);
    }

    pub fn documents(&self) -> &[Value] {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut [Value] {
        &mut self.documents
    }

    /// Documents whose root `kind` equals `kind`, in order
    ///
    /// The iterator is cloneable, so it can be restarted.
    pub fn documents_of_kind<'a>(
        &'a self,
        kind: &'a str,
    ) -> impl Iterator<Item = &'a Value> + Clone + 'a {
        self.documents
            .iter()
            .filter(move |document| document.kind() == Some(kind))
    }

    pub fn documents_of_kind_mut<'a>(
        &'a mut self,
        kind: &'a str,
    ) -> impl Iterator<Item = &'a mut Value> + 'a {
        self.documents
            .iter_mut()
            .filter(move |document| document.kind() == Some(kind))
    }

    pub fn into_documents(self) -> Vec<Value> {
        self.documents
    }
}

impl From<Vec<Value>> for ManifestDocumentSet {
    fn from(documents: Vec<Value>) -> Self {
        Self { documents }
    }
}

impl IntoIterator for ManifestDocumentSet {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

impl<'a> IntoIterator for &'a ManifestDocumentSet {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::path;

    const INSTALLER: &str = r#"
apiVersion: v1
kind: Namespace
metadata:
  name: kyma-installer
---
apiVersion: installer.kyma-project.io/v1alpha1
kind: Installation
metadata:
  name: kyma-installation
  labels:
    action: install
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: kyma-installer
  namespace: kyma-installer
---
"#;

    #[test]
    fn test_parse_multi_document_stream() {
        let set = ManifestDocumentSet::from_yaml_str(INSTALLER).unwrap();
        assert_eq!(set.len(), 3);

        let kinds: Vec<_> = set.documents().iter().filter_map(Value::kind).collect();
        assert_eq!(kinds, vec!["Namespace", "Installation", "Deployment"]);
    }

    #[test]
    fn test_parse_empty_stream() {
        let set = ManifestDocumentSet::from_yaml_str("").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let result = ManifestDocumentSet::from_yaml_str("key: [unclosed");
        assert!(matches!(result, Err(ManifestError::Parse(_))));
    }

    #[test]
    fn test_documents_of_kind_is_restartable() {
        let set = ManifestDocumentSet::from_yaml_str(INSTALLER).unwrap();
        let installations = set.documents_of_kind("Installation");

        assert_eq!(installations.clone().count(), 1);
        let first = installations.clone().next().unwrap();
        assert_eq!(
            first
                .get(&path("metadata.name"))
                .and_then(Value::as_str),
            Some("kyma-installation")
        );
        assert_eq!(installations.count(), 1);
        assert_eq!(set.documents_of_kind("Service").count(), 0);
    }

    #[test]
    fn test_documents_of_kind_mut() {
        let mut set = ManifestDocumentSet::from_yaml_str(INSTALLER).unwrap();
        for document in set.documents_of_kind_mut("Deployment") {
            document.set(&path("metadata.namespace"), "default").unwrap();
        }

        let deployment = set.documents_of_kind("Deployment").next().unwrap();
        assert_eq!(
            deployment
                .get(&path("metadata.namespace"))
                .and_then(Value::as_str),
            Some("default")
        );
    }

    #[test]
    fn test_yaml_round_trip_keeps_documents() {
        let set = ManifestDocumentSet::from_yaml_str(INSTALLER).unwrap();
        let yaml = set.to_yaml_string().unwrap();

        assert_eq!(yaml.matches("---").count(), 2);
        assert_eq!(ManifestDocumentSet::from_yaml_str(&yaml).unwrap(), set);
    }
}
