//! Container image rewrite pass

use tracing::debug;

use crate::document::ManifestDocumentSet;
use crate::error::StructuralError;
use crate::value::{Value, path};

const CONTAINERS_PATH: &str = "spec.template.spec.containers";

/// Replaces the image of every container in Deployment-shaped documents
///
/// Every document of the set must have `spec.template.spec.containers` as a
/// sequence of mappings, each with an `image` key. The first document that
/// does not aborts the whole batch; there is no partial result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRewriter {
    image: String,
}

impl ImageRewriter {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    /// Returns a copy of `set` with every container image replaced
    ///
    /// # Errors
    /// Returns a [`StructuralError`] scoped to the first offending document
    pub fn rewrite(&self, set: &ManifestDocumentSet) -> Result<ManifestDocumentSet, StructuralError> {
        let mut rewritten = set.clone();
        let mut replaced = 0;

        for (index, document) in rewritten.documents_mut().iter_mut().enumerate() {
            replaced += self
                .rewrite_document(document)
                .map_err(|err| err.in_document(index))?;
        }

        debug!("Replaced {} container image(s) with {}", replaced, self.image);
        Ok(rewritten)
    }

    fn rewrite_document(&self, document: &mut Value) -> Result<usize, StructuralError> {
        let containers = document.resolve_mut(&path(CONTAINERS_PATH))?;
        let found = containers.variant_name();
        let containers = containers
            .as_sequence_mut()
            .ok_or_else(|| StructuralError::WrongVariant {
                path: CONTAINERS_PATH.to_string(),
                expected: "sequence",
                found,
            })?;

        for (position, container) in containers.iter_mut().enumerate() {
            let container_path = format!("{}.{}", CONTAINERS_PATH, position);
            let found = container.variant_name();
            let container = container
                .as_mapping_mut()
                .ok_or_else(|| StructuralError::WrongVariant {
                    path: container_path.clone(),
                    expected: "mapping",
                    found,
                })?;
            let image = container
                .get_mut("image")
                .ok_or_else(|| StructuralError::MissingKey {
                    path: container_path,
                    key: "image".to_string(),
                })?;
            *image = Value::from(self.image.as_str());
        }

        Ok(containers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Mapping;

    const REPLACEMENT: &str = "testImage!";

    fn installer_deployment(image: &str) -> Value {
        let container: Mapping = [
            ("name", "kyma-installer-container"),
            ("image", image),
        ]
        .into_iter()
        .collect();
        let pod_spec: Mapping = [
            ("serviceAccountName", Value::from("kyma-installer")),
            ("containers", Value::Sequence(vec![container.into()])),
        ]
        .into_iter()
        .collect();
        let template: Mapping = [("spec", pod_spec)].into_iter().collect();
        let spec: Mapping = [("template", template)].into_iter().collect();

        Value::Mapping(
            [
                (
                    "apiVersion",
                    Value::from("installer.kyma-project.io/v1alpha1"),
                ),
                ("kind", Value::from("Deployment")),
                ("spec", Value::from(spec)),
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn test_replaces_container_image() {
        let set = ManifestDocumentSet::from(vec![installer_deployment(
            "eu.gcr.io/kyma-project/kyma-installer:63f27f76",
        )]);

        let result = ImageRewriter::new(REPLACEMENT).rewrite(&set).unwrap();

        let expected = ManifestDocumentSet::from(vec![installer_deployment(REPLACEMENT)]);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_input_set_is_not_modified() {
        let set = ManifestDocumentSet::from(vec![installer_deployment("original:1")]);
        let before = set.clone();

        ImageRewriter::new(REPLACEMENT).rewrite(&set).unwrap();
        assert_eq!(set, before);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let set = ManifestDocumentSet::from(vec![installer_deployment("original:1")]);
        let rewriter = ImageRewriter::new(REPLACEMENT);

        let once = rewriter.rewrite(&set).unwrap();
        let twice = rewriter.rewrite(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_rewrites_every_container() {
        let mut document = installer_deployment("a:1");
        let sidecar: Mapping = [("name", "sidecar"), ("image", "b:2")].into_iter().collect();
        document
            .get_mut(&path(CONTAINERS_PATH))
            .and_then(Value::as_sequence_mut)
            .unwrap()
            .push(sidecar.into());
        let set = ManifestDocumentSet::from(vec![document]);

        let result = ImageRewriter::new(REPLACEMENT).rewrite(&set).unwrap();

        let containers = result.documents()[0]
            .get(&path(CONTAINERS_PATH))
            .and_then(Value::as_sequence)
            .unwrap();
        assert_eq!(containers.len(), 2);
        for container in containers {
            assert_eq!(
                container.get(&path("image")).and_then(Value::as_str),
                Some(REPLACEMENT)
            );
        }
    }

    #[test]
    fn test_document_without_containers_aborts_batch() {
        let service = Value::Mapping(
            [("kind", Value::from("Service"))].into_iter().collect(),
        );
        let set = ManifestDocumentSet::from(vec![installer_deployment("a:1"), service]);

        let err = ImageRewriter::new(REPLACEMENT).rewrite(&set).unwrap_err();

        assert!(matches!(err, StructuralError::Document { index: 1, .. }));
        assert!(matches!(err.root_cause(), StructuralError::MissingPath { .. }));
    }

    #[test]
    fn test_containers_must_be_sequence() {
        let mut document = installer_deployment("a:1");
        document
            .set(&path(CONTAINERS_PATH), "not-a-list")
            .unwrap();
        let set = ManifestDocumentSet::from(vec![document]);

        let err = ImageRewriter::new(REPLACEMENT).rewrite(&set).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &StructuralError::WrongVariant {
                path: CONTAINERS_PATH.to_string(),
                expected: "sequence",
                found: "scalar",
            }
        );
    }

    #[test]
    fn test_container_without_image_fails() {
        let mut document = installer_deployment("a:1");
        document
            .remove_key(&path("spec.template.spec.containers.0"), "image")
            .unwrap();
        let set = ManifestDocumentSet::from(vec![document]);

        let err = ImageRewriter::new(REPLACEMENT).rewrite(&set).unwrap_err();
        assert_eq!(
            err.root_cause(),
            &StructuralError::MissingKey {
                path: "spec.template.spec.containers.0".to_string(),
                key: "image".to_string(),
            }
        );
    }
}
