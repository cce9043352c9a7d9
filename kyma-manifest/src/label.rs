//! Label removal pass

use tracing::debug;

use crate::document::ManifestDocumentSet;
use crate::error::StructuralError;
use crate::value::{PathSegment, Value, path};

const LABELS_PATH: &str = "metadata.labels";

/// Removes one label from every document of a given kind
///
/// Every matching document must carry `metadata.labels` as a mapping that
/// contains the label. An absent label is reported, not skipped. All matching
/// documents are checked before any is modified, so on error the set is left
/// exactly as it was. Documents of other kinds are never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelStripper {
    kind: String,
    label: String,
}

impl LabelStripper {
    pub fn new(kind: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            label: label.into(),
        }
    }

    /// Strips the `action` label from `Installation` resources
    ///
    /// The installer starts working as soon as the label is present, so it is
    /// removed before the resource is applied and added back to trigger the
    /// installation.
    pub fn action() -> Self {
        Self::new("Installation", "action")
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Removes the label in place
    ///
    /// # Errors
    /// Returns a [`StructuralError`] scoped to the first offending document
    pub fn apply(&self, set: &mut ManifestDocumentSet) -> Result<(), StructuralError> {
        let labels_path = path(LABELS_PATH);

        for (index, document) in set.documents().iter().enumerate() {
            if document.kind() == Some(self.kind.as_str()) {
                self.check(document, &labels_path)
                    .map_err(|err| err.in_document(index))?;
            }
        }

        let mut stripped = 0;
        for (index, document) in set.documents_mut().iter_mut().enumerate() {
            if document.kind() != Some(self.kind.as_str()) {
                continue;
            }
            document
                .remove_key(&labels_path, self.label.as_str())
                .map_err(|err| err.in_document(index))?;
            stripped += 1;
        }

        debug!(
            "Removed label `{}` from {} {} document(s)",
            self.label, stripped, self.kind
        );
        Ok(())
    }

    fn check(&self, document: &Value, labels_path: &[PathSegment]) -> Result<(), StructuralError> {
        let labels = document.resolve(labels_path)?;
        let mapping = labels
            .as_mapping()
            .ok_or_else(|| StructuralError::WrongVariant {
                path: LABELS_PATH.to_string(),
                expected: "mapping",
                found: labels.variant_name(),
            })?;

        if !mapping.contains_key(self.label.as_str()) {
            return Err(StructuralError::MissingLabel {
                path: LABELS_PATH.to_string(),
                label: self.label.clone(),
            });
        }
        Ok(())
    }
}
