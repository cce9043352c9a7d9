//! Error types for manifest access and transformation

use thiserror::Error;

/// A document does not have the shape an operation expects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// Paths passed to mutating operations must name at least one segment
    #[error("path must not be empty")]
    EmptyPath,

    /// An intermediate node of the path does not exist
    #[error("path `{path}` does not exist")]
    MissingPath { path: String },

    /// A node exists but is not the variant the operation requires
    #[error("expected {expected} at `{path}`, found {found}")]
    WrongVariant {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A mapping lacks a required key
    #[error("key `{key}` not found in `{path}`")]
    MissingKey { path: String, key: String },

    /// A sequence index is past the end of the sequence
    #[error("index {index} out of range for `{path}` of length {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    /// A label that was expected to be present is absent
    #[error("expected label `{label}` not present in `{path}`")]
    MissingLabel { path: String, label: String },

    /// Scopes an error to one document of a set
    #[error("document {index}: {source}")]
    Document {
        index: usize,
        source: Box<StructuralError>,
    },
}

impl StructuralError {
    /// Attach the index of the offending document
    pub fn in_document(self, index: usize) -> Self {
        Self::Document {
            index,
            source: Box::new(self),
        }
    }

    /// The error without any document scoping
    pub fn root_cause(&self) -> &StructuralError {
        match self {
            Self::Document { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Errors raised while loading or dumping manifests
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The YAML stream could not be parsed
    #[error("failed to parse manifest: {0}")]
    Parse(#[source] serde_yaml::Error),

    /// A mapping key was a sequence or mapping
    #[error("unsupported mapping key: {0}")]
    UnsupportedKey(String),

    /// The documents could not be written back as YAML
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error(transparent)]
    Structural(#[from] StructuralError),
}
