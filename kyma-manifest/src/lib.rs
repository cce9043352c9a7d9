//! Kyma Manifest
//!
//! Schema-less access to multi-document Kubernetes manifests.
//!
//! This crate provides:
//! - [`Value`]: a tagged tree of mappings, sequences and scalars with
//!   non-uniform key types
//! - [`ManifestDocumentSet`]: the ordered documents of one YAML stream
//! - Transformation passes: [`LabelStripper`] and [`ImageRewriter`]

pub mod document;
pub mod error;
pub mod image;
pub mod label;
pub mod value;

pub use document::ManifestDocumentSet;
pub use error::{ManifestError, StructuralError};
pub use image::ImageRewriter;
pub use label::LabelStripper;
pub use value::{Mapping, PathSegment, Scalar, Value, path};
