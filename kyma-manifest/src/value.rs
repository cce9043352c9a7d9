//! Document value tree
//!
//! A manifest document is a tree of mappings, sequences and scalars. Mapping
//! keys are scalars rather than strings: YAML parsers happily emit boolean,
//! numeric or null keys, and those stay distinguishable from their string
//! spelling (`1` and `"1"` are different keys).
//!
//! Navigation uses [`PathSegment`] slices. Reads return `None` for anything
//! that does not resolve; writes return a [`StructuralError`] describing where
//! the shape diverged. Nothing is created implicitly.

use std::fmt;

use crate::error::{ManifestError, StructuralError};

/// Leaf value of a document
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_yaml::Number),
    String(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Number(n) => n.as_i64(),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

impl PartialEq<str> for Scalar {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Scalar {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n.into())
    }
}

impl From<u64> for Scalar {
    fn from(n: u64) -> Self {
        Scalar::Number(n.into())
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n.into())
    }
}

/// Insertion-ordered association from scalar keys to values
///
/// Keys are unique. Equality ignores entry order.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    entries: Vec<(Scalar, Value)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&Value>
    where
        Scalar: PartialEq<Q>,
        Q: ?Sized,
    {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut Value>
    where
        Scalar: PartialEq<Q>,
        Q: ?Sized,
    {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Scalar: PartialEq<Q>,
        Q: ?Sized,
    {
        self.get(key).is_some()
    }

    /// Inserts or replaces an entry
    ///
    /// A replaced entry keeps its position. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<Scalar>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Removes an entry, keeping the order of the remaining ones
    pub fn remove<Q>(&mut self, key: &Q) -> Option<Value>
    where
        Scalar: PartialEq<Q>,
        Q: ?Sized,
    {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Scalar, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Scalar> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl<K: Into<Scalar>, V: Into<Value>> FromIterator<(K, V)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = Mapping::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

/// One node of a document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Mapping(Mapping),
    Sequence(Vec<Value>),
    Scalar(Scalar),
}

/// One step of a path into a document
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Key of a mapping entry
    Key(Scalar),
    /// Position in a sequence
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.into())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key.into())
    }
}

impl From<Scalar> for PathSegment {
    fn from(key: Scalar) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Builds a path from a dotted string
///
/// All-digit segments become sequence indices, everything else a string key.
/// An empty string is the root path.
///
/// # Example
/// ```
/// use kyma_manifest::{PathSegment, path};
///
/// let p = path("spec.template.spec.containers.0");
/// assert_eq!(p.len(), 5);
/// assert_eq!(p[4], PathSegment::Index(0));
/// ```
pub fn path(dotted: &str) -> Vec<PathSegment> {
    if dotted.is_empty() {
        return Vec::new();
    }
    dotted
        .split('.')
        .map(|segment| match segment.parse::<usize>() {
            Ok(index) if segment.bytes().all(|b| b.is_ascii_digit()) => PathSegment::Index(index),
            _ => PathSegment::from(segment),
        })
        .collect()
}

/// Renders a path for error messages
pub(crate) fn render_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    path.iter()
        .map(|segment| segment.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    /// Name of the variant, used in error messages
    pub fn variant_name(&self) -> &'static str {
        match self {
            Value::Mapping(_) => "mapping",
            Value::Sequence(_) => "sequence",
            Value::Scalar(_) => "scalar",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar_mut(&mut self) -> Option<&mut Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    /// Converts into a mapping, handing the value back on mismatch
    pub fn into_mapping(self) -> Result<Mapping, Value> {
        match self {
            Value::Mapping(m) => Ok(m),
            other => Err(other),
        }
    }

    /// Converts into a sequence, handing the value back on mismatch
    pub fn into_sequence(self) -> Result<Vec<Value>, Value> {
        match self {
            Value::Sequence(s) => Ok(s),
            other => Err(other),
        }
    }

    /// Converts into a scalar, handing the value back on mismatch
    pub fn into_scalar(self) -> Result<Scalar, Value> {
        match self {
            Value::Scalar(s) => Ok(s),
            other => Err(other),
        }
    }

    /// The root `kind` field of a Kubernetes object
    pub fn kind(&self) -> Option<&str> {
        self.as_mapping()?.get("kind")?.as_str()
    }

    /// The root `apiVersion` field of a Kubernetes object
    pub fn api_version(&self) -> Option<&str> {
        self.as_mapping()?.get("apiVersion")?.as_str()
    }

    /// Looks up a nested value
    ///
    /// Returns `None` if any segment is absent or meets the wrong variant.
    pub fn get(&self, path: &[PathSegment]) -> Option<&Value> {
        path.iter().try_fold(self, |node, segment| match segment {
            PathSegment::Key(key) => node.as_mapping()?.get(key),
            PathSegment::Index(index) => node.as_sequence()?.get(*index),
        })
    }

    pub fn get_mut(&mut self, path: &[PathSegment]) -> Option<&mut Value> {
        path.iter().try_fold(self, |node, segment| match segment {
            PathSegment::Key(key) => node.as_mapping_mut()?.get_mut(key),
            PathSegment::Index(index) => node.as_sequence_mut()?.get_mut(*index),
        })
    }

    /// Resolves a path, describing where it diverged from the document
    pub fn resolve(&self, path: &[PathSegment]) -> Result<&Value, StructuralError> {
        let mut node = self;
        for (depth, segment) in path.iter().enumerate() {
            node = step_into(node, segment, &path[..=depth])?;
        }
        Ok(node)
    }

    /// Mutable counterpart of [`Value::resolve`]
    pub fn resolve_mut(&mut self, path: &[PathSegment]) -> Result<&mut Value, StructuralError> {
        let mut node = self;
        for (depth, segment) in path.iter().enumerate() {
            node = step_into_mut(node, segment, &path[..=depth])?;
        }
        Ok(node)
    }

    /// Stores a value at `path`
    ///
    /// The container holding the last segment must already exist: a mapping
    /// for a key segment (the key is inserted or replaced) or a sequence for
    /// an index segment (the index must be in range).
    pub fn set(&mut self, path: &[PathSegment], value: impl Into<Value>) -> Result<(), StructuralError> {
        let (last, parent_path) = path.split_last().ok_or(StructuralError::EmptyPath)?;
        let parent = self.resolve_mut(parent_path)?;
        let found = parent.variant_name();

        match last {
            PathSegment::Key(key) => {
                let mapping = parent
                    .as_mapping_mut()
                    .ok_or_else(|| StructuralError::WrongVariant {
                        path: render_path(parent_path),
                        expected: "mapping",
                        found,
                    })?;
                mapping.insert(key.clone(), value);
            }
            PathSegment::Index(index) => {
                let sequence = parent
                    .as_sequence_mut()
                    .ok_or_else(|| StructuralError::WrongVariant {
                        path: render_path(parent_path),
                        expected: "sequence",
                        found,
                    })?;
                let len = sequence.len();
                let slot = sequence
                    .get_mut(*index)
                    .ok_or_else(|| StructuralError::IndexOutOfRange {
                        path: render_path(parent_path),
                        index: *index,
                        len,
                    })?;
                *slot = value.into();
            }
        }
        Ok(())
    }

    /// Removes one entry from the mapping at `parent_path`
    ///
    /// Returns the removed value, or `None` if the mapping has no such key.
    pub fn remove_key<Q>(
        &mut self,
        parent_path: &[PathSegment],
        key: &Q,
    ) -> Result<Option<Value>, StructuralError>
    where
        Scalar: PartialEq<Q>,
        Q: ?Sized,
    {
        let parent = self.resolve_mut(parent_path)?;
        let found = parent.variant_name();
        let mapping = parent
            .as_mapping_mut()
            .ok_or_else(|| StructuralError::WrongVariant {
                path: render_path(parent_path),
                expected: "mapping",
                found,
            })?;
        Ok(mapping.remove(key))
    }
}

fn step_into<'a>(
    node: &'a Value,
    segment: &PathSegment,
    so_far: &[PathSegment],
) -> Result<&'a Value, StructuralError> {
    match (node, segment) {
        (Value::Mapping(mapping), PathSegment::Key(key)) => {
            mapping.get(key).ok_or_else(|| StructuralError::MissingPath {
                path: render_path(so_far),
            })
        }
        (Value::Sequence(sequence), PathSegment::Index(index)) => {
            sequence
                .get(*index)
                .ok_or_else(|| StructuralError::IndexOutOfRange {
                    path: render_path(&so_far[..so_far.len() - 1]),
                    index: *index,
                    len: sequence.len(),
                })
        }
        (other, segment) => Err(wrong_variant(other, segment, so_far)),
    }
}

fn step_into_mut<'a>(
    node: &'a mut Value,
    segment: &PathSegment,
    so_far: &[PathSegment],
) -> Result<&'a mut Value, StructuralError> {
    match (node, segment) {
        (Value::Mapping(mapping), PathSegment::Key(key)) => {
            mapping
                .get_mut(key)
                .ok_or_else(|| StructuralError::MissingPath {
                    path: render_path(so_far),
                })
        }
        (Value::Sequence(sequence), PathSegment::Index(index)) => {
            let len = sequence.len();
            sequence
                .get_mut(*index)
                .ok_or_else(|| StructuralError::IndexOutOfRange {
                    path: render_path(&so_far[..so_far.len() - 1]),
                    index: *index,
                    len,
                })
        }
        (other, segment) => Err(wrong_variant(other, segment, so_far)),
    }
}

fn wrong_variant(node: &Value, segment: &PathSegment, so_far: &[PathSegment]) -> StructuralError {
    let expected = match segment {
        PathSegment::Key(_) => "mapping",
        PathSegment::Index(_) => "sequence",
    };
    StructuralError::WrongVariant {
        path: render_path(&so_far[..so_far.len() - 1]),
        expected,
        found: node.variant_name(),
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(s: Vec<Value>) -> Self {
        Value::Sequence(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(b.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Scalar(n.into())
    }
}

// =============================================================================
// serde_yaml conversions
// =============================================================================

impl TryFrom<serde_yaml::Value> for Value {
    type Error = ManifestError;

    /// Converts a parsed YAML node
    ///
    /// Tags are dropped and the tagged value kept. Sequence or mapping keys
    /// are rejected.
    fn try_from(value: serde_yaml::Value) -> Result<Self, Self::Error> {
        Ok(match value {
            serde_yaml::Value::Mapping(mapping) => {
                let mut converted = Mapping::new();
                for (key, value) in mapping {
                    converted.insert(scalar_key(key)?, Value::try_from(value)?);
                }
                Value::Mapping(converted)
            }
            serde_yaml::Value::Sequence(sequence) => Value::Sequence(
                sequence
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_yaml::Value::Tagged(tagged) => Value::try_from(tagged.value)?,
            serde_yaml::Value::Null => Value::Scalar(Scalar::Null),
            serde_yaml::Value::Bool(b) => Value::Scalar(Scalar::Bool(b)),
            serde_yaml::Value::Number(n) => Value::Scalar(Scalar::Number(n)),
            serde_yaml::Value::String(s) => Value::Scalar(Scalar::String(s)),
        })
    }
}

fn scalar_key(key: serde_yaml::Value) -> Result<Scalar, ManifestError> {
    match key {
        serde_yaml::Value::Null => Ok(Scalar::Null),
        serde_yaml::Value::Bool(b) => Ok(Scalar::Bool(b)),
        serde_yaml::Value::Number(n) => Ok(Scalar::Number(n)),
        serde_yaml::Value::String(s) => Ok(Scalar::String(s)),
        serde_yaml::Value::Tagged(tagged) => scalar_key(tagged.value),
        other => Err(ManifestError::UnsupportedKey(format!("{:?}", other))),
    }
}

impl From<&Scalar> for serde_yaml::Value {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Null => serde_yaml::Value::Null,
            Scalar::Bool(b) => serde_yaml::Value::Bool(*b),
            Scalar::Number(n) => serde_yaml::Value::Number(n.clone()),
            Scalar::String(s) => serde_yaml::Value::String(s.clone()),
        }
    }
}

impl From<&Value> for serde_yaml::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Mapping(mapping) => serde_yaml::Value::Mapping(
                mapping
                    .iter()
                    .map(|(k, v)| (serde_yaml::Value::from(k), serde_yaml::Value::from(v)))
                    .collect(),
            ),
            Value::Sequence(sequence) => {
                serde_yaml::Value::Sequence(sequence.iter().map(serde_yaml::Value::from).collect())
            }
            Value::Scalar(scalar) => serde_yaml::Value::from(scalar),
        }
    }
}
