use std::fmt;

use serde::{Deserialize, Serialize};

use crate::indexed_name::IndexedName;

/// A stable, string-valued element identifier.
///
/// Built by concatenating a base name with encoded postfixes describing
/// the producing operation, its owner tag and optional secondary source
/// tag. Unlike [`IndexedName`] it is meant to survive recomputation.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MappedName(String);

impl MappedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append a raw postfix fragment.
    pub fn push_str(&mut self, postfix: &str) {
        self.0.push_str(postfix);
    }

    /// Replace the entire contents, keeping the allocation.
    pub fn replace_with(&mut self, s: String) {
        self.0 = s;
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }
}

impl From<IndexedName> for MappedName {
    /// The raw fallback name of an unmapped but tagged element.
    fn from(element: IndexedName) -> Self {
        Self(element.to_string())
    }
}

impl fmt::Display for MappedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape_kind::ShapeKind;

    #[test]
    fn raw_fallback_from_indexed_name() {
        let name = MappedName::from(IndexedName::new(ShapeKind::Vertex, 4));
        assert_eq!(name.as_str(), "Vertex4");
        assert!(!name.is_empty());
    }

    #[test]
    fn default_is_empty() {
        assert!(MappedName::default().is_empty());
    }
}
