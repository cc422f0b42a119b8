use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shape_kind::ShapeKind;

/// A transient, shape-instance-local element locator: a kind plus a
/// 1-based index, written `Edge3`, `Face1`, etc.
///
/// Only meaningful relative to the shape instance whose ancestry produced
/// it; invalidated whenever that shape's cache is rebuilt. Index 0 is the
/// invalid/null value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IndexedName {
    pub kind: ShapeKind,
    pub index: u32,
}

impl IndexedName {
    pub fn new(kind: ShapeKind, index: u32) -> Self {
        Self { kind, index }
    }

    pub fn is_valid(&self) -> bool {
        self.index > 0
    }

    /// Parse `Edge3`-style strings. The whole string must be a type name
    /// plus digits: an encoded name carries postfixes and is not an
    /// indexed name, so it is rejected rather than resolved by prefix.
    pub fn parse(s: &str) -> Option<IndexedName> {
        let (kind, rest) = ShapeKind::strip_prefix(s)?;
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let index: u32 = rest.parse().ok()?;
        if index == 0 {
            return None;
        }
        Some(IndexedName { kind, index })
    }
}

impl fmt::Display for IndexedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.type_name(), self.index)
    }
}
