use serde::{Deserialize, Serialize};

/// The kind of topological entity.
///
/// Ordered from lowest (Vertex) to highest; the derived `Ord` is relied on
/// for sorting element positions deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShapeKind {
    Vertex,
    Edge,
    Wire,
    Face,
    Shell,
    Solid,
    CompSolid,
    Compound,
}

/// The three kinds that receive mapped names directly. Wires, shells,
/// solids and compounds are named only through their bounding elements.
pub const ELEMENT_KINDS: [ShapeKind; 3] = [ShapeKind::Vertex, ShapeKind::Edge, ShapeKind::Face];

impl ShapeKind {
    /// Human-readable type name, also the prefix of an `IndexedName`.
    pub fn type_name(self) -> &'static str {
        match self {
            ShapeKind::Vertex => "Vertex",
            ShapeKind::Edge => "Edge",
            ShapeKind::Wire => "Wire",
            ShapeKind::Face => "Face",
            ShapeKind::Shell => "Shell",
            ShapeKind::Solid => "Solid",
            ShapeKind::CompSolid => "CompSolid",
            ShapeKind::Compound => "Compound",
        }
    }

    /// One stable letter per kind, used when encoding element names.
    pub fn type_char(self) -> char {
        match self {
            ShapeKind::Vertex => 'V',
            ShapeKind::Edge => 'E',
            ShapeKind::Wire => 'W',
            ShapeKind::Face => 'F',
            ShapeKind::Shell => 'H',
            ShapeKind::Solid => 'S',
            ShapeKind::CompSolid => 'O',
            ShapeKind::Compound => 'C',
        }
    }

    /// Candidate ordering rank: vertex < edge < face < everything else.
    pub fn element_rank(self) -> i32 {
        match self {
            ShapeKind::Vertex => 0,
            ShapeKind::Edge => 1,
            ShapeKind::Face => 2,
            _ => 3,
        }
    }

    /// Whether this kind carries mapped names directly.
    pub fn is_element(self) -> bool {
        matches!(self, ShapeKind::Vertex | ShapeKind::Edge | ShapeKind::Face)
    }

    /// The element ancestry consulted when a mapper reports a shape of
    /// this kind: wires resolve through their edges, shells/solids/
    /// compounds through their faces.
    pub fn mapped_kind(self) -> ShapeKind {
        match self {
            ShapeKind::Vertex => ShapeKind::Vertex,
            ShapeKind::Edge | ShapeKind::Wire => ShapeKind::Edge,
            _ => ShapeKind::Face,
        }
    }

    /// Parse a kind from the leading type-name prefix of `s`, returning
    /// the kind and the rest of the string.
    pub fn strip_prefix(s: &str) -> Option<(ShapeKind, &str)> {
        // CompSolid and Compound share a prefix with nothing else; the
        // match order below checks the longer names first.
        const KINDS: [ShapeKind; 8] = [
            ShapeKind::CompSolid,
            ShapeKind::Compound,
            ShapeKind::Vertex,
            ShapeKind::Edge,
            ShapeKind::Wire,
            ShapeKind::Face,
            ShapeKind::Shell,
            ShapeKind::Solid,
        ];
        for kind in KINDS {
            if let Some(rest) = s.strip_prefix(kind.type_name()) {
                return Some((kind, rest));
            }
        }
        None
    }
}
