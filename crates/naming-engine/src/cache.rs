//! Per-shape-instance ancestry cache: ordered, per-kind indexes of
//! sub-shape occurrences, built lazily and invalidated when the owning
//! shape is replaced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use shape_kernel::{Shape, ShapeKey};
use topo_types::ShapeKind;

/// Ordered index over all occurrences of one kind within a shape.
///
/// Occurrences are compared by kernel reference-equality, so two
/// geometrically identical but independently built sub-shapes are
/// distinct entries. Indices are 1-based; 0 means "not present".
#[derive(Debug, Default)]
pub struct Ancestry {
    shapes: Vec<Shape>,
    index: HashMap<ShapeKey, usize>,
}

impl Ancestry {
    fn build(shape: &Shape, kind: ShapeKind) -> Self {
        let mut ancestry = Ancestry::default();
        for sub in shape.sub_shapes(kind) {
            if let Some(key) = sub.key() {
                ancestry.shapes.push(sub);
                ancestry.index.insert(key, ancestry.shapes.len());
            }
        }
        ancestry
    }

    pub fn count(&self) -> usize {
        self.shapes.len()
    }

    /// 1-based index of `sub`, 0 if absent or null.
    pub fn find_index(&self, sub: &Shape) -> usize {
        sub.key()
            .and_then(|key| self.index.get(&key).copied())
            .unwrap_or(0)
    }

    /// The occurrence at a 1-based index.
    pub fn find_shape(&self, index: usize) -> Option<Shape> {
        if index == 0 {
            return None;
        }
        self.shapes.get(index - 1).cloned()
    }
}

/// Lazily built ancestry tables over one captured shape instance.
#[derive(Debug)]
pub struct ShapeCache {
    shape: Shape,
    ancestries: Mutex<HashMap<ShapeKind, Arc<Ancestry>>>,
}

impl ShapeCache {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            ancestries: Mutex::new(HashMap::new()),
        }
    }

    /// Whether this cache was built over a different occurrence than
    /// `shape` and must be rebuilt.
    pub fn is_touched(&self, shape: &Shape) -> bool {
        !self.shape.is_same(shape)
    }

    pub fn ancestry(&self, kind: ShapeKind) -> Arc<Ancestry> {
        let mut ancestries = self.ancestries.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            ancestries
                .entry(kind)
                .or_insert_with(|| Arc::new(Ancestry::build(&self.shape, kind))),
        )
    }

    /// 1-based occurrence index of `sub` within the cached shape, 0 if
    /// absent or null.
    pub fn find_shape(&self, sub: &Shape) -> usize {
        match sub.kind() {
            None => 0,
            Some(kind) => self.ancestry(kind).find_index(sub),
        }
    }

    /// All super-shapes of `kind` that structurally contain `sub`.
    pub fn find_ancestors(&self, sub: &Shape, kind: ShapeKind) -> Vec<Shape> {
        if sub.is_null() {
            return Vec::new();
        }
        self.ancestry(kind)
            .shapes
            .iter()
            .filter(|candidate| candidate.contains(sub))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shape_kernel::builder;

    #[test]
    fn ancestry_indexes_are_stable_and_one_based() {
        let solid = builder::make_box(1.0, 1.0, 1.0);
        let cache = ShapeCache::new(solid.clone());
        let edges = cache.ancestry(ShapeKind::Edge);
        assert_eq!(edges.count(), 12);
        for i in 1..=12 {
            let e = edges.find_shape(i).unwrap();
            assert_eq!(edges.find_index(&e), i);
        }
        assert!(edges.find_shape(0).is_none());
        assert!(edges.find_shape(13).is_none());
    }

    #[test]
    fn find_shape_returns_zero_for_foreign_and_null() {
        let solid = builder::make_box(1.0, 1.0, 1.0);
        let cache = ShapeCache::new(solid);
        let foreign = builder::vertex([9.0, 9.0, 9.0]);
        assert_eq!(cache.find_shape(&foreign), 0);
        assert_eq!(cache.find_shape(&Shape::null()), 0);
    }

    #[test]
    fn identical_geometry_gets_distinct_entries() {
        let a = builder::vertex([0.0; 3]);
        let b = builder::vertex([0.0; 3]);
        let compound = builder::compound(&[a.clone(), b.clone()]);
        let cache = ShapeCache::new(compound);
        let verts = cache.ancestry(ShapeKind::Vertex);
        assert_eq!(verts.count(), 2);
        assert_ne!(verts.find_index(&a), verts.find_index(&b));
    }

    #[test]
    fn ancestors_of_a_box_edge_are_two_faces() {
        let solid = builder::make_box(1.0, 1.0, 1.0);
        let cache = ShapeCache::new(solid.clone());
        let edge = &solid.sub_shapes(ShapeKind::Edge)[0];
        let faces = cache.find_ancestors(edge, ShapeKind::Face);
        assert_eq!(faces.len(), 2);
        assert!(cache.find_ancestors(&Shape::null(), ShapeKind::Face).is_empty());
    }

    #[test]
    fn touched_detection() {
        let solid = builder::make_box(1.0, 1.0, 1.0);
        let cache = ShapeCache::new(solid.clone());
        assert!(!cache.is_touched(&solid));
        assert!(cache.is_touched(&builder::make_box(1.0, 1.0, 1.0)));
    }
}
