use std::collections::HashMap;

use crate::shape::{Shape, ShapeKey};

/// Per-operation oracle reporting generation/modification relationships
/// at the sub-shape level, supplied by the kernel-operation wrapper that
/// produced a new shape.
///
/// Both queries may return empty; makers routinely over-report (an edge
/// "generating" the whole solid), which the naming layer compensates for.
pub trait Mapper {
    /// New sub-shapes that are a modification of `original`.
    fn modified(&self, _original: &Shape) -> Vec<Shape> {
        Vec::new()
    }

    /// New sub-shapes generated from `original`.
    fn generated(&self, _original: &Shape) -> Vec<Shape> {
        Vec::new()
    }
}

/// A mapper with no history at all.
pub struct NullMapper;

impl Mapper for NullMapper {}

/// A recorded history, keyed by occurrence identity of the original
/// sub-shapes. Operations fill one in as they build their result.
#[derive(Debug, Default)]
pub struct ShapeHistory {
    modified: HashMap<ShapeKey, Vec<Shape>>,
    generated: HashMap<ShapeKey, Vec<Shape>>,
}

impl ShapeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_modified(&mut self, original: &Shape, new_shape: Shape) {
        if let Some(key) = original.key() {
            self.modified.entry(key).or_default().push(new_shape);
        }
    }

    pub fn add_generated(&mut self, original: &Shape, new_shape: Shape) {
        if let Some(key) = original.key() {
            self.generated.entry(key).or_default().push(new_shape);
        }
    }
}

impl Mapper for ShapeHistory {
    fn modified(&self, original: &Shape) -> Vec<Shape> {
        original
            .key()
            .and_then(|k| self.modified.get(&k))
            .cloned()
            .unwrap_or_default()
    }

    fn generated(&self, original: &Shape) -> Vec<Shape> {
        original
            .key()
            .and_then(|k| self.generated.get(&k))
            .cloned()
            .unwrap_or_default()
    }
}
