use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use topo_types::ShapeKind;
use tracing::warn;

use crate::location::{Location, Transform};

static NEXT_DATA_ID: AtomicU64 = AtomicU64::new(1);

/// Angular/positional tolerance for the plane comparisons below.
const CONFUSION: f64 = 1e-7;

/// A plane attached to a planar face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub origin: [f64; 3],
    pub normal: [f64; 3],
}

impl Plane {
    pub fn new(origin: [f64; 3], normal: [f64; 3]) -> Self {
        Self { origin, normal }
    }

    pub fn translated(&self, offset: [f64; 3]) -> Plane {
        Plane {
            origin: [
                self.origin[0] + offset[0],
                self.origin[1] + offset[1],
                self.origin[2] + offset[2],
            ],
            normal: self.normal,
        }
    }

    /// Axes parallel within tolerance (same or opposite direction).
    pub fn is_parallel(&self, other: &Plane) -> bool {
        let cross = [
            self.normal[1] * other.normal[2] - self.normal[2] * other.normal[1],
            self.normal[2] * other.normal[0] - self.normal[0] * other.normal[2],
            self.normal[0] * other.normal[1] - self.normal[1] * other.normal[0],
        ];
        (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt() <= CONFUSION
    }

    /// Parallel, and the origin offset has no component along either normal.
    pub fn is_coplanar(&self, other: &Plane) -> bool {
        if !self.is_parallel(other) {
            return false;
        }
        let vec = [
            other.origin[0] - self.origin[0],
            other.origin[1] - self.origin[1],
            other.origin[2] - self.origin[2],
        ];
        let d1 = (self.normal[0] * vec[0] + self.normal[1] * vec[1] + self.normal[2] * vec[2]).abs();
        let d2 =
            (other.normal[0] * vec[0] + other.normal[1] * vec[1] + other.normal[2] * vec[2]).abs();
        d1 <= CONFUSION && d2 <= CONFUSION
    }
}

/// Geometric payload of a shape, the minimum the naming heuristics need.
#[derive(Debug, Clone)]
pub enum Geometry {
    None,
    Point([f64; 3]),
    Plane(Plane),
}

/// The shared, immutable backing data of a shape occurrence.
#[derive(Debug)]
pub struct ShapeData {
    id: u64,
    kind: ShapeKind,
    children: Vec<Shape>,
    geometry: Geometry,
}

/// Identity key of a shape occurrence: backing data plus placement.
///
/// Two occurrences with equal keys are "the same" in the kernel sense;
/// geometrically identical but independently constructed shapes get
/// distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    data: u64,
    location: [u64; 3],
}

/// An opaque, nullable handle to kernel-produced geometry.
///
/// Cloning a `Shape` clones the handle, never the geometry; the backing
/// data is shared and owned by the kernel layer.
#[derive(Clone, Default)]
pub struct Shape {
    data: Option<Arc<ShapeData>>,
    location: Location,
}

impl Shape {
    /// The null shape.
    pub fn null() -> Self {
        Self::default()
    }

    pub(crate) fn new_data(kind: ShapeKind, children: Vec<Shape>, geometry: Geometry) -> Self {
        Shape {
            data: Some(Arc::new(ShapeData {
                id: NEXT_DATA_ID.fetch_add(1, Ordering::Relaxed),
                kind,
                children,
                geometry,
            })),
            location: Location::identity(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    pub fn kind(&self) -> Option<ShapeKind> {
        self.data.as_ref().map(|d| d.kind)
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Identity key of this occurrence; `None` for the null shape.
    pub fn key(&self) -> Option<ShapeKey> {
        self.data.as_ref().map(|d| ShapeKey {
            data: d.id,
            location: self.location.bits(),
        })
    }

    /// Kernel reference-equality: same backing data, same placement.
    /// Two null shapes compare as the same.
    pub fn is_same(&self, other: &Shape) -> bool {
        match (&self.data, &other.data) {
            (None, None) => true,
            (Some(a), Some(b)) => a.id == b.id && self.location == other.location,
            _ => false,
        }
    }

    /// Same backing data, placement ignored (a moved/cloned shape is a
    /// partner of its original).
    pub fn is_partner(&self, other: &Shape) -> bool {
        match (&self.data, &other.data) {
            (Some(a), Some(b)) => a.id == b.id,
            _ => false,
        }
    }

    /// Direct children with this occurrence's placement accumulated.
    pub fn children(&self) -> Vec<Shape> {
        match &self.data {
            None => Vec::new(),
            Some(d) => d
                .children
                .iter()
                .map(|c| Shape {
                    data: c.data.clone(),
                    location: self.location.composed(&c.location),
                })
                .collect(),
        }
    }

    /// All occurrences of `kind` within this shape (itself included when
    /// kinds match), in deterministic pre-order, de-duplicated by
    /// kernel reference-equality. Empty for the null shape.
    pub fn sub_shapes(&self, kind: ShapeKind) -> Vec<Shape> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        self.collect_sub_shapes(kind, &mut out, &mut seen);
        out
    }

    fn collect_sub_shapes(
        &self,
        kind: ShapeKind,
        out: &mut Vec<Shape>,
        seen: &mut std::collections::HashSet<ShapeKey>,
    ) {
        let Some(key) = self.key() else {
            return;
        };
        if self.kind() == Some(kind) && seen.insert(key) {
            out.push(self.clone());
        }
        for child in self.children() {
            child.collect_sub_shapes(kind, out, seen);
        }
    }

    pub fn count_sub_shapes(&self, kind: ShapeKind) -> usize {
        self.sub_shapes(kind).len()
    }

    /// Whether `sub` occurs within this shape (kernel equality).
    pub fn contains(&self, sub: &Shape) -> bool {
        match sub.kind() {
            None => false,
            Some(kind) => self.sub_shapes(kind).iter().any(|s| s.is_same(sub)),
        }
    }

    /// The plane of a planar face, placed; `None` for anything else.
    pub fn find_plane(&self) -> Option<Plane> {
        let data = self.data.as_ref()?;
        match &data.geometry {
            Geometry::Plane(plane) => Some(plane.translated(self.location.translation)),
            _ => None,
        }
    }

    /// The point of a vertex, placed.
    pub fn point(&self) -> Option<[f64; 3]> {
        let data = self.data.as_ref()?;
        match &data.geometry {
            Geometry::Point(p) => Some([
                p[0] + self.location.translation[0],
                p[1] + self.location.translation[1],
                p[2] + self.location.translation[2],
            ]),
            _ => None,
        }
    }

    /// The outer wire of a face: its first wire child.
    pub fn outer_wire(&self) -> Option<Shape> {
        if self.kind() != Some(ShapeKind::Face) {
            return None;
        }
        self.children()
            .into_iter()
            .find(|c| c.kind() == Some(ShapeKind::Wire))
    }

    /// This shape moved by `transform` on top of its current placement.
    /// Any scale component is stripped: the kernel owns scaling, handles
    /// carry placement only.
    pub fn moved(&self, transform: &Transform) -> Shape {
        if self.is_null() {
            return Shape::null();
        }
        if transform.has_scale() {
            warn!(scale = transform.scale, "stripping scale from shape move");
        }
        Shape {
            data: self.data.clone(),
            location: transform.placement().composed(&self.location),
        }
    }

    /// This shape with its placement reset and then moved by `transform`.
    pub fn located(&self, transform: &Transform) -> Shape {
        if self.is_null() {
            return Shape::null();
        }
        Shape {
            data: self.data.clone(),
            location: Location::identity(),
        }
        .moved(transform)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            None => write!(f, "Shape(null)"),
            Some(d) => {
                write!(f, "Shape({}#{}", d.kind.type_name(), d.id)?;
                if !self.location.is_identity() {
                    write!(f, " @{:?}", self.location.translation)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;

    #[test]
    fn null_shape_queries_are_empty() {
        let null = Shape::null();
        assert!(null.is_null());
        assert_eq!(null.kind(), None);
        assert_eq!(null.key(), None);
        assert!(null.sub_shapes(ShapeKind::Vertex).is_empty());
        assert!(!null.contains(&builder::vertex([0.0; 3])));
    }

    #[test]
    fn same_and_partner_equality() {
        let v = builder::vertex([1.0, 2.0, 3.0]);
        let moved = v.moved(&Transform::translation([1.0, 0.0, 0.0]));
        assert!(v.is_same(&v.clone()));
        assert!(!v.is_same(&moved));
        assert!(v.is_partner(&moved));

        let independent = builder::vertex([1.0, 2.0, 3.0]);
        assert!(!v.is_same(&independent));
        assert!(!v.is_partner(&independent));
    }

    #[test]
    fn located_resets_placement() {
        let v = builder::vertex([0.0; 3]);
        let moved = v.moved(&Transform::translation([5.0, 0.0, 0.0]));
        let relocated = moved.located(&Transform::translation([0.0, 1.0, 0.0]));
        assert_eq!(relocated.location(), Location::new([0.0, 1.0, 0.0]));
        assert!(relocated.is_partner(&v));
    }

    #[test]
    fn moved_strips_scale() {
        let v = builder::vertex([0.0; 3]);
        let scaled = Transform {
            translation: [1.0, 0.0, 0.0],
            scale: 2.0,
        };
        let moved = v.moved(&scaled);
        assert_eq!(moved.location(), Location::new([1.0, 0.0, 0.0]));
    }

    #[test]
    fn sub_shapes_dedup_shared_children() {
        let a = builder::vertex([0.0, 0.0, 0.0]);
        let b = builder::vertex([1.0, 0.0, 0.0]);
        let c = builder::vertex([1.0, 1.0, 0.0]);
        let e1 = builder::edge(&a, &b);
        let e2 = builder::edge(&b, &c);
        let w = builder::wire(&[e1, e2]);
        // b is shared by both edges but must appear once.
        assert_eq!(w.count_sub_shapes(ShapeKind::Vertex), 3);
        assert_eq!(w.count_sub_shapes(ShapeKind::Edge), 2);
        assert!(w.contains(&b));
    }

    #[test]
    fn box_topology_counts() {
        let solid = builder::make_box(2.0, 3.0, 4.0);
        assert_eq!(solid.count_sub_shapes(ShapeKind::Vertex), 8);
        assert_eq!(solid.count_sub_shapes(ShapeKind::Edge), 12);
        assert_eq!(solid.count_sub_shapes(ShapeKind::Face), 6);
        assert_eq!(solid.count_sub_shapes(ShapeKind::Solid), 1);
    }

    #[test]
    fn plane_parallel_and_coplanar() {
        let base = Plane::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        let lifted = Plane::new([3.0, 1.0, 5.0], [0.0, 0.0, 1.0]);
        let inplane = Plane::new([3.0, 1.0, 0.0], [0.0, 0.0, -1.0]);
        let tilted = Plane::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        assert!(base.is_parallel(&lifted));
        assert!(!base.is_coplanar(&lifted));
        assert!(base.is_coplanar(&inplane));
        assert!(!base.is_parallel(&tilted));
    }
}
