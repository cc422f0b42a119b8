//! Deterministic mock modeling operations.
//!
//! These stand in for the real kernel's makers. Their histories imitate
//! OCC-style reporting, including the over-reports the naming layer has
//! to compensate for: an extrusion reports the profile face generating
//! the entire solid, while the profile edges generate the side faces.

use std::collections::HashMap;

use topo_types::ShapeKind;

use crate::builder;
use crate::mapper::ShapeHistory;
use crate::shape::{Plane, Shape, ShapeKey};
use crate::ShapeError;

/// A new shape together with the history that produced it.
#[derive(Debug)]
pub struct OpOutcome {
    pub shape: Shape,
    pub history: ShapeHistory,
}

fn sub([a, b, c]: [f64; 3], [d, e, f]: [f64; 3]) -> [f64; 3] {
    [a - d, b - e, c - f]
}

fn add([a, b, c]: [f64; 3], [d, e, f]: [f64; 3]) -> [f64; 3] {
    [a + d, b + e, c + f]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalized(v: [f64; 3]) -> [f64; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len < 1e-12 {
        return [1.0, 0.0, 0.0];
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

fn scaled(v: [f64; 3], s: f64) -> [f64; 3] {
    [v[0] * s, v[1] * s, v[2] * s]
}

/// Extrude a planar profile face along its normal.
///
/// The result is a prism: the bottom cap coplanar with the profile, the
/// top cap parallel to it, one side face per profile edge.
pub fn extrude(profile: &Shape, depth: f64) -> Result<OpOutcome, ShapeError> {
    if profile.is_null() {
        return Err(ShapeError::NullInput);
    }
    if profile.kind() != Some(ShapeKind::Face) {
        return Err(ShapeError::NotAFace {
            kind: profile.kind().map_or("null", |k| k.type_name()),
        });
    }
    let plane = profile.find_plane().ok_or(ShapeError::MissingPlane)?;
    let offset = scaled(normalized(plane.normal), depth);

    let mut history = ShapeHistory::new();

    // One bottom/top vertex pair and one side edge per profile vertex.
    let mut bottom_verts: HashMap<ShapeKey, Shape> = HashMap::new();
    let mut top_verts: HashMap<ShapeKey, Shape> = HashMap::new();
    let mut side_edges: HashMap<ShapeKey, Shape> = HashMap::new();
    for v in profile.sub_shapes(ShapeKind::Vertex) {
        let point = v.point().ok_or(ShapeError::NullInput)?;
        let bottom = builder::vertex(point);
        let top = builder::vertex(add(point, offset));
        let side_edge = builder::edge(&bottom, &top);
        history.add_generated(&v, side_edge.clone());
        let key = v.key().ok_or(ShapeError::NullInput)?;
        bottom_verts.insert(key, bottom);
        top_verts.insert(key, top);
        side_edges.insert(key, side_edge);
    }

    // One side face per profile edge.
    let mut bottom_edges = Vec::new();
    let mut top_edges = Vec::new();
    let mut side_faces = Vec::new();
    for e in profile.sub_shapes(ShapeKind::Edge) {
        let ends = e.children();
        let (start, end) = match ends.as_slice() {
            [s, t] => (s, t),
            _ => return Err(ShapeError::NullInput),
        };
        let (sk, ek) = (
            start.key().ok_or(ShapeError::NullInput)?,
            end.key().ok_or(ShapeError::NullInput)?,
        );
        let bottom_edge = builder::edge(&bottom_verts[&sk], &bottom_verts[&ek]);
        let top_edge = builder::edge(&top_verts[&sk], &top_verts[&ek]);
        let ring = [
            bottom_edge.clone(),
            side_edges[&sk].clone(),
            top_edge.clone(),
            side_edges[&ek].clone(),
        ];
        let sp = start.point().ok_or(ShapeError::NullInput)?;
        let ep = end.point().ok_or(ShapeError::NullInput)?;
        let mid = add(scaled(add(sp, ep), 0.5), scaled(offset, 0.5));
        let side_plane = Plane::new(mid, normalized(cross(sub(ep, sp), offset)));
        let side_face = builder::face(&[builder::wire(&ring)], side_plane);
        history.add_generated(&e, side_face.clone());
        bottom_edges.push(bottom_edge);
        top_edges.push(top_edge);
        side_faces.push(side_face);
    }

    let bottom_face = builder::face(&[builder::wire(&bottom_edges)], plane);
    let top_face = builder::face(&[builder::wire(&top_edges)], plane.translated(offset));

    let mut faces = vec![bottom_face, top_face];
    faces.extend(side_faces);
    let solid = builder::solid(&[builder::shell(&faces)]);

    // OCC-style over-report: the profile face "generates" the whole solid.
    history.add_generated(profile, solid.clone());

    Ok(OpOutcome {
        shape: solid,
        history,
    })
}

/// Merge two solids into one, boolean-union style: every input element is
/// re-created with fresh identity and reported as modified into its
/// counterpart.
pub fn merge(a: &Shape, b: &Shape) -> Result<OpOutcome, ShapeError> {
    if a.is_null() || b.is_null() {
        return Err(ShapeError::NullInput);
    }
    let mut history = ShapeHistory::new();
    let mut faces = rebuild_elements(a, &mut history)?;
    faces.extend(rebuild_elements(b, &mut history)?);
    let solid = builder::solid(&[builder::shell(&faces)]);
    Ok(OpOutcome {
        shape: solid,
        history,
    })
}

/// Re-create every vertex, edge and face of `input` with fresh backing
/// data, recording each as modified. Returns the new faces.
fn rebuild_elements(
    input: &Shape,
    history: &mut ShapeHistory,
) -> Result<Vec<Shape>, ShapeError> {
    let mut new_verts: HashMap<ShapeKey, Shape> = HashMap::new();
    for v in input.sub_shapes(ShapeKind::Vertex) {
        let point = v.point().ok_or(ShapeError::NullInput)?;
        let new_v = builder::vertex(point);
        history.add_modified(&v, new_v.clone());
        new_verts.insert(v.key().ok_or(ShapeError::NullInput)?, new_v);
    }

    let mut new_edges: HashMap<ShapeKey, Shape> = HashMap::new();
    for e in input.sub_shapes(ShapeKind::Edge) {
        let ends = e.children();
        let (start, end) = match ends.as_slice() {
            [s, t] => (s, t),
            _ => return Err(ShapeError::NullInput),
        };
        let new_e = builder::edge(
            &new_verts[&start.key().ok_or(ShapeError::NullInput)?],
            &new_verts[&end.key().ok_or(ShapeError::NullInput)?],
        );
        history.add_modified(&e, new_e.clone());
        new_edges.insert(e.key().ok_or(ShapeError::NullInput)?, new_e);
    }

    let mut new_faces = Vec::new();
    for f in input.sub_shapes(ShapeKind::Face) {
        let plane = f.find_plane().ok_or(ShapeError::MissingPlane)?;
        let mut ring = Vec::new();
        for e in f.sub_shapes(ShapeKind::Edge) {
            ring.push(new_edges[&e.key().ok_or(ShapeError::NullInput)?].clone());
        }
        let new_f = builder::face(&[builder::wire(&ring)], plane);
        history.add_modified(&f, new_f.clone());
        new_faces.push(new_f);
    }
    Ok(new_faces)
}
