//! Shape construction. These stand in for the real kernel's makers:
//! they assemble topology and the minimal geometric payload, nothing
//! more.

use topo_types::ShapeKind;

use crate::shape::{Geometry, Plane, Shape};

pub fn vertex(point: [f64; 3]) -> Shape {
    Shape::new_data(ShapeKind::Vertex, Vec::new(), Geometry::Point(point))
}

pub fn edge(start: &Shape, end: &Shape) -> Shape {
    Shape::new_data(
        ShapeKind::Edge,
        vec![start.clone(), end.clone()],
        Geometry::None,
    )
}

pub fn wire(edges: &[Shape]) -> Shape {
    Shape::new_data(ShapeKind::Wire, edges.to_vec(), Geometry::None)
}

pub fn face(wires: &[Shape], plane: Plane) -> Shape {
    Shape::new_data(ShapeKind::Face, wires.to_vec(), Geometry::Plane(plane))
}

pub fn shell(faces: &[Shape]) -> Shape {
    Shape::new_data(ShapeKind::Shell, faces.to_vec(), Geometry::None)
}

pub fn solid(shells: &[Shape]) -> Shape {
    Shape::new_data(ShapeKind::Solid, shells.to_vec(), Geometry::None)
}

pub fn compound(shapes: &[Shape]) -> Shape {
    Shape::new_data(ShapeKind::Compound, shapes.to_vec(), Geometry::None)
}

/// A closed rectangular profile face on the z=0 plane, extending from the
/// origin to (w, h). Useful as an extrusion input in tests.
pub fn make_profile(w: f64, h: f64) -> Shape {
    let corners = [
        vertex([0.0, 0.0, 0.0]),
        vertex([w, 0.0, 0.0]),
        vertex([w, h, 0.0]),
        vertex([0.0, h, 0.0]),
    ];
    let edges = [
        edge(&corners[0], &corners[1]),
        edge(&corners[1], &corners[2]),
        edge(&corners[2], &corners[3]),
        edge(&corners[3], &corners[0]),
    ];
    let outer = wire(&edges);
    face(
        &[outer],
        Plane::new([w / 2.0, h / 2.0, 0.0], [0.0, 0.0, 1.0]),
    )
}

/// A box solid with full shared topology: 8 vertices, 12 edges, 6 faces,
/// one shell. Origin at (0,0,0), extending to (w,h,d).
pub fn make_box(w: f64, h: f64, d: f64) -> Shape {
    let positions = [
        [0.0, 0.0, 0.0],
        [w, 0.0, 0.0],
        [w, h, 0.0],
        [0.0, h, 0.0],
        [0.0, 0.0, d],
        [w, 0.0, d],
        [w, h, d],
        [0.0, h, d],
    ];
    let verts: Vec<Shape> = positions.iter().map(|&p| vertex(p)).collect();

    // 4 bottom, 4 top, 4 vertical.
    let edge_pairs = [
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 0),
        (4, 5),
        (5, 6),
        (6, 7),
        (7, 4),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
    ];
    let edges: Vec<Shape> = edge_pairs
        .iter()
        .map(|&(s, e)| edge(&verts[s], &verts[e]))
        .collect();

    // (edge indices, normal, centroid)
    let face_defs: [(&[usize; 4], [f64; 3], [f64; 3]); 6] = [
        (&[0, 1, 2, 3], [0.0, 0.0, -1.0], [w / 2.0, h / 2.0, 0.0]),
        (&[4, 5, 6, 7], [0.0, 0.0, 1.0], [w / 2.0, h / 2.0, d]),
        (&[0, 9, 4, 8], [0.0, -1.0, 0.0], [w / 2.0, 0.0, d / 2.0]),
        (&[2, 11, 6, 10], [0.0, 1.0, 0.0], [w / 2.0, h, d / 2.0]),
        (&[3, 8, 7, 11], [-1.0, 0.0, 0.0], [0.0, h / 2.0, d / 2.0]),
        (&[1, 10, 5, 9], [1.0, 0.0, 0.0], [w, h / 2.0, d / 2.0]),
    ];
    let faces: Vec<Shape> = face_defs
        .iter()
        .map(|(idx, normal, centroid)| {
            let ring: Vec<Shape> = idx.iter().map(|&i| edges[i].clone()).collect();
            face(&[wire(&ring)], Plane::new(*centroid, *normal))
        })
        .collect();

    solid(&[shell(&faces)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_topology() {
        let profile = make_profile(2.0, 3.0);
        assert_eq!(profile.kind(), Some(ShapeKind::Face));
        assert_eq!(profile.count_sub_shapes(ShapeKind::Edge), 4);
        assert_eq!(profile.count_sub_shapes(ShapeKind::Vertex), 4);
        let plane = profile.find_plane().unwrap();
        assert_eq!(plane.normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn box_faces_share_edges() {
        let solid = make_box(1.0, 1.0, 1.0);
        // Every edge of the box is shared by exactly 2 faces.
        let faces = solid.sub_shapes(ShapeKind::Face);
        for e in solid.sub_shapes(ShapeKind::Edge) {
            let shared = faces.iter().filter(|f| f.contains(&e)).count();
            assert_eq!(shared, 2);
        }
    }

    #[test]
    fn outer_wire_of_box_face() {
        let solid = make_box(1.0, 1.0, 1.0);
        let face = &solid.sub_shapes(ShapeKind::Face)[0];
        let outer = face.outer_wire().unwrap();
        assert_eq!(outer.count_sub_shapes(ShapeKind::Edge), 4);
    }
}
