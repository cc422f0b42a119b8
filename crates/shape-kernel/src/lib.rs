//! Opaque kernel shape handles and the operation-history oracle.
//!
//! Shapes are reference-counted handles with kernel reference-equality:
//! two handles are "the same" occurrence when they share underlying data
//! and placement, and "partners" when they share data regardless of
//! placement. Geometry itself is out of scope; shapes carry only the
//! topology and the minimal geometric payload (vertex points, face
//! planes) that the naming layer's heuristics consult.

pub mod builder;
pub mod location;
pub mod mapper;
pub mod ops;
pub mod shape;

pub use builder::*;
pub use location::{Location, Transform};
pub use mapper::{Mapper, NullMapper, ShapeHistory};
pub use ops::{extrude, merge, OpOutcome};
pub use shape::{Geometry, Plane, Shape, ShapeKey};

/// Errors from kernel-level shape operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ShapeError {
    #[error("expected a face, got {kind}")]
    NotAFace { kind: &'static str },

    #[error("face carries no plane")]
    MissingPlane,

    #[error("null input shape")]
    NullInput,
}
