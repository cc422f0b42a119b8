//! Stable topological naming over kernel shapes.
//!
//! A parametric feature tree references elements of its shapes by name;
//! for those references to survive recomputation, a new shape's
//! vertices, edges and faces must be named from the names of the source
//! elements they came from. This crate layers that identity tracking
//! over an opaque shape kernel: an ancestry cache indexes sub-shape
//! occurrences, an element map stores position-to-name associations,
//! and the composer derives new names from an operation's
//! modification/generation history.

pub mod cache;
pub mod compose;
pub mod error;
pub mod topo_shape;

pub use cache::{Ancestry, ShapeCache};
pub use error::NamingError;
pub use topo_shape::TopoShape;
