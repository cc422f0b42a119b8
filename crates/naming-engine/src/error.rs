use thiserror::Error;

/// Errors surfaced by shape composition. Naming gaps are not errors;
/// an element left unnamed simply stays unnamed.
#[derive(Debug, Error)]
pub enum NamingError {
    #[error("null shape")]
    NullShape,

    #[error(transparent)]
    Shape(#[from] shape_kernel::ShapeError),

    #[error(transparent)]
    ElementMap(#[from] element_map::ElementMapError),
}
