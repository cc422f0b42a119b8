pub mod indexed_name;
pub mod mapped_name;
pub mod op_code;
pub mod shape_kind;

pub use indexed_name::*;
pub use mapped_name::*;
pub use shape_kind::*;
