//! Stable element naming primitives: the encoded-name conventions, the
//! provenance string hasher, and the element map that ties instance-local
//! positions to stable names.

pub mod encode;
pub mod hasher;
pub mod map;

pub use encode::{
    child_postfix, encode_element_name, ELEMENT_MAP_PREFIX, MAX_PROVENANCE_LEN,
    POSTFIX_EXTRA, POSTFIX_GEN, POSTFIX_LOWER, POSTFIX_MOD, POSTFIX_MODGEN, POSTFIX_TAG,
    POSTFIX_UPPER,
};
pub use hasher::{Hasher, Sid, StringHasher};
pub use map::{ChildRange, ElementMap, ElementMapEntry, ElementMapError, NameEntry};
