use serde::{Deserialize, Serialize};

/// Scale factors closer to 1 than this are treated as unscaled.
const SCALE_PRECISION: f64 = 1e-14;

/// A rigid placement applied to a shape handle.
///
/// Equality is exact bitwise equality on the components: placements take
/// part in kernel reference-equality, so "almost equal" placements are
/// distinct occurrences by design.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Location {
    pub translation: [f64; 3],
}

impl Location {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new(translation: [f64; 3]) -> Self {
        Self { translation }
    }

    pub fn is_identity(&self) -> bool {
        self.translation == [0.0, 0.0, 0.0]
    }

    /// Compose with a placement applied on top of this one.
    pub fn composed(&self, inner: &Location) -> Location {
        Location {
            translation: [
                self.translation[0] + inner.translation[0],
                self.translation[1] + inner.translation[1],
                self.translation[2] + inner.translation[2],
            ],
        }
    }

    pub(crate) fn bits(&self) -> [u64; 3] {
        [
            self.translation[0].to_bits(),
            self.translation[1].to_bits(),
            self.translation[2].to_bits(),
        ]
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Location {}

/// A transform that may carry a uniform scale on top of a placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f64; 3],
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0, 0.0, 0.0],
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn translation(translation: [f64; 3]) -> Self {
        Self {
            translation,
            scale: 1.0,
        }
    }

    pub fn has_scale(&self) -> bool {
        (self.scale - 1.0).abs() > SCALE_PRECISION
    }

    /// The placement part of this transform, with any scale stripped.
    pub fn placement(&self) -> Location {
        Location::new(self.translation)
    }
}
