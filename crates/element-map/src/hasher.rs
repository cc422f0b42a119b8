use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Shared handle to a [`StringHasher`]. Hasher identity (pointer
/// equality) decides whether two sids may be merged.
pub type Hasher = Arc<StringHasher>;

/// Interns provenance strings to stable integer ids, compressing long
/// provenance chains down to one identifier. Distinct strings get
/// distinct ids, so interning is collision-free by construction.
#[derive(Debug, Default)]
pub struct StringHasher {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    ids: HashMap<String, u64>,
    strings: Vec<String>,
}

impl StringHasher {
    pub fn new() -> Hasher {
        Arc::new(Self::default())
    }

    /// Intern `text`, returning its sid. Repeated interning of the same
    /// text returns the same id.
    pub fn intern(self: &Arc<Self>, text: &str) -> Sid {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&id) = inner.ids.get(text) {
            return Sid {
                id,
                hasher: Arc::clone(self),
            };
        }
        inner.strings.push(text.to_string());
        let id = inner.strings.len() as u64;
        inner.ids.insert(text.to_string(), id);
        Sid {
            id,
            hasher: Arc::clone(self),
        }
    }

    /// The text behind a sid, if this hasher issued it.
    pub fn resolve(&self, id: u64) -> Option<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.strings.get(id.checked_sub(1)? as usize).cloned()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A numeric source-identifier reference: an interned provenance string
/// plus the hasher that issued it.
#[derive(Debug, Clone)]
pub struct Sid {
    id: u64,
    hasher: Hasher,
}

impl Sid {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this sid was issued by `hasher`.
    pub fn is_from_hasher(&self, hasher: &Hasher) -> bool {
        Arc::ptr_eq(&self.hasher, hasher)
    }

    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }
}

impl PartialEq for Sid {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.hasher, &other.hasher)
    }
}

impl Eq for Sid {}

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.id)
    }
}
