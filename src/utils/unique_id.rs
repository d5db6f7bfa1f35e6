use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier.
///
/// Identifier which is guaranteed to be unique during the program run. It is
/// intentionally kept opaque and dedicated to comparison of runtime entities
/// like subscriber handles.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct UniqueId(u64);

static NEXT_UNIQUE_ID: AtomicU64 = AtomicU64::new(0);

impl UniqueId {
    /// Generates a unique identifier.
    pub fn new() -> Self {
        Self(NEXT_UNIQUE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Debug for UniqueId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UniqueId").finish()
    }
}

#[cfg(test)]
mod unique_id_tests {
    use super::*;

    #[test]
    fn test_unique_id() {
        let id_0 = UniqueId::new();
        let id_1 = UniqueId::new();

        assert_eq!(id_0, id_0);
        assert!(id_0 < id_1);
        assert_ne!(id_0, id_1);
    }
}
