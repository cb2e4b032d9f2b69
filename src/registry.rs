//! Which artworks the destination already has, or has thrown away.

use std::collections::HashSet;

/// Read-only view of the destination gallery used to avoid re-selecting
/// artworks.
pub trait DuplicateRegistry {
    /// Already present in the destination.
    fn is_duplicate(&self, id: u64) -> bool;
    /// Previously removed by the user.
    fn was_deleted(&self, id: u64) -> bool;
}

impl<T: DuplicateRegistry + ?Sized> DuplicateRegistry for &T {
    fn is_duplicate(&self, id: u64) -> bool {
        (**self).is_duplicate(id)
    }

    fn was_deleted(&self, id: u64) -> bool {
        (**self).was_deleted(id)
    }
}

/// Set-backed registry, used when no gallery is attached and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    pub present: HashSet<u64>,
    pub deleted: HashSet<u64>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_present(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            present: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_deleted(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            deleted: ids.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl DuplicateRegistry for MemoryRegistry {
    fn is_duplicate(&self, id: u64) -> bool {
        self.present.contains(&id)
    }

    fn was_deleted(&self, id: u64) -> bool {
        self.deleted.contains(&id)
    }
}
