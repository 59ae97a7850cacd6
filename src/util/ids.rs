//! Allocation of small reusable numeric ids.

use std::collections::BTreeSet;

/// Hands out ids starting at 1, always reusing the lowest free id.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    used: BTreeSet<usize>,
}

impl IdAllocator {
    /// Create an allocator with no ids in use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lowest free id.
    pub fn allocate(&mut self) -> usize {
        let mut candidate = 1;
        for &id in &self.used {
            if id != candidate {
                break;
            }
            candidate += 1;
        }
        self.used.insert(candidate);
        candidate
    }

    /// Return `id` to the allocator.
    pub fn release(&mut self, id: usize) -> bool {
        self.used.remove(&id)
    }

    /// Number of ids in use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Whether no id is in use.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
