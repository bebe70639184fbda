//! Entity identifier allocation.
//!
//! Identifiers are small non-negative integers below `2^bits` so they fit the
//! wire format. The allocator always hands out the smallest identifier not
//! currently held, and a released identifier only becomes available again
//! once [`IdAllocator::release`] has been called for it.

use crate::error::AllocationError;
use log::warn;
use shared::EntityId;
use std::collections::BTreeSet;

#[derive(Debug)]
pub struct IdAllocator {
    bits: u32,
    capacity: u64,
    /// Every id below this mark has been issued at least once.
    high_water: u64,
    /// Released ids below `high_water`, ready for reuse.
    free: BTreeSet<EntityId>,
}

impl IdAllocator {
    pub fn new(bits: u32) -> Self {
        let bits = bits.min(32);
        Self {
            bits,
            capacity: 1u64 << bits,
            high_water: 0,
            free: BTreeSet::new(),
        }
    }

    /// Returns the smallest identifier not currently in use.
    pub fn allocate(&mut self) -> Result<EntityId, AllocationError> {
        // Free ids are all below the high-water mark, so the smallest free
        // id is always the smallest unused one.
        if let Some(id) = self.free.pop_first() {
            return Ok(id);
        }

        if self.high_water >= self.capacity {
            return Err(AllocationError::Exhausted {
                bits: self.bits,
                capacity: self.capacity,
            });
        }

        let id = self.high_water as EntityId;
        self.high_water += 1;
        Ok(id)
    }

    /// Returns `id` to the pool. Releasing an id that is not held is ignored.
    pub fn release(&mut self, id: EntityId) -> bool {
        if u64::from(id) >= self.high_water || !self.free.insert(id) {
            warn!("Ignoring release of id {} which is not allocated", id);
            return false;
        }

        // Shrink the high-water mark so the free set stays small.
        while self.high_water > 0 {
            let top = (self.high_water - 1) as EntityId;
            if !self.free.remove(&top) {
                break;
            }
            self.high_water -= 1;
        }
        true
    }

    pub fn is_allocated(&self, id: EntityId) -> bool {
        u64::from(id) < self.high_water && !self.free.contains(&id)
    }

    pub fn allocated_count(&self) -> u64 {
        self.high_water - self.free.len() as u64
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Fails unless `count` more ids can be allocated right now.
    pub fn ensure_available(&self, count: u64) -> Result<(), AllocationError> {
        if self.capacity - self.allocated_count() < count {
            return Err(AllocationError::Exhausted {
                bits: self.bits,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocates_sequentially() {
        let mut allocator = IdAllocator::new(16);
        assert_eq!(allocator.allocate(), Ok(0));
        assert_eq!(allocator.allocate(), Ok(1));
        assert_eq!(allocator.allocate(), Ok(2));
        assert_eq!(allocator.allocated_count(), 3);
    }

    #[test]
    fn test_reuses_smallest_released_id() {
        let mut allocator = IdAllocator::new(16);
        for _ in 0..5 {
            allocator.allocate().unwrap();
        }

        assert!(allocator.release(3));
        assert!(allocator.release(1));

        assert_eq!(allocator.allocate(), Ok(1));
        assert_eq!(allocator.allocate(), Ok(3));
        assert_eq!(allocator.allocate(), Ok(5));
    }

    #[test]
    fn test_release_of_top_id_lowers_high_water() {
        let mut allocator = IdAllocator::new(16);
        for _ in 0..4 {
            allocator.allocate().unwrap();
        }
        allocator.release(2);
        allocator.release(3);

        assert_eq!(allocator.allocated_count(), 2);
        assert_eq!(allocator.allocate(), Ok(2));
    }

    #[test]
    fn test_double_release_is_ignored() {
        let mut allocator = IdAllocator::new(16);
        let id = allocator.allocate().unwrap();
        allocator.allocate().unwrap();

        assert!(allocator.release(id));
        assert!(!allocator.release(id));
        assert!(!allocator.release(999));

        assert_eq!(allocator.allocate(), Ok(id));
        assert_eq!(allocator.allocate(), Ok(2));
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let mut allocator = IdAllocator::new(2);
        for expected in 0..4 {
            assert_eq!(allocator.allocate(), Ok(expected));
        }

        assert_eq!(
            allocator.allocate(),
            Err(AllocationError::Exhausted {
                bits: 2,
                capacity: 4
            })
        );

        allocator.release(2);
        assert_eq!(allocator.allocate(), Ok(2));
    }

    #[test]
    fn test_ensure_available_counts_free_ids() {
        let mut allocator = IdAllocator::new(2);
        allocator.allocate().unwrap();
        allocator.allocate().unwrap();

        assert!(allocator.ensure_available(2).is_ok());
        assert!(allocator.ensure_available(3).is_err());

        allocator.release(0);
        assert!(allocator.ensure_available(3).is_ok());
    }

    #[test]
    fn test_never_issues_live_id() {
        let mut allocator = IdAllocator::new(8);
        let mut live = HashSet::new();

        // Deterministic churn: allocate two, release the oldest odd one.
        for round in 0..200u32 {
            let id = allocator.allocate().unwrap();
            assert!(live.insert(id), "id {} issued while still live", id);
            let id = allocator.allocate().unwrap();
            assert!(live.insert(id), "id {} issued while still live", id);

            let victim = live.iter().copied().filter(|id| (id + round) % 2 == 1).min();
            if let Some(victim) = victim {
                live.remove(&victim);
                allocator.release(victim);
            }
            if live.len() > 100 {
                let oldest = *live.iter().min().unwrap();
                live.remove(&oldest);
                allocator.release(oldest);
            }
        }

        for id in &live {
            assert!(allocator.is_allocated(*id));
        }
        assert_eq!(allocator.allocated_count(), live.len() as u64);
    }
}
