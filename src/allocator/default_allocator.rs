//! Contains a default allocator type based on the [`DynamicBlockAllocator`] that is good for most needs.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::allocator::dynamic_block_allocator::{AllocatorStats, DynamicAllocation, DynamicBlockAllocator, RegionId};
use crate::allocator::traits;
use crate::{AllocatorSettings, Error};

/// The default allocator. This wraps a [`DynamicBlockAllocator`].
/// It's important to note that this allocator is `Clone`, `Send` and `Sync`. All its internal state is safely
/// wrapped inside an `Arc<Mutex<T>>`. This is to facilitate passing it around everywhere.
///
/// See also: [`Allocator`](traits::Allocator), [`Allocation`](traits::Allocation)
///
/// # Example
/// ```
/// # use helios::prelude::*;
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// let settings = AllocatorBuilder::new().min_region_size(4096u64).build();
/// let mut allocator = DefaultAllocator::new(&settings)?;
/// let memory = allocator.allocate("vertex_data", 1024)?;
/// assert_eq!(memory.size(), 1024);
/// allocator.free(memory)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct DefaultAllocator {
    #[derivative(Debug = "ignore")]
    alloc: Arc<Mutex<DynamicBlockAllocator>>,
}

impl DefaultAllocator {
    /// Create a new default allocator.
    /// # Errors
    /// * Fails if the settings are invalid.
    pub fn new(settings: &AllocatorSettings) -> Result<Self> {
        Ok(Self {
            alloc: Arc::new(Mutex::new(DynamicBlockAllocator::new(settings)?)),
        })
    }

    /// Current usage statistics of the shared allocator.
    /// # Errors
    /// * Fails if the internal mutex was poisoned.
    pub fn stats(&self) -> Result<AllocatorStats> {
        Ok(self.with(|alloc| alloc.stats())?)
    }

    /// Drop all regions that are completely free. See [`DynamicBlockAllocator::shrink()`].
    /// # Errors
    /// * Fails if the internal mutex was poisoned.
    pub fn shrink(&self) -> Result<Vec<(RegionId, u64)>> {
        Ok(self.with(|alloc| alloc.shrink())?)
    }

    fn with<R, F: FnOnce(&mut DynamicBlockAllocator) -> R>(&self, f: F) -> Result<R, Error> {
        let mut alloc = self.alloc.lock()?;
        Ok(f(&mut alloc))
    }
}

impl traits::Allocator for DefaultAllocator {
    type Allocation = DynamicAllocation;

    /// Allocate memory from the shared [`DynamicBlockAllocator`].
    /// # Errors
    /// * Fails if the internal mutex was poisoned.
    /// * Fails if the request cannot be served, see [`DynamicBlockAllocator::allocate()`].
    fn allocate(&mut self, name: &'static str, size: u64) -> Result<Self::Allocation> {
        let allocation = self.with(|alloc| alloc.allocate(size))??;
        #[cfg(feature = "log-allocations")]
        trace!("Allocated `{name}` in region {:?} at offset {} (size = {} bytes)", allocation.region(), allocation.offset(), allocation.size());
        #[cfg(not(feature = "log-allocations"))]
        let _ = name;
        Ok(allocation)
    }

    /// Free memory allocated through [`DefaultAllocator::allocate()`].
    /// # Errors
    /// * Fails if the internal mutex was poisoned.
    /// * Fails if the allocation is not live.
    fn free(&mut self, allocation: Self::Allocation) -> Result<()> {
        self.with(|alloc| alloc.release(allocation))?
    }
}

impl traits::Allocation for DynamicAllocation {
    fn region(&self) -> RegionId {
        DynamicAllocation::region(self)
    }

    fn offset(&self) -> u64 {
        DynamicAllocation::offset(self)
    }

    fn size(&self) -> u64 {
        DynamicAllocation::size(self)
    }
}

assert_impl_all!(DefaultAllocator: Send, Sync, Clone);
