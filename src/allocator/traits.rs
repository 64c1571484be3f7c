//! Traits implemented by every allocator that can back a [`ScratchAllocator`](crate::ScratchAllocator) or a
//! [`ResourcePool`](crate::pool::ResourcePool).

use anyhow::Result;

use crate::RegionId;

/// An allocator that hands out ranges of a region. Implementors must be cheap to clone and shareable between
/// threads, since every [`ScratchAllocator`](crate::ScratchAllocator) keeps its own handle.
pub trait Allocator: Clone + Send + Sync {
    /// Allocation type returned from this allocator.
    type Allocation: Allocation;

    /// Allocate at least `size` bytes. `name` identifies the allocation in debug logs.
    fn allocate(&mut self, name: &'static str, size: u64) -> Result<Self::Allocation>;
    /// Give an allocation back to the allocator.
    fn free(&mut self, allocation: Self::Allocation) -> Result<()>;
}

/// A range of memory handed out by an [`Allocator`].
pub trait Allocation {
    /// Region the range lives in.
    fn region(&self) -> RegionId;
    /// Offset of the range inside its region, in bytes.
    fn offset(&self) -> u64;
    /// Size of the range in bytes.
    fn size(&self) -> u64;
}
