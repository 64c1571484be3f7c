//! Host memory heap built on the [`DynamicBlockAllocator`].
//!
//! A [`HostHeap`] reserves one zero-initialized, aligned allocation from the global allocator for every region of its
//! block allocator. Blocks handed out by the heap are byte ranges inside that memory, accessed through
//! [`HostHeap::bytes()`] and [`HostHeap::bytes_mut()`].
//!
//! # Example
//! ```
//! # use helios::prelude::*;
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! let settings = AllocatorBuilder::new().alignment(64u64).min_region_size(4096u64).build();
//! let mut heap = HostHeap::new(&settings)?;
//! let block = heap.allocate(12)?;
//! heap.bytes_mut(&block)?.copy_from_slice(b"hello helios");
//! assert_eq!(heap.bytes(&block)?, b"hello helios");
//! heap.release(block)?;
//! # Ok(())
//! # }
//! ```

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use anyhow::Result;

use crate::allocator::dynamic_block_allocator::{AllocatorStats, DynamicAllocation, DynamicBlockAllocator, RegionId};
use crate::{AllocatorSettings, Error};

/// Backing memory of a single region.
struct RegionMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl RegionMemory {
    fn new(size: u64, alignment: u64) -> Result<Self> {
        let size_bytes = usize::try_from(size).map_err(|_| Error::HostAllocationFailed(size))?;
        let alignment = usize::try_from(alignment).map_err(|_| Error::InvalidAlignment(alignment))?;
        let layout = Layout::from_size_align(size_bytes, alignment).map_err(Error::from)?;
        // SAFETY: Region sizes are never zero, the allocator rejects a zero minimum block size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(Error::HostAllocationFailed(size))?;
        Ok(Self {
            ptr,
            layout,
        })
    }
}

impl Drop for RegionMemory {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by `alloc_zeroed` with exactly this layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// A block of host memory handed out by a [`HostHeap`]. Not `Clone`, so every block has exactly one owner.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct HeapBlock {
    allocation: DynamicAllocation,
    len: u64,
}

impl HeapBlock {
    /// Requested size of the block in bytes. Never zero, zero-sized requests are rejected.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Size of the underlying allocator block. Can be larger than [`HeapBlock::len()`] because of alignment and the
    /// minimum block size.
    pub fn capacity(&self) -> u64 {
        self.allocation.size()
    }

    /// The underlying allocation.
    pub fn allocation(&self) -> &DynamicAllocation {
        &self.allocation
    }
}

/// Heap of host memory with best-fit allocation and coalescing.
///
/// See also: [`DynamicBlockAllocator`], [`HeapBlock`]
#[derive(Derivative)]
#[derivative(Debug)]
pub struct HostHeap {
    allocator: DynamicBlockAllocator,
    // Indexed by `RegionId`.
    #[derivative(Debug = "ignore")]
    memory: Vec<Option<RegionMemory>>,
}

// SAFETY: The heap uniquely owns its region memory, and only hands out references to it tied to a borrow of the heap.
unsafe impl Send for HostHeap {}
// SAFETY: Shared access only produces shared byte slices.
unsafe impl Sync for HostHeap {}

impl HostHeap {
    /// Create an empty heap. Memory is reserved lazily on the first allocation.
    /// # Errors
    /// * Fails if the settings are invalid, see [`AllocatorSettings::validate()`]
    pub fn new(settings: &AllocatorSettings) -> Result<Self> {
        Ok(Self {
            allocator: DynamicBlockAllocator::new(settings)?,
            memory: Vec::new(),
        })
    }

    /// Allocate a block of `size` bytes. The block starts out zeroed if its memory was never used before, otherwise it
    /// holds whatever the previous owner left behind.
    /// # Errors
    /// * Fails if `size` is zero.
    /// * Fails if the size limit is reached or the system allocator is out of memory.
    pub fn allocate(&mut self, size: u64) -> Result<HeapBlock> {
        let allocation = self.allocator.allocate(size)?;
        if let Err(err) = self.ensure_memory(allocation.region()) {
            // Undo the region reservation so the allocator and the memory table stay in sync.
            self.allocator.release(allocation)?;
            self.shrink();
            return Err(err);
        }
        Ok(HeapBlock {
            allocation,
            len: size,
        })
    }

    /// Give a block back to the heap.
    /// # Errors
    /// * Fails if the block does not belong to this heap.
    pub fn release(&mut self, block: HeapBlock) -> Result<()> {
        self.allocator.release(block.allocation)
    }

    /// Read access to the bytes of `block`.
    /// # Errors
    /// * Fails if the block does not belong to this heap.
    pub fn bytes(&self, block: &HeapBlock) -> Result<&[u8]> {
        let ptr = self.block_ptr(block)?;
        // SAFETY: The range lies within a live region, blocks never overlap, and the memory was zero-initialized.
        Ok(unsafe { std::slice::from_raw_parts(ptr.as_ptr(), block.len as usize) })
    }

    /// Write access to the bytes of `block`.
    /// # Errors
    /// * Fails if the block does not belong to this heap.
    pub fn bytes_mut(&mut self, block: &HeapBlock) -> Result<&mut [u8]> {
        let ptr = self.block_ptr(block)?;
        // SAFETY: As in `bytes()`, and the exclusive borrow of the heap rules out any other slice into its memory.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), block.len as usize) })
    }

    /// Return the memory of all completely free regions to the system. Returns the number of bytes released.
    pub fn shrink(&mut self) -> u64 {
        self.allocator
            .shrink()
            .into_iter()
            .map(|(region, size)| {
                if let Some(slot) = self.memory.get_mut(region.index()) {
                    *slot = None;
                }
                size
            })
            .sum()
    }

    /// Current usage statistics.
    pub fn stats(&self) -> AllocatorStats {
        self.allocator.stats()
    }

    fn ensure_memory(&mut self, region: RegionId) -> Result<()> {
        let index = region.index();
        if self.memory.len() <= index {
            self.memory.resize_with(index + 1, || None);
        }
        let size = self
            .allocator
            .region_size(region)
            .ok_or(Error::Uncategorized("allocation refers to a missing region"))?;
        // Region ids are reused after a shrink, so memory left over for an id may belong to an older, smaller region.
        let stale = !self.memory[index]
            .as_ref()
            .is_some_and(|memory| memory.layout.size() as u64 == size);
        if stale {
            self.memory[index] = None;
            self.memory[index] = Some(RegionMemory::new(size, self.allocator.settings().alignment)?);
            #[cfg(feature = "log-allocations")]
            trace!("Reserved {size} bytes of host memory for region {region:?}");
        }
        Ok(())
    }

    fn block_ptr(&self, block: &HeapBlock) -> Result<NonNull<u8>> {
        if !self.allocator.is_live(&block.allocation) {
            anyhow::bail!(Error::StaleAllocation);
        }
        let memory = self
            .memory
            .get(block.allocation.region().index())
            .and_then(Option::as_ref)
            .ok_or(Error::StaleAllocation)?;
        if block.allocation.offset() + block.len > memory.layout.size() as u64 {
            anyhow::bail!(Error::StaleAllocation);
        }
        // SAFETY: The range was checked against the size of this memory above.
        let ptr = unsafe { memory.ptr.as_ptr().add(block.allocation.offset() as usize) };
        NonNull::new(ptr).ok_or_else(|| Error::Uncategorized("null block pointer").into())
    }
}
