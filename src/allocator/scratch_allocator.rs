//! A linear allocator that can be used for scratch memory.
//!
//! It is exposed through the [`ResourcePool`](crate::pool::ResourcePool) struct, but you can also create your own
//! instances elsewhere.
//!
//! The allocator works by linearly incrementing an offset on every allocation. Deallocation is only possible by calling
//! [`ScratchAllocator::reset`], which makes all memory available again and resets the offset to zero. Memory is
//! obtained from a backing [`Allocator`] in chunks, which are kept around after a reset and only given back when the
//! scratch allocator is dropped.
//!
//! # Example
//! ```
//! # use helios::prelude::*;
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! let mut alloc = DefaultAllocator::new(&AllocatorSettings::default())?;
//! let mut scratch = ScratchAllocator::new(&mut alloc, 1024u64)?;
//! let first = scratch.allocate(100u64)?;
//! let second = scratch.allocate(100u64)?;
//! assert_eq!(second.offset() - first.offset(), 256);
//! scratch.reset();
//! // We are back at the beginning of the allocator.
//! assert_eq!(scratch.allocate(100u64)?.offset(), first.offset());
//! # Ok(())
//! # }
//! ```

use anyhow::Result;

use crate::allocator::traits::{Allocation, Allocator};
use crate::pool::Poolable;
use crate::util::align::{align, is_valid_alignment};
use crate::{DefaultAllocator, Error, RegionId};

/// A range of memory handed out by a [`ScratchAllocator`]. It stays valid until the scratch allocator is reset or dropped.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScratchView {
    region: RegionId,
    offset: u64,
    size: u64,
}

impl Allocation for ScratchView {
    fn region(&self) -> RegionId {
        self.region
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A linear allocator used for short-lived memory. A good example is per-frame data that is rebuilt every frame and
/// can be thrown away as a whole.
///
/// The best way to obtain a scratch allocator is through a [`ResourcePool`](crate::pool::ResourcePool). This gives
/// a scratch allocator that is reset and recycled when the [`Pooled`](crate::pool::Pooled) handle is dropped.
///
/// See also: [`ResourcePool`](crate::pool::ResourcePool), [`ScratchView`]
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct ScratchAllocator<A: Allocator = DefaultAllocator> {
    #[derivative(Debug = "ignore")]
    allocator: A,
    #[derivative(Debug = "ignore")]
    chunks: Vec<A::Allocation>,
    current_chunk: usize,
    local_offset: u64,
    chunk_size: u64,
    alignment: u64,
}

impl<A: Allocator> ScratchAllocator<A> {
    /// Create a new scratch allocator with a minimum capacity for internally allocated chunks.
    /// Every allocation is aligned to 256 bytes. For more granular control, use [`Self::new_with_alignment()`]
    /// # Errors
    /// * Fails if the first chunk cannot be allocated.
    pub fn new(allocator: &mut A, chunk_size: impl Into<u64>) -> Result<Self> {
        Self::new_with_alignment(allocator, 256u64, chunk_size)
    }

    /// Create a new scratch allocator with given alignment. Offsets of all views are multiples of `alignment`.
    /// # Errors
    /// * Fails if the alignment is not a power of two.
    /// * Fails if the chunk size is zero.
    /// * Fails if the first chunk cannot be allocated.
    pub fn new_with_alignment(allocator: &mut A, alignment: impl Into<u64>, chunk_size: impl Into<u64>) -> Result<Self> {
        let alignment = alignment.into();
        let chunk_size = chunk_size.into();
        if !is_valid_alignment(alignment) {
            anyhow::bail!(Error::InvalidAlignment(alignment));
        }
        if chunk_size == 0 {
            anyhow::bail!(Error::InvalidSettings("scratch chunk size must be non-zero"));
        }

        let chunk = allocator.allocate("scratch_chunk", chunk_size)?;
        Ok(Self {
            allocator: allocator.clone(),
            chunks: vec![chunk],
            current_chunk: 0,
            local_offset: 0,
            chunk_size,
            alignment,
        })
    }

    /// Allocate `size` bytes from the allocator. The offset of the returned view is aligned to the alignment of
    /// this allocator.
    /// # Errors
    /// * Fails if `size` is zero.
    /// * Fails if a new chunk is needed and the backing allocator cannot provide it.
    pub fn allocate(&mut self, size: impl Into<u64>) -> Result<ScratchView> {
        let size: u64 = size.into();
        if size == 0 {
            anyhow::bail!(Error::ZeroSizedAllocation);
        }

        if let Some(view) = self.try_fit(self.current_chunk, self.local_offset, size) {
            return Ok(view);
        }

        // Chunks after the current one are left over from before the last reset.
        let reusable = (self.current_chunk + 1..self.chunks.len()).find(|&index| self.fits(index, 0, size));
        let index = match reusable {
            Some(index) => index,
            None => {
                // Requests larger than the chunk size get a chunk of their own.
                let padded = size
                    .checked_add(self.alignment - 1)
                    .ok_or(Error::OutOfMemory {
                        requested: size,
                        available: 0,
                    })?;
                let chunk = self.allocator.allocate("scratch_chunk", padded.max(self.chunk_size))?;
                self.chunks.push(chunk);
                self.chunks.len() - 1
            }
        };

        self.try_fit(index, 0, size)
            .ok_or_else(|| Error::Uncategorized("scratch chunk too small for request").into())
    }

    /// Resets the current offset into the allocator back to the beginning. All chunks are kept, so allocations after a
    /// reset do not touch the backing allocator until the previous high water mark is exceeded.
    ///
    /// Views handed out before the reset must not be used afterwards, their memory will be handed out again.
    pub fn reset(&mut self) {
        self.current_chunk = 0;
        self.local_offset = 0;
    }

    /// Number of chunks obtained from the backing allocator.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Total size of all chunks in bytes.
    pub fn capacity(&self) -> u64 {
        self.chunks.iter().map(|chunk| chunk.size()).sum()
    }

    /// Alignment of every view handed out by this allocator.
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Start of an aligned range of `size` bytes at or after `local_offset` in chunk `index`, if it fits.
    fn aligned_start(&self, index: usize, local_offset: u64, size: u64) -> Option<u64> {
        let chunk = self.chunks.get(index)?;
        let start = align(chunk.offset().checked_add(local_offset)?, self.alignment);
        let end = start.checked_add(size)?;
        (end <= chunk.offset() + chunk.size()).then_some(start)
    }

    fn fits(&self, index: usize, local_offset: u64, size: u64) -> bool {
        self.aligned_start(index, local_offset, size).is_some()
    }

    fn try_fit(&mut self, index: usize, local_offset: u64, size: u64) -> Option<ScratchView> {
        let start = self.aligned_start(index, local_offset, size)?;
        let chunk = &self.chunks[index];
        let view = ScratchView {
            region: chunk.region(),
            offset: start,
            size,
        };
        let local_offset = start + size - chunk.offset();
        self.current_chunk = index;
        self.local_offset = local_offset;
        Some(view)
    }
}

impl<A: Allocator> Drop for ScratchAllocator<A> {
    fn drop(&mut self) {
        for chunk in self.chunks.drain(..) {
            if let Err(err) = self.allocator.free(chunk) {
                warn!("Failed to free scratch chunk: {err}");
            }
        }
    }
}

impl<A: Allocator> Poolable for ScratchAllocator<A> {
    fn on_release(&mut self) {
        self.reset();
    }
}
