//! Exposes all structs needed to store initialization parameters.

use anyhow::Result;

use crate::util::align::is_valid_alignment;
use crate::Error;

/// Settings for a [`DynamicBlockAllocator`](crate::DynamicBlockAllocator) and the objects built on top of it.
///
/// The easiest way to create these is through an [`AllocatorBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorSettings {
    /// Alignment of every block, in bytes. Must be a power of two. All block sizes and offsets are multiples of this value.
    pub alignment: u64,
    /// Smallest block the allocator will create. Requests below this size are rounded up, and a free block is only split
    /// if the remainder is at least this large.
    pub min_block_size: u64,
    /// Minimum size of a region. Whenever no free block can serve a request, a new region of at least this size is reserved.
    pub min_region_size: u64,
    /// Upper bound on the total size of all regions. `None` means unlimited.
    pub max_total_size: Option<u64>,
    /// Minimum size of [`ScratchAllocator`](crate::ScratchAllocator) chunks created by the resource pool.
    pub scratch_chunk_size: u64,
    /// Number of scratch allocators the resource pool creates up front.
    pub scratch_preallocate: usize,
}

impl AllocatorSettings {
    /// Check the settings for consistency.
    /// # Errors
    /// * Fails if the alignment is not a power of two.
    /// * Fails if the minimum block size is zero, or larger than the minimum region size.
    /// * Fails if the minimum region size cannot be rounded up to the alignment.
    /// * Fails if the minimum region size exceeds the total size limit.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_alignment(self.alignment) {
            anyhow::bail!(Error::InvalidAlignment(self.alignment));
        }
        if self.min_block_size == 0 {
            anyhow::bail!(Error::InvalidSettings("minimum block size must be non-zero"));
        }
        if self.min_region_size < self.min_block_size {
            anyhow::bail!(Error::InvalidSettings("minimum region size must be at least the minimum block size"));
        }
        if self.min_region_size > u64::MAX - (self.alignment - 1) {
            anyhow::bail!(Error::InvalidSettings("minimum region size overflows when aligned"));
        }
        if self.max_total_size.is_some_and(|max| max < self.min_region_size) {
            anyhow::bail!(Error::InvalidSettings("total size limit is smaller than a single region"));
        }
        if self.scratch_chunk_size == 0 {
            anyhow::bail!(Error::InvalidSettings("scratch chunk size must be non-zero"));
        }
        Ok(())
    }
}

impl Default for AllocatorSettings {
    fn default() -> Self {
        Self {
            alignment: 16,
            min_block_size: 64,
            min_region_size: 1024 * 1024,
            max_total_size: None,
            scratch_chunk_size: 32768,
            scratch_preallocate: 0,
        }
    }
}

/// The allocator builder is a convenience struct to easily create [`AllocatorSettings`].
///
/// For information about each of the fields, see [`AllocatorSettings`]
/// # Example
/// ```
/// # use helios::prelude::*;
/// let settings = AllocatorBuilder::new()
///     .alignment(256u64)
///     .min_block_size(256u64)
///     .min_region_size(64 * 1024u64)
///     .max_total_size(16 * 1024 * 1024u64)
///     .build();
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Default)]
pub struct AllocatorBuilder {
    inner: AllocatorSettings,
}

impl AllocatorBuilder {
    /// Create a new allocator builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the alignment of every block.
    pub fn alignment(mut self, alignment: impl Into<u64>) -> Self {
        self.inner.alignment = alignment.into();
        self
    }

    /// Sets the smallest block size.
    pub fn min_block_size(mut self, size: impl Into<u64>) -> Self {
        self.inner.min_block_size = size.into();
        self
    }

    /// Sets the minimum size of newly reserved regions.
    pub fn min_region_size(mut self, size: impl Into<u64>) -> Self {
        self.inner.min_region_size = size.into();
        self
    }

    /// Limit the total size of all regions.
    pub fn max_total_size(mut self, size: impl Into<u64>) -> Self {
        self.inner.max_total_size = Some(size.into());
        self
    }

    /// Scratch allocator chunk size used by the resource pool.
    pub fn scratch_chunk_size(mut self, size: impl Into<u64>) -> Self {
        self.inner.scratch_chunk_size = size.into();
        self
    }

    /// Number of scratch allocators to create when the resource pool is created.
    pub fn scratch_preallocate(mut self, count: usize) -> Self {
        self.inner.scratch_preallocate = count;
        self
    }

    /// Build the resulting allocator settings.
    pub fn build(self) -> AllocatorSettings {
        self.inner
    }
}
