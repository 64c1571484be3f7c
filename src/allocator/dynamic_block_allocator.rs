//! A variable-size, best-fit block allocator.
//!
//! The [`DynamicBlockAllocator`] manages one or more regions, which are contiguous address ranges. It does not own any
//! memory itself: allocations are described by a region and an offset into that region. This makes it usable for any
//! kind of memory, such as host memory (see [`HostHeap`](crate::HostHeap)) or device memory that is bound at an offset.
//!
//! Every region is partitioned into blocks that are kept in an address ordered [`LinkedList`]. Free blocks are
//! additionally indexed by size in a [`BTree`], so the smallest free block that can serve a request is found with a
//! single [`BTree::find_smallest_key_greater_than_equals`] query.
//!
//! On allocation, the chosen block is split if the remainder is at least the minimum block size. On release, the block
//! is merged with its free neighbours inside the same region, so two adjacent free blocks never exist.
//!
//! # Example
//! ```
//! # use helios::prelude::*;
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! let settings = AllocatorBuilder::new()
//!     .alignment(16u64)
//!     .min_block_size(16u64)
//!     .min_region_size(1024u64)
//!     .build();
//! let mut allocator = DynamicBlockAllocator::new(&settings)?;
//! let a = allocator.allocate(100)?;
//! let b = allocator.allocate(200)?;
//! assert_eq!(a.offset(), 0);
//! assert_eq!(b.offset(), 112);
//! allocator.release(a)?;
//! allocator.release(b)?;
//! // Everything coalesced back into a single free block.
//! assert_eq!(allocator.stats().free_blocks, 1);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;

use crate::containers::btree::BTree;
use crate::containers::linked_list::{LinkedList, ListHandle};
use crate::util::align::align;
use crate::{AllocatorSettings, Error};

static NEXT_ALLOCATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a region of a [`DynamicBlockAllocator`]. Ids of regions dropped by
/// [`DynamicBlockAllocator::shrink()`] may be reused for new regions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(u32);

impl RegionId {
    /// Index of this region, suitable for indexing a per-region table.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Snapshot of a single block, as reported by [`DynamicBlockAllocator::blocks()`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Region this block lives in.
    pub region: RegionId,
    /// Offset of the block inside its region, in bytes.
    pub offset: u64,
    /// Size of the block in bytes.
    pub size: u64,
    /// Whether the block is free.
    pub free: bool,
}

#[derive(Debug, Copy, Clone)]
struct Block {
    region: RegionId,
    offset: u64,
    size: u64,
    // Zero while the block is free.
    allocation_id: u64,
}

impl Block {
    fn is_free(&self) -> bool {
        self.allocation_id == 0
    }
}

/// A live allocation from a [`DynamicBlockAllocator`]. Give it back with [`DynamicBlockAllocator::release()`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DynamicAllocation {
    allocator: u64,
    handle: ListHandle,
    id: u64,
    region: RegionId,
    offset: u64,
    size: u64,
}

impl DynamicAllocation {
    /// Region the allocation lives in.
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Offset of the allocation inside its region, in bytes. Always a multiple of the allocator alignment.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size of the underlying block. This is at least the requested size.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Usage statistics of a [`DynamicBlockAllocator`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Number of regions.
    pub regions: usize,
    /// Total size of all regions.
    pub total_size: u64,
    /// Bytes in used blocks.
    pub used_size: u64,
    /// Bytes in free blocks.
    pub free_size: u64,
    /// Number of used blocks.
    pub used_blocks: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Size of the largest free block. A request up to this size can be served without reserving a new region.
    pub largest_free_block: u64,
}

/// Best-fit block allocator with splitting and coalescing.
///
/// See also: [`AllocatorSettings`], [`DynamicAllocation`], [`HostHeap`](crate::HostHeap)
#[derive(Debug)]
pub struct DynamicBlockAllocator {
    // Unique per instance, so allocations from another allocator are never mistaken for our own.
    id: u64,
    settings: AllocatorSettings,
    blocks: LinkedList<Block>,
    // Keyed by (size, handle) so equal sizes stay distinct. Ties are broken by handle order.
    free_blocks: BTree<(u64, ListHandle), ()>,
    // Indexed by `RegionId`, `None` for dropped regions.
    regions: Vec<Option<u64>>,
    total_size: u64,
    used_size: u64,
    next_allocation_id: u64,
}

impl DynamicBlockAllocator {
    /// Create a new allocator. No region is reserved until the first allocation.
    /// # Errors
    /// * Fails if the settings are invalid, see [`AllocatorSettings::validate()`]
    pub fn new(settings: &AllocatorSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            id: NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed),
            settings: settings.clone(),
            blocks: LinkedList::new(),
            free_blocks: BTree::new(),
            regions: Vec::new(),
            total_size: 0,
            used_size: 0,
            next_allocation_id: 1,
        })
    }

    /// The settings this allocator was created with.
    pub fn settings(&self) -> &AllocatorSettings {
        &self.settings
    }

    /// Allocate a block of at least `size` bytes. The block is taken from the smallest free block that fits. If no free
    /// block fits, a new region is reserved.
    /// # Errors
    /// * Fails if `size` is zero.
    /// * Fails if a new region is needed and reserving it would exceed [`AllocatorSettings::max_total_size`].
    pub fn allocate(&mut self, size: u64) -> Result<DynamicAllocation> {
        if size == 0 {
            anyhow::bail!(Error::ZeroSizedAllocation);
        }
        let needed = self.block_size_for(size)?;

        let handle = match self.find_free_block(needed) {
            Some(handle) => handle,
            None => self.grow(needed)?,
        };

        let block = self.blocks[handle];
        self.free_blocks.remove(&(block.size, handle));

        let remainder = block.size - needed;
        let size = if remainder >= self.settings.min_block_size {
            let rest = Block {
                region: block.region,
                offset: block.offset + needed,
                size: remainder,
                allocation_id: 0,
            };
            let rest = self
                .blocks
                .insert_after(handle, rest)
                .ok_or(Error::Uncategorized("free block vanished from the block list"))?;
            self.free_blocks.insert((remainder, rest), ());
            needed
        } else {
            block.size
        };

        let id = self.next_allocation_id;
        self.next_allocation_id += 1;
        let block = &mut self.blocks[handle];
        block.size = size;
        block.allocation_id = id;
        self.used_size += size;

        Ok(DynamicAllocation {
            allocator: self.id,
            handle,
            id,
            region: block.region,
            offset: block.offset,
            size,
        })
    }

    /// Release an allocation, merging the freed block with free neighbours in the same region.
    /// # Errors
    /// * Fails if the allocation is not live in this allocator. This catches double releases.
    pub fn release(&mut self, allocation: DynamicAllocation) -> Result<()> {
        if !self.is_live(&allocation) {
            anyhow::bail!(Error::InvalidRelease);
        }

        let mut handle = allocation.handle;
        let mut merged = Block {
            allocation_id: 0,
            ..self.blocks[handle]
        };
        self.used_size -= merged.size;

        if let Some(next) = self.blocks.next(handle) {
            let next_block = self.blocks[next];
            if next_block.is_free() && next_block.region == merged.region {
                self.free_blocks.remove(&(next_block.size, next));
                self.blocks.remove(next);
                merged.size += next_block.size;
            }
        }

        if let Some(prev) = self.blocks.prev(handle) {
            let prev_block = self.blocks[prev];
            if prev_block.is_free() && prev_block.region == merged.region {
                self.free_blocks.remove(&(prev_block.size, prev));
                self.blocks.remove(handle);
                merged.offset = prev_block.offset;
                merged.size += prev_block.size;
                handle = prev;
            }
        }

        self.blocks[handle] = merged;
        self.free_blocks.insert((merged.size, handle), ());
        Ok(())
    }

    /// Whether `allocation` is currently live in this allocator. Allocations made by a different allocator are never live.
    pub fn is_live(&self, allocation: &DynamicAllocation) -> bool {
        allocation.allocator == self.id
            && self.blocks.get(allocation.handle).is_some_and(|block| {
                block.allocation_id == allocation.id
                    && block.region == allocation.region
                    && block.offset == allocation.offset
                    && block.size == allocation.size
            })
    }

    /// Drop every region that is completely free. Returns the dropped regions together with their sizes, so the owner
    /// of the backing memory can release it.
    pub fn shrink(&mut self) -> Vec<(RegionId, u64)> {
        let empty: Vec<(u64, ListHandle)> = self
            .free_blocks
            .keys()
            .filter(|(size, handle)| {
                let block = &self.blocks[*handle];
                block.offset == 0 && self.regions[block.region.index()] == Some(*size)
            })
            .copied()
            .collect();

        let mut dropped = Vec::with_capacity(empty.len());
        for key @ (size, handle) in empty {
            self.free_blocks.remove(&key);
            if let Some(block) = self.blocks.remove(handle) {
                self.regions[block.region.index()] = None;
                self.total_size -= size;
                #[cfg(feature = "log-allocations")]
                trace!("Dropping region {:?} (size = {} bytes)", block.region, size);
                dropped.push((block.region, size));
            }
        }
        dropped
    }

    /// Current usage statistics.
    pub fn stats(&self) -> AllocatorStats {
        let free_blocks = self.free_blocks.len();
        AllocatorStats {
            regions: self.regions.iter().flatten().count(),
            total_size: self.total_size,
            used_size: self.used_size,
            free_size: self.total_size - self.used_size,
            used_blocks: self.blocks.len() - free_blocks,
            free_blocks,
            largest_free_block: self.free_blocks.last().map_or(0, |(&(size, _), _)| size),
        }
    }

    /// Size of a region, or `None` if the region does not exist.
    pub fn region_size(&self, region: RegionId) -> Option<u64> {
        self.regions.get(region.index()).copied().flatten()
    }

    /// Iterate over all live regions and their sizes.
    pub fn regions(&self) -> impl Iterator<Item = (RegionId, u64)> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter_map(|(index, &size)| size.map(|size| (RegionId(index as u32), size)))
    }

    /// Iterate over every block in address order, grouped by region.
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.blocks.iter().map(|block| BlockInfo {
            region: block.region,
            offset: block.offset,
            size: block.size,
            free: block.is_free(),
        })
    }

    /// Block size used to serve a request of `size` bytes.
    fn block_size_for(&self, size: u64) -> Result<u64> {
        let alignment = self.settings.alignment;
        let size = size.max(self.settings.min_block_size);
        if size > u64::MAX - alignment {
            anyhow::bail!(Error::OutOfMemory {
                requested: size,
                available: self.available_size(),
            });
        }
        Ok(align(size, alignment))
    }

    /// Minimum region size rounded up to the alignment. [`AllocatorSettings::validate()`] rules out overflow here.
    fn min_region_size(&self) -> u64 {
        align(self.settings.min_region_size, self.settings.alignment)
    }

    fn available_size(&self) -> u64 {
        self.settings
            .max_total_size
            .map_or(u64::MAX - self.total_size, |max| max.saturating_sub(self.total_size))
    }

    fn find_free_block(&self, size: u64) -> Option<ListHandle> {
        self.free_blocks
            .find_smallest_key_greater_than_equals(&(size, ListHandle::null()))
            .map(|(&(_, handle), _)| handle)
    }

    /// Reserve a new region that can hold at least `needed` bytes and return its single free block.
    fn grow(&mut self, needed: u64) -> Result<ListHandle> {
        let preferred = needed.max(self.min_region_size());
        let available = self.available_size();
        let size = if preferred <= available {
            preferred
        } else if needed <= available {
            // Close to the limit, only reserve what this request needs.
            needed
        } else {
            anyhow::bail!(Error::OutOfMemory {
                requested: needed,
                available,
            });
        };

        let region = match self.regions.iter().position(Option::is_none) {
            Some(index) => {
                self.regions[index] = Some(size);
                RegionId(index as u32)
            }
            None => {
                let index = u32::try_from(self.regions.len()).map_err(|_| Error::Uncategorized("too many regions"))?;
                self.regions.push(Some(size));
                RegionId(index)
            }
        };

        let handle = self.blocks.push_back(Block {
            region,
            offset: 0,
            size,
            allocation_id: 0,
        });
        self.free_blocks.insert((size, handle), ());
        self.total_size += size;
        #[cfg(feature = "log-allocations")]
        trace!("Created region {:?} (size = {} bytes)", region, size);
        Ok(handle)
    }
}
