//! A fixed-size slab allocator.
//!
//! The [`BlockAllocator`] hands out storage for values of a single type. Storage is grown one block at a time, where a block
//! is a fixed array of `BLOCK_SIZE` slots. Blocks are never moved or freed before [`BlockAllocator::clear`] is called or
//! the allocator is dropped, so a reference obtained through [`BlockAllocator::get`] always points to the same memory for
//! as long as the slot is live.
//!
//! Released slots are chained into a free list and are reused before a new block is created.
//!
//! # Example
//! ```
//! # use helios::prelude::*;
//! let mut nodes = BlockAllocator::<u32, 16>::new();
//! let a = nodes.allocate(10);
//! let b = nodes.allocate(20);
//! assert_eq!(nodes.get(a), Some(&10));
//! assert_eq!(nodes.release(a), Some(10));
//! // The released slot is reused immediately.
//! let c = nodes.allocate(30);
//! assert_eq!(a, c);
//! assert_eq!(nodes.block_count(), 1);
//! # let _ = b;
//! ```

use std::ops::{Index, IndexMut};

/// Index of a slot inside a [`BlockAllocator`]. The index encodes both the block and the slot within that block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIndex(usize);

impl BlockIndex {
    /// The raw slot index. Slot `i` lives in block `i / BLOCK_SIZE`.
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    Vacant { next_free: Option<usize> },
}

/// Slab allocator for values of type `T`, growing in blocks of `BLOCK_SIZE` elements.
///
/// See also: [`BlockIndex`]
#[derive(Debug)]
pub struct BlockAllocator<T, const BLOCK_SIZE: usize = 64> {
    blocks: Vec<Box<[Slot<T>]>>,
    free_head: Option<usize>,
    len: usize,
}

impl<T, const BLOCK_SIZE: usize> BlockAllocator<T, BLOCK_SIZE> {
    const NON_EMPTY_BLOCKS: () = assert!(BLOCK_SIZE > 0, "BlockAllocator blocks must hold at least one element");

    /// Create an empty allocator. No memory is reserved until the first allocation.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_EMPTY_BLOCKS;
        Self {
            blocks: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Store `value` in a free slot, creating a new block if every slot is taken.
    pub fn allocate(&mut self, value: T) -> BlockIndex {
        let index = match self.free_head {
            Some(index) => index,
            None => {
                self.push_block();
                // A fresh block always refills the free list.
                self.blocks.len() * BLOCK_SIZE - BLOCK_SIZE
            }
        };

        let slot = self.slot_mut(index);
        let next_free = match slot {
            Slot::Vacant { next_free } => *next_free,
            Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
        };
        *slot = Slot::Occupied(value);
        self.free_head = next_free;
        self.len += 1;
        BlockIndex(index)
    }

    /// Release the value at `index`, returning it. Returns `None` if the slot is not live, which makes double releases harmless.
    pub fn release(&mut self, index: BlockIndex) -> Option<T> {
        let free_head = self.free_head;
        let slot = self.slot_mut_checked(index.0)?;
        if matches!(slot, Slot::Vacant { .. }) {
            return None;
        }
        let old = std::mem::replace(slot, Slot::Vacant { next_free: free_head });
        self.free_head = Some(index.0);
        self.len -= 1;
        match old {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => unreachable!(),
        }
    }

    /// Get a reference to the value at `index`, if the slot is live.
    pub fn get(&self, index: BlockIndex) -> Option<&T> {
        match self.blocks.get(index.0 / BLOCK_SIZE)?.get(index.0 % BLOCK_SIZE)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Get a mutable reference to the value at `index`, if the slot is live.
    pub fn get_mut(&mut self, index: BlockIndex) -> Option<&mut T> {
        match self.slot_mut_checked(index.0)? {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// Whether `index` refers to a live slot.
    pub fn contains(&self, index: BlockIndex) -> bool {
        self.get(index).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no values are live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of slots over all blocks.
    pub fn capacity(&self) -> usize {
        self.blocks.len() * BLOCK_SIZE
    }

    /// Number of blocks allocated so far.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Make sure at least `count` more values can be allocated without creating a new block.
    pub fn reserve_blocks(&mut self, count: usize) {
        let free = self.capacity() - self.len;
        if free >= count {
            return;
        }
        let missing = count - free;
        for _ in 0..missing.div_ceil(BLOCK_SIZE) {
            self.push_block();
        }
    }

    /// Drop every value and release all blocks.
    pub fn clear(&mut self) {
        #[cfg(feature = "log-allocations")]
        trace!("Releasing {} slab blocks of {} elements", self.blocks.len(), BLOCK_SIZE);
        self.blocks.clear();
        self.free_head = None;
        self.len = 0;
    }

    /// Iterate over all live values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (BlockIndex, &T)> + '_ {
        self.blocks
            .iter()
            .flat_map(|block| block.iter())
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied(value) => Some((BlockIndex(index), value)),
                Slot::Vacant { .. } => None,
            })
    }

    fn push_block(&mut self) {
        let base = self.blocks.len() * BLOCK_SIZE;
        // Chain the new slots in ascending order in front of the existing free list.
        let free_head = self.free_head;
        let block: Box<[Slot<T>]> = (0..BLOCK_SIZE)
            .map(|i| Slot::Vacant {
                next_free: if i + 1 < BLOCK_SIZE { Some(base + i + 1) } else { free_head },
            })
            .collect();
        self.blocks.push(block);
        self.free_head = Some(base);
        #[cfg(feature = "log-allocations")]
        trace!("Created slab block #{} ({} elements of {} bytes)", self.blocks.len() - 1, BLOCK_SIZE, std::mem::size_of::<T>());
    }

    fn slot_mut(&mut self, index: usize) -> &mut Slot<T> {
        &mut self.blocks[index / BLOCK_SIZE][index % BLOCK_SIZE]
    }

    fn slot_mut_checked(&mut self, index: usize) -> Option<&mut Slot<T>> {
        self.blocks.get_mut(index / BLOCK_SIZE)?.get_mut(index % BLOCK_SIZE)
    }
}

impl<T, const BLOCK_SIZE: usize> Default for BlockAllocator<T, BLOCK_SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const BLOCK_SIZE: usize> Index<BlockIndex> for BlockAllocator<T, BLOCK_SIZE> {
    type Output = T;

    fn index(&self, index: BlockIndex) -> &Self::Output {
        self.get(index).unwrap_or_else(|| panic!("slot {} is not live", index.0))
    }
}

impl<T, const BLOCK_SIZE: usize> IndexMut<BlockIndex> for BlockAllocator<T, BLOCK_SIZE> {
    fn index_mut(&mut self, index: BlockIndex) -> &mut Self::Output {
        self.get_mut(index).unwrap_or_else(|| panic!("slot {} is not live", index.0))
    }
}
