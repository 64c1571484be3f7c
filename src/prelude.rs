pub use crate::core::app_info::*;
pub use crate::core::error::Error;
pub use crate::core::init::{initialize, initialize_with_allocator, Helios};

pub use crate::allocator::traits::*;
pub use crate::allocator::block_allocator::{BlockAllocator, BlockIndex};
pub use crate::allocator::default_allocator;
pub use crate::allocator::default_allocator::DefaultAllocator;
pub use crate::allocator::dynamic_block_allocator::{AllocatorStats, BlockInfo, DynamicAllocation, DynamicBlockAllocator, RegionId};
pub use crate::allocator::heap::{HeapBlock, HostHeap};
pub use crate::allocator::scratch_allocator::{ScratchAllocator, ScratchView};

pub use crate::containers::btree::BTree;
pub use crate::containers::linked_list::{LinkedList, ListHandle};
pub use crate::containers::slot_map::{SlotKey, SlotMap};
pub use crate::containers::unordered_map::UnorderedMap;

pub use crate::pool::{Pool, Poolable, Pooled, ResourcePool};
