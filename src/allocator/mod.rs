//! Contains all memory allocation and management functionality.
//!
//! Two allocators form the base of everything in this module:
//! - [`BlockAllocator`](block_allocator::BlockAllocator), a slab of fixed-size slots used for node storage.
//! - [`DynamicBlockAllocator`](dynamic_block_allocator::DynamicBlockAllocator), a best-fit allocator for variable
//!   sized ranges of one or more regions.
//!
//! On top of these, [`DefaultAllocator`](default_allocator::DefaultAllocator) shares a dynamic allocator between threads,
//! [`HostHeap`](heap::HostHeap) backs its regions with real memory, and
//! [`ScratchAllocator`](scratch_allocator::ScratchAllocator) provides linear allocation on top of any [`Allocator`](traits::Allocator).

pub mod block_allocator;
pub mod default_allocator;
pub mod dynamic_block_allocator;
pub mod heap;
pub mod scratch_allocator;
pub mod traits;
