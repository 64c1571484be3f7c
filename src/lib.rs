//! Memory allocators and allocator-backed containers.
//!
//! Helios provides the building blocks for managing memory that lives outside of the Rust heap, such as GPU memory
//! bound at an offset into a large allocation, as well as ordinary host memory. At its core are two allocators:
//! - A [`BlockAllocator`], which hands out fixed-size slots from a slab and recycles them through a free list.
//! - A [`DynamicBlockAllocator`], which serves variable-size requests from one or more regions with best-fit
//!   placement, splitting and coalescing.
//!
//! The dynamic allocator keeps its free blocks in an order-statistics [`BTree`], which is also available as a general
//! purpose ordered map. The other containers are a generational [`SlotMap`], a [`LinkedList`] with stable handles and an
//! open-addressing [`UnorderedMap`].
//!
//! To get started, the easiest way is to simply
//! ```
//! // Import all important types and traits
//! use helios::prelude::*;
//! // Or import them under a namespace.
//! use helios::prelude as hl;
//! ```
//!
//! # Example
//!
//! First, we will define an [`AllocatorSettings`] structure that describes how memory is carved up.
//! ```
//! use helios::prelude::*;
//!
//! let settings = AllocatorBuilder::new()
//!     .alignment(256u64)
//!     .min_block_size(256u64)
//!     .min_region_size(64 * 1024u64) // 64 KiB per region
//!     .max_total_size(16 * 1024 * 1024u64) // Never reserve more than 16 MiB in total
//!     .scratch_chunk_size(4 * 1024u64)
//!     .build();
//! ```
//! Now we are ready to initialize the library.
//! ```
//! # use helios::prelude::*;
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! # let settings = AllocatorSettings::default();
//! let (mut allocator, pool) = helios::initialize(&settings)?;
//! // The allocator can be cloned and shared between threads.
//! let mesh = allocator.allocate("mesh", 4096)?;
//! // Short-lived memory comes from pooled scratch allocators.
//! let mut scratch = pool.scratch()?;
//! let uniforms = scratch.allocate(256u64)?;
//! assert_ne!(uniforms.offset(), mesh.offset());
//! allocator.free(mesh)?;
//! # Ok(())
//! # }
//! ```
//! For further example code, check out the following modules
//! - [`allocator`] for the allocators and related utilities.
//! - [`containers`] for the allocator-backed containers.
//! - [`pool`] for object pooling.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;
#[macro_use]
extern crate static_assertions;

pub mod prelude;
pub use crate::prelude::*;

pub mod allocator;
pub mod containers;
pub mod core;
pub mod pool;
pub mod util;
