//! Exposes methods to make initialization of the library easier without losing flexibility.

use anyhow::Result;

use crate::pool::ResourcePool;
use crate::{Allocator, AllocatorSettings, DefaultAllocator};

/// Struct that contains all common Helios resources to be used at initialization
pub type Helios<A = DefaultAllocator> = (A, ResourcePool<A>);

/// Initialize the context with the default allocator
pub fn initialize(settings: &AllocatorSettings) -> Result<Helios<DefaultAllocator>> {
    initialize_with_allocator(settings, DefaultAllocator::new)
}

/// Initialize the context with a custom allocator
pub fn initialize_with_allocator<A: Allocator + 'static, F: FnOnce(&AllocatorSettings) -> Result<A>>(
    settings: &AllocatorSettings,
    make_alloc: F,
) -> Result<Helios<A>> {
    settings.validate()?;
    let allocator = make_alloc(settings)?;
    let pool = ResourcePool::new(allocator.clone(), settings)?;
    info!(
        "Initialized helios (alignment = {}, min region size = {} bytes, scratch chunk size = {} bytes)",
        settings.alignment, settings.min_region_size, settings.scratch_chunk_size
    );
    Ok((allocator, pool))
}
