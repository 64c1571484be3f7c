use anyhow::Result;

use helios::pool::ResourcePool;
use helios::{AllocatorBuilder, AllocatorSettings, DefaultAllocator};

#[derive(Clone)]
pub struct Context {
    pub pool: ResourcePool<DefaultAllocator>,
    pub allocator: DefaultAllocator,
    pub settings: AllocatorSettings,
}

/// Installs the logger once per test binary. Run tests with `RUST_LOG=trace` to see allocator output.
pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

/// Small settings that make region boundaries easy to reason about in tests:
/// 16 byte alignment and blocks, 1 KiB regions.
pub fn small_settings() -> AllocatorSettings {
    AllocatorBuilder::new()
        .alignment(16u64)
        .min_block_size(16u64)
        .min_region_size(1024u64)
        .scratch_chunk_size(256u64)
        .build()
}

/// Creates a helios context ready for automated tests
pub fn make_context() -> Result<Context> {
    make_context_with_settings(small_settings())
}

pub fn make_context_with_settings(settings: AllocatorSettings) -> Result<Context> {
    init_logging();
    let (allocator, pool) = helios::initialize(&settings)?;
    Ok(Context {
        pool,
        allocator,
        settings,
    })
}
