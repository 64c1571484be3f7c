use std::collections::HashMap;

use anyhow::Result;

use helios::{Allocator, AllocatorBuilder, DynamicAllocation, DynamicBlockAllocator, Error};

mod framework;

/// Checks the structural invariants of the allocator: blocks tile every region exactly, no two free blocks are
/// adjacent in the same region, and the statistics agree with the block list.
fn check_invariants(allocator: &DynamicBlockAllocator) {
    let regions: HashMap<_, _> = allocator.regions().collect();
    let mut covered: HashMap<_, u64> = HashMap::new();
    let mut previous: Option<helios::BlockInfo> = None;
    let mut used = 0;
    for block in allocator.blocks() {
        assert_eq!(block.offset % allocator.settings().alignment, 0, "block offsets must be aligned");
        assert_eq!(block.size % allocator.settings().alignment, 0, "block sizes must be aligned");
        let end = covered.entry(block.region).or_insert(0);
        assert_eq!(*end, block.offset, "blocks must be contiguous within a region");
        *end += block.size;
        if let Some(previous) = previous {
            if previous.region == block.region {
                assert!(!(previous.free && block.free), "adjacent free blocks must be merged");
            }
        }
        if !block.free {
            used += block.size;
        }
        previous = Some(block);
    }
    for (region, size) in &regions {
        assert_eq!(covered.get(region), Some(size), "blocks must cover the whole region");
    }
    let stats = allocator.stats();
    assert_eq!(stats.regions, regions.len());
    assert_eq!(stats.used_size, used);
    assert_eq!(stats.used_size + stats.free_size, stats.total_size);
    assert_eq!(stats.total_size, regions.values().sum::<u64>());
}

fn is_error(err: &anyhow::Error, check: impl Fn(&Error) -> bool) -> bool {
    err.downcast_ref::<Error>().is_some_and(check)
}

#[test]
pub fn allocations_are_aligned_and_rounded() -> Result<()> {
    let settings = AllocatorBuilder::new()
        .alignment(16u64)
        .min_block_size(64u64)
        .min_region_size(1024u64)
        .build();
    let mut allocator = DynamicBlockAllocator::new(&settings)?;
    let small = allocator.allocate(1)?;
    assert_eq!(small.size(), 64, "requests below the minimum block size are rounded up");
    let odd = allocator.allocate(100)?;
    assert_eq!(odd.offset(), 64);
    assert_eq!(odd.size(), 112);
    check_invariants(&allocator);
    Ok(())
}

#[test]
pub fn zero_sized_allocation_fails() -> Result<()> {
    let mut allocator = DynamicBlockAllocator::new(&framework::small_settings())?;
    let err = allocator.allocate(0).unwrap_err();
    assert!(is_error(&err, |err| matches!(err, Error::ZeroSizedAllocation)));
    assert_eq!(allocator.stats().regions, 0, "a failed request must not reserve a region");
    Ok(())
}

#[test]
pub fn best_fit_picks_smallest_free_block() -> Result<()> {
    let mut allocator = DynamicBlockAllocator::new(&framework::small_settings())?;
    let a = allocator.allocate(100)?;
    let b = allocator.allocate(200)?;
    let c = allocator.allocate(50)?;
    let d = allocator.allocate(300)?;
    assert_eq!([a.offset(), b.offset(), c.offset(), d.offset()], [0, 112, 320, 384]);

    // Leaves a 208 byte hole at 112 and a 640 byte tail at 384.
    allocator.release(b)?;
    allocator.release(d)?;
    check_invariants(&allocator);
    assert_eq!(allocator.stats().largest_free_block, 640);

    let e = allocator.allocate(150)?;
    assert_eq!(e.offset(), 112, "the 208 byte hole is the best fit");
    // The hole was split, the remaining 48 bytes are an exact fit for the next request.
    let f = allocator.allocate(40)?;
    assert_eq!(f.offset(), 272);
    assert_eq!(f.size(), 48);
    check_invariants(&allocator);

    for allocation in [a, c, e, f] {
        allocator.release(allocation)?;
    }
    check_invariants(&allocator);
    Ok(())
}

#[test]
pub fn small_remainders_are_not_split() -> Result<()> {
    let settings = AllocatorBuilder::new()
        .alignment(16u64)
        .min_block_size(64u64)
        .min_region_size(1024u64)
        .build();
    let mut allocator = DynamicBlockAllocator::new(&settings)?;
    let allocation = allocator.allocate(1000)?;
    assert_eq!(allocation.size(), 1024, "a 16 byte remainder is below the minimum block size");
    assert_eq!(allocator.stats().free_blocks, 0);
    allocator.release(allocation)?;
    check_invariants(&allocator);
    Ok(())
}

#[test]
pub fn release_coalesces_neighbours() -> Result<()> {
    let mut allocator = DynamicBlockAllocator::new(&framework::small_settings())?;
    let allocations = (0..3).map(|_| allocator.allocate(100)).collect::<Result<Vec<_>>>()?;
    let [first, middle, last]: [DynamicAllocation; 3] = allocations.try_into().unwrap();

    allocator.release(middle)?;
    assert_eq!(allocator.stats().free_blocks, 2);
    // Merges with the free block after it.
    allocator.release(first)?;
    assert_eq!(allocator.stats().free_blocks, 2);
    check_invariants(&allocator);
    // Merges with both neighbours.
    allocator.release(last)?;
    let stats = allocator.stats();
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.largest_free_block, 1024);
    assert_eq!(stats.used_size, 0);
    check_invariants(&allocator);
    Ok(())
}

#[test]
pub fn double_release_is_detected() -> Result<()> {
    let mut allocator = DynamicBlockAllocator::new(&framework::small_settings())?;
    let allocation = allocator.allocate(64)?;
    let copy = allocation.clone();
    allocator.release(allocation)?;
    let err = allocator.release(copy.clone()).unwrap_err();
    assert!(is_error(&err, |err| matches!(err, Error::InvalidRelease)));

    // The same block handed out again must not be releasable through the old allocation.
    let reused = allocator.allocate(64)?;
    assert_eq!(reused.offset(), copy.offset());
    assert!(!allocator.is_live(&copy));
    assert!(allocator.release(copy).is_err());
    assert!(allocator.is_live(&reused));
    allocator.release(reused)?;
    check_invariants(&allocator);
    Ok(())
}

#[test]
pub fn grows_with_new_regions() -> Result<()> {
    let mut allocator = DynamicBlockAllocator::new(&framework::small_settings())?;
    let a = allocator.allocate(1024)?;
    let b = allocator.allocate(512)?;
    assert_ne!(a.region(), b.region());
    // Requests larger than the minimum region size get a region of their own size.
    let large = allocator.allocate(2000)?;
    assert_eq!(allocator.region_size(large.region()), Some(2000));
    assert_eq!(allocator.stats().regions, 3);
    check_invariants(&allocator);
    Ok(())
}

#[test]
pub fn blocks_never_merge_across_regions() -> Result<()> {
    let mut allocator = DynamicBlockAllocator::new(&framework::small_settings())?;
    let a = allocator.allocate(1024)?;
    let b = allocator.allocate(1024)?;
    allocator.release(a)?;
    allocator.release(b)?;
    let stats = allocator.stats();
    assert_eq!(stats.free_blocks, 2);
    assert_eq!(stats.largest_free_block, 1024);
    check_invariants(&allocator);
    Ok(())
}

#[test]
pub fn total_size_limit() -> Result<()> {
    let settings = AllocatorBuilder::new()
        .alignment(16u64)
        .min_block_size(16u64)
        .min_region_size(1024u64)
        .max_total_size(2048u64)
        .build();
    let mut allocator = DynamicBlockAllocator::new(&settings)?;
    let too_large = allocator.allocate(4096).unwrap_err();
    assert!(is_error(&too_large, |err| matches!(err, Error::OutOfMemory { .. })));

    let _a = allocator.allocate(1024)?;
    let _b = allocator.allocate(1024)?;
    let err = allocator.allocate(16).unwrap_err();
    assert!(is_error(&err, |err| matches!(err, Error::OutOfMemory { requested: 16, available: 0 })));
    check_invariants(&allocator);
    Ok(())
}

#[test]
pub fn region_shrinks_near_the_limit() -> Result<()> {
    let settings = AllocatorBuilder::new()
        .alignment(16u64)
        .min_block_size(16u64)
        .min_region_size(1024u64)
        .max_total_size(1536u64)
        .build();
    let mut allocator = DynamicBlockAllocator::new(&settings)?;
    let _a = allocator.allocate(1024)?;
    // Only 512 bytes are left, so the second region is exactly as large as the request.
    let b = allocator.allocate(256)?;
    assert_eq!(allocator.region_size(b.region()), Some(256));
    assert_eq!(allocator.stats().total_size, 1280);
    Ok(())
}

#[test]
pub fn shrink_drops_empty_regions() -> Result<()> {
    let mut allocator = DynamicBlockAllocator::new(&framework::small_settings())?;
    let a = allocator.allocate(1024)?;
    let b = allocator.allocate(100)?;
    let region_a = a.region();
    allocator.release(a)?;

    let dropped = allocator.shrink();
    assert_eq!(dropped, vec![(region_a, 1024)]);
    assert_eq!(allocator.region_size(region_a), None);
    assert_eq!(allocator.stats().total_size, 1024);
    check_invariants(&allocator);

    // The dropped region id is reused by the next region.
    let c = allocator.allocate(1024)?;
    assert_eq!(c.region(), region_a);
    assert!(allocator.is_live(&b));
    // Regions with live blocks are kept.
    assert!(allocator.shrink().is_empty());
    Ok(())
}

#[test]
pub fn random_workload_keeps_invariants() -> Result<()> {
    framework::init_logging();
    let mut allocator = DynamicBlockAllocator::new(&framework::small_settings())?;
    let mut live = Vec::new();
    // Small linear congruential generator, good enough to shuffle the workload deterministically.
    let mut state = 0x2545_f491_u64;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        state >> 33
    };

    for step in 0..2000 {
        if live.is_empty() || next() % 3 != 0 {
            let size = next() % 700 + 1;
            let allocation = allocator.allocate(size)?;
            assert!(allocation.size() >= size);
            live.push(allocation);
        } else {
            let index = (next() as usize) % live.len();
            allocator.release(live.swap_remove(index))?;
        }
        if step % 100 == 0 {
            check_invariants(&allocator);
        }
    }

    for allocation in live.drain(..) {
        allocator.release(allocation)?;
    }
    check_invariants(&allocator);
    let stats = allocator.stats();
    assert_eq!(stats.used_size, 0);
    assert_eq!(stats.free_blocks, stats.regions);
    allocator.shrink();
    assert_eq!(allocator.stats().total_size, 0);
    Ok(())
}

#[test]
pub fn default_allocator_is_shared() -> Result<()> {
    let context = framework::make_context()?;
    std::thread::scope(|scope| -> Result<()> {
        let handles = (0..4u64)
            .map(|thread| {
                let mut allocator = context.allocator.clone();
                scope.spawn(move || -> Result<()> {
                    for i in 1..=100 {
                        let allocation = allocator.allocate("thread_data", thread * 100 + i)?;
                        allocator.free(allocation)?;
                    }
                    Ok(())
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().expect("allocator thread panicked")?;
        }
        Ok(())
    })?;
    let stats = context.allocator.stats()?;
    assert_eq!(stats.used_size, 0);
    assert!(stats.total_size > 0);

    let mut allocator = context.allocator.clone();
    let allocation = allocator.allocate("allocation", 1024)?;
    // Also try explicitly freeing the allocation twice
    allocator.free(allocation.clone())?;
    assert!(allocator.free(allocation).is_err());
    Ok(())
}

#[test]
pub fn invalid_settings_are_rejected() {
    let bad_alignment = AllocatorBuilder::new().alignment(24u64).build();
    assert!(DynamicBlockAllocator::new(&bad_alignment).is_err());
    let zero_block = AllocatorBuilder::new().min_block_size(0u64).build();
    assert!(DynamicBlockAllocator::new(&zero_block).is_err());
    let small_limit = AllocatorBuilder::new().min_region_size(4096u64).max_total_size(1024u64).build();
    assert!(DynamicBlockAllocator::new(&small_limit).is_err());
    // Rounding this up to the alignment would overflow.
    let huge_region = AllocatorBuilder::new().alignment(256u64).min_region_size(u64::MAX - 16).build();
    assert!(DynamicBlockAllocator::new(&huge_region).is_err());
    let largest_region = AllocatorBuilder::new().alignment(256u64).min_region_size(u64::MAX - 255).build();
    assert!(DynamicBlockAllocator::new(&largest_region).is_ok());
    assert!(helios::initialize(&bad_alignment).is_err());
}

#[test]
pub fn foreign_release_is_rejected() -> Result<()> {
    let mut allocator = DynamicBlockAllocator::new(&framework::small_settings())?;
    let mut other = DynamicBlockAllocator::new(&framework::small_settings())?;
    // Same settings and the same request order produce allocations that only differ by their owner.
    let ours = allocator.allocate(64)?;
    let theirs = other.allocate(64)?;
    assert_eq!((ours.region(), ours.offset(), ours.size()), (theirs.region(), theirs.offset(), theirs.size()));
    assert_ne!(ours, theirs);

    assert!(!allocator.is_live(&theirs));
    let err = allocator.release(theirs.clone()).unwrap_err();
    assert!(is_error(&err, |err| matches!(err, Error::InvalidRelease)));
    assert!(allocator.is_live(&ours), "a rejected release must leave our own block alone");
    assert_eq!(allocator.stats().used_size, 64);

    allocator.release(ours)?;
    other.release(theirs)?;
    check_invariants(&allocator);
    check_invariants(&other);
    Ok(())
}
