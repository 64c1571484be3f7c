use helios::BlockAllocator;

#[test]
fn slots_are_recycled_before_growing() {
    let mut slab = BlockAllocator::<u64, 4>::new();
    let indices: Vec<_> = (0..4).map(|i| slab.allocate(i)).collect();
    assert_eq!(slab.block_count(), 1);
    assert_eq!(slab.capacity(), 4);

    assert_eq!(slab.release(indices[1]), Some(1));
    assert_eq!(slab.release(indices[1]), None, "double release is a no-op");
    let reused = slab.allocate(10);
    assert_eq!(reused, indices[1]);
    assert_eq!(slab.block_count(), 1);

    let grown = slab.allocate(11);
    assert_eq!(slab.block_count(), 2);
    assert_eq!(grown.as_usize(), 4);
    assert_eq!(slab.len(), 5);
}

#[test]
fn values_stay_in_place() {
    let mut slab = BlockAllocator::<[u8; 32], 2>::new();
    let first = slab.allocate([1; 32]);
    let address = slab.get(first).unwrap().as_ptr();
    // Growing by many blocks must not move existing values.
    for _ in 0..100 {
        slab.allocate([0; 32]);
    }
    assert_eq!(slab.get(first).unwrap().as_ptr(), address);
    assert_eq!(slab[first], [1; 32]);
}

#[test]
fn reserve_and_clear() {
    let mut slab = BlockAllocator::<String, 8>::default();
    slab.reserve_blocks(20);
    assert_eq!(slab.block_count(), 3);
    assert!(slab.is_empty());

    let a = slab.allocate("a".to_owned());
    let b = slab.allocate("b".to_owned());
    slab[b].push('!');
    assert_eq!(slab.get(b).map(String::as_str), Some("b!"));
    if let Some(value) = slab.get_mut(a) {
        value.push('?');
    }
    assert_eq!(slab.iter().map(|(_, value)| value.as_str()).collect::<Vec<_>>(), ["a?", "b!"]);
    // Already enough room, so no new block.
    slab.reserve_blocks(10);
    assert_eq!(slab.block_count(), 3);

    slab.clear();
    assert!(slab.is_empty());
    assert!(!slab.contains(a));
    assert_eq!(slab.capacity(), 0);
}
