use std::collections::{BTreeMap, HashMap};

use helios::{BTree, LinkedList, SlotMap, UnorderedMap};

/// Small linear congruential generator so the randomized tests are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn btree_matches_std() {
    let mut rng = Lcg(7);
    let mut tree = BTree::<u64, u64, 8>::new();
    let mut reference = BTreeMap::new();
    for _ in 0..5000 {
        let key = rng.next() % 512;
        if rng.next() % 4 == 0 {
            assert_eq!(tree.remove(&key), reference.remove(&key));
        } else {
            assert_eq!(tree.insert(key, key * 3), reference.insert(key, key * 3));
        }
    }
    assert_eq!(tree.len(), reference.len());
    assert!(tree.iter().map(|(k, v)| (*k, *v)).eq(reference.iter().map(|(k, v)| (*k, *v))));
    assert_eq!(tree.iter().len(), reference.len());
}

#[test]
fn btree_range_queries() {
    let tree: BTree<u32, &str> = [(10, "a"), (20, "b"), (30, "c"), (40, "d")].into_iter().collect();

    assert_eq!(tree.find_smallest_key_greater_than_equals(&20), Some((&20, &"b")));
    assert_eq!(tree.find_smallest_key_greater_than_equals(&21), Some((&30, &"c")));
    assert_eq!(tree.find_smallest_key_greater_than_equals(&0), Some((&10, &"a")));
    assert_eq!(tree.find_smallest_key_greater_than_equals(&41), None);

    assert_eq!(tree.find_largest_key_less_than_equals(&20), Some((&20, &"b")));
    assert_eq!(tree.find_largest_key_less_than_equals(&29), Some((&20, &"b")));
    assert_eq!(tree.find_largest_key_less_than_equals(&100), Some((&40, &"d")));
    assert_eq!(tree.find_largest_key_less_than_equals(&9), None);

    let empty = BTree::<u32, ()>::new();
    assert_eq!(empty.find_smallest_key_greater_than_equals(&0), None);
    assert_eq!(empty.find_largest_key_less_than_equals(&0), None);
    assert_eq!(empty.first(), None);
    assert_eq!(empty.height(), 0);
}

#[test]
fn btree_range_queries_on_deep_tree() {
    // Even keys only, so every odd probe falls between two entries.
    let tree: BTree<u32, u32, 4> = (0..1000).map(|i| (i * 2, i)).collect();
    assert!(tree.height() > 3);
    for probe in 0..1998u32 {
        let expected_ge = probe.div_ceil(2) * 2;
        assert_eq!(tree.find_smallest_key_greater_than_equals(&probe).map(|(k, _)| *k), Some(expected_ge));
        let expected_le = probe / 2 * 2;
        assert_eq!(tree.find_largest_key_less_than_equals(&probe).map(|(k, _)| *k), Some(expected_le));
    }
    assert_eq!(tree.find_smallest_key_greater_than_equals(&1999), None);
}

#[test]
fn btree_order_statistics() {
    let tree: BTree<u32, u32, 4> = (0..500).map(|i| (i * 10, i)).collect();
    for i in 0..500u32 {
        assert_eq!(tree.nth(i as usize), Some((&(i * 10), &i)));
        assert_eq!(tree.rank(&(i * 10)), i as usize);
        assert_eq!(tree.rank(&(i * 10 + 5)), i as usize + 1);
    }
    assert_eq!(tree.nth(500), None);
    assert_eq!(tree.rank(&0), 0);
    assert_eq!(tree.rank(&100_000), 500);
    assert_eq!(tree.first(), Some((&0, &0)));
    assert_eq!(tree.last(), Some((&4990, &499)));
}

#[test]
fn btree_get_mut_and_clear() {
    let mut tree = BTree::<String, Vec<u32>>::new();
    tree.insert("mesh".to_owned(), vec![1]);
    tree.get_mut(&"mesh".to_owned()).unwrap().push(2);
    assert_eq!(tree.get(&"mesh".to_owned()), Some(&vec![1, 2]));
    assert!(tree.contains_key(&"mesh".to_owned()));
    assert!(!tree.contains_key(&"texture".to_owned()));
    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(tree.pop_first(), None);
    assert_eq!(tree.pop_last(), None);
}

#[test]
fn slot_map_keys_go_stale() {
    let mut map = SlotMap::new();
    let a = map.insert(1);
    let b = map.insert(2);
    assert_eq!(map.len(), 2);
    assert_eq!(map.remove(a), Some(1));
    assert_eq!(map.remove(a), None, "removing twice must be a no-op");

    let c = map.insert(3);
    assert_eq!(c.index(), a.index(), "the vacant slot is reused");
    assert_ne!(c.generation(), a.generation());
    assert_eq!(map.get(a), None);
    assert_eq!(map[c], 3);
    assert_eq!(map[b], 2);
    assert_eq!(map.capacity(), 2);

    let null = helios::SlotKey::null();
    assert!(null.is_null());
    assert_eq!(map.get(null), None);
}

#[test]
fn slot_map_retain_and_iter() {
    let mut map = SlotMap::new();
    let keys: Vec<_> = (0..10).map(|i| map.insert(i)).collect();
    map.retain(|_, value| *value % 2 == 0);
    assert_eq!(map.len(), 5);
    assert!(map.values().all(|value| value % 2 == 0));
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(map.contains_key(*key), i % 2 == 0);
    }
    for (_, value) in map.iter_mut() {
        *value *= 10;
    }
    assert_eq!(map.values().copied().collect::<Vec<_>>(), vec![0, 20, 40, 60, 80]);

    map.clear();
    assert!(map.is_empty());
    assert!(keys.iter().all(|key| !map.contains_key(*key)));
}

#[test]
fn slot_map_insert_with_key() {
    let mut map = SlotMap::new();
    let key = map.insert_with_key(|key| key);
    assert_eq!(map[key], key);
}

#[test]
fn linked_list_handles_stay_valid() {
    let mut list = LinkedList::new();
    let b = list.push_back("b");
    let a = list.push_front("a");
    let d = list.push_back("d");
    let c = list.insert_before(d, "c").unwrap();
    let e = list.insert_after(d, "e").unwrap();
    assert_eq!(list.iter().copied().collect::<Vec<_>>(), ["a", "b", "c", "d", "e"]);
    assert_eq!(list.iter().rev().copied().collect::<Vec<_>>(), ["e", "d", "c", "b", "a"]);
    assert_eq!(list.front(), Some(a));
    assert_eq!(list.back(), Some(e));

    assert_eq!(list.remove(c), Some("c"));
    assert_eq!(list.next(b), Some(d));
    assert_eq!(list.prev(d), Some(b));
    assert_eq!(list[d], "d");
    assert_eq!(list.remove(c), None, "stale handles are rejected");
    assert!(list.insert_after(c, "x").is_none());

    list[b] = "B";
    assert_eq!(list.get(b), Some(&"B"));
    assert_eq!(list.pop_front(), Some("a"));
    assert_eq!(list.pop_back(), Some("e"));
    assert_eq!(list.handles().map(|(handle, _)| handle).collect::<Vec<_>>(), vec![b, d]);
    assert_eq!(list.len(), 2);

    list.clear();
    assert!(list.is_empty());
    assert_eq!(list.front(), None);
    assert_eq!(list.pop_back(), None);
}

#[test]
fn linked_list_mixed_iteration() {
    let list: LinkedList<u32> = (0..6).collect();
    let mut iter = list.iter();
    assert_eq!(iter.len(), 6);
    assert_eq!(iter.next(), Some(&0));
    assert_eq!(iter.next_back(), Some(&5));
    assert_eq!(iter.next(), Some(&1));
    assert_eq!(iter.next_back(), Some(&4));
    assert_eq!(iter.len(), 2);
    assert_eq!(iter.collect::<Vec<_>>(), [&2, &3]);
}

#[test]
fn unordered_map_matches_std() {
    let mut rng = Lcg(11);
    let mut map = UnorderedMap::new();
    let mut reference = HashMap::new();
    for _ in 0..20_000 {
        let key = rng.next() % 2048;
        match rng.next() % 3 {
            0 => assert_eq!(map.remove(&key), reference.remove(&key)),
            _ => assert_eq!(map.insert(key, key + 1), reference.insert(key, key + 1)),
        }
    }
    assert_eq!(map.len(), reference.len());
    for (key, value) in &reference {
        assert_eq!(map.get(key), Some(value));
    }
    let mut keys: Vec<_> = map.keys().copied().collect();
    keys.sort_unstable();
    let mut expected: Vec<_> = reference.keys().copied().collect();
    expected.sort_unstable();
    assert_eq!(keys, expected);
    assert!(map.len() <= map.capacity());
}

#[test]
fn unordered_map_entry_helpers() {
    let mut map: UnorderedMap<&str, u32> = UnorderedMap::with_capacity(100);
    let capacity = map.capacity();
    assert!(capacity >= 100);
    for word in ["vertex", "index", "vertex", "uniform", "vertex"] {
        *map.get_or_insert_with(word, || 0) += 1;
    }
    assert_eq!(map[&"vertex"], 3);
    assert_eq!(map[&"index"], 1);
    assert_eq!(map.capacity(), capacity, "no growth below the reserved capacity");

    for value in map.values() {
        assert!(*value >= 1);
    }
    if let Some(value) = map.get_mut(&"uniform") {
        *value = 10;
    }
    assert_eq!(map.iter().map(|(_, v)| *v).sum::<u32>(), 14);
    map.clear();
    assert!(map.is_empty());
    assert_eq!(map.get(&"vertex"), None);
    assert_eq!(map.max_probe_distance(), 0);
}
