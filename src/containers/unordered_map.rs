//! Open addressing hash map with Robin Hood hashing.
//!
//! Entries live directly in a power-of-two sized bucket array and are found by linear probing. On insertion, an entry
//! that is further from its home bucket than the resident entry takes over the bucket, and the resident continues
//! probing ("robbing the rich"). This keeps probe sequences short and uniform, and lets lookups stop as soon as they meet
//! an entry that is closer to home than the probe itself.
//!
//! Removal uses backward shifting instead of tombstones: every following entry that is not in its home bucket moves one
//! bucket back.
//!
//! # Example
//! ```
//! # use helios::prelude::*;
//! let mut map = UnorderedMap::new();
//! map.insert("albedo", 0);
//! map.insert("normal", 1);
//! assert_eq!(map.get(&"normal"), Some(&1));
//! assert_eq!(map.remove(&"albedo"), Some(0));
//! assert_eq!(map.len(), 1);
//! ```

use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::ops::Index;

const MIN_CAPACITY: usize = 8;

#[derive(Clone)]
struct Bucket<K, V> {
    hash: u64,
    key: K,
    value: V,
}

/// Hash map using open addressing with Robin Hood displacement. The maximum load factor is 7/8.
#[derive(Clone)]
pub struct UnorderedMap<K, V, S = RandomState> {
    buckets: Vec<Option<Bucket<K, V>>>,
    len: usize,
    hasher: S,
}

impl<K: Hash + Eq, V> UnorderedMap<K, V, RandomState> {
    /// Create an empty map. No memory is reserved until the first insertion.
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// Create an empty map that can hold `capacity` entries without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut map = Self::new();
        map.reserve(capacity);
        map
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> UnorderedMap<K, V, S> {
    /// Create an empty map using `hasher` to hash keys.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            buckets: Vec::new(),
            len: 0,
            hasher,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of entries the map can hold before it has to grow.
    pub fn capacity(&self) -> usize {
        Self::max_load(self.buckets.len())
    }

    /// Make room for at least `additional` more entries.
    pub fn reserve(&mut self, additional: usize) {
        let required = self.len + additional;
        if required <= self.capacity() {
            return;
        }
        let mut bucket_count = self.buckets.len().max(MIN_CAPACITY);
        while Self::max_load(bucket_count) < required {
            bucket_count *= 2;
        }
        self.resize(bucket_count);
    }

    /// Insert an entry, returning the previous value for this key if there was one.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hasher.hash_one(&key);
        if let Some(index) = self.find(hash, &key) {
            return self.buckets[index].as_mut().map(|bucket| std::mem::replace(&mut bucket.value, value));
        }
        self.reserve(1);
        self.place(Bucket {
            hash,
            key,
            value,
        });
        self.len += 1;
        None
    }

    /// Get the value for `key`, inserting the result of `f` first if the key is missing.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, f: F) -> &mut V {
        let hash = self.hasher.hash_one(&key);
        let index = match self.find(hash, &key) {
            Some(index) => index,
            None => {
                self.reserve(1);
                self.len += 1;
                self.place(Bucket {
                    hash,
                    key,
                    value: f(),
                })
            }
        };
        match self.buckets[index].as_mut() {
            Some(bucket) => &mut bucket.value,
            None => unreachable!("bucket was just located or filled"),
        }
    }

    /// Get the value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let index = self.find(self.hasher.hash_one(key), key)?;
        self.buckets[index].as_ref().map(|bucket| &bucket.value)
    }

    /// Get the value for `key` mutably.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.find(self.hasher.hash_one(key), key)?;
        self.buckets[index].as_mut().map(|bucket| &mut bucket.value)
    }

    /// Whether the map has an entry for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(self.hasher.hash_one(key), key).is_some()
    }

    /// Remove the entry for `key` and return its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let mut index = self.find(self.hasher.hash_one(key), key)?;
        let removed = self.buckets[index].take()?;
        self.len -= 1;

        // Shift the rest of the probe run back by one bucket.
        let mask = self.buckets.len() - 1;
        loop {
            let next = (index + 1) & mask;
            let displaced = match self.buckets[next].as_ref() {
                Some(bucket) => self.distance(bucket.hash, next) > 0,
                None => false,
            };
            if !displaced {
                break;
            }
            self.buckets[index] = self.buckets[next].take();
            index = next;
        }
        Some(removed.value)
    }

    /// Remove all entries, keeping the allocated buckets.
    pub fn clear(&mut self) {
        self.buckets.iter_mut().for_each(|bucket| *bucket = None);
        self.len = 0;
    }

    /// Iterate over all entries in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.buckets.iter().flatten().map(|bucket| (&bucket.key, &bucket.value))
    }

    /// Iterate mutably over all entries in bucket order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> + '_ {
        self.buckets.iter_mut().flatten().map(|bucket| (&bucket.key, &mut bucket.value))
    }

    /// Iterate over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterate over all values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Longest distance of any entry from its home bucket. Stays small as long as the hash function is reasonable.
    pub fn max_probe_distance(&self) -> usize {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(index, bucket)| bucket.as_ref().map(|bucket| self.distance(bucket.hash, index)))
            .max()
            .unwrap_or(0)
    }

    fn max_load(bucket_count: usize) -> usize {
        bucket_count / 8 * 7
    }

    fn home(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    /// How far the bucket at `index` is from the home bucket of `hash`.
    fn distance(&self, hash: u64, index: usize) -> usize {
        index.wrapping_sub(self.home(hash)) & (self.buckets.len() - 1)
    }

    fn find(&self, hash: u64, key: &K) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let mask = self.buckets.len() - 1;
        let mut index = self.home(hash);
        let mut distance = 0;
        loop {
            let bucket = self.buckets[index].as_ref()?;
            // A resident closer to home than we are means our key would have displaced it.
            if self.distance(bucket.hash, index) < distance {
                return None;
            }
            if bucket.hash == hash && bucket.key == *key {
                return Some(index);
            }
            index = (index + 1) & mask;
            distance += 1;
        }
    }

    /// Put a new entry into the table, displacing richer residents. Returns the bucket the new entry ended up in.
    /// The key must not be present and there must be at least one empty bucket.
    fn place(&mut self, bucket: Bucket<K, V>) -> usize {
        let mask = self.buckets.len() - 1;
        let mut carried = bucket;
        let mut index = self.home(carried.hash);
        let mut distance = 0;
        let mut placed_at = None;
        loop {
            let resident_distance = match self.buckets[index].as_ref() {
                None => {
                    self.buckets[index] = Some(carried);
                    return placed_at.unwrap_or(index);
                }
                Some(resident) => self.distance(resident.hash, index),
            };
            if resident_distance < distance {
                if let Some(resident) = self.buckets[index].as_mut() {
                    std::mem::swap(resident, &mut carried);
                }
                placed_at.get_or_insert(index);
                distance = resident_distance;
            }
            index = (index + 1) & mask;
            distance += 1;
        }
    }

    fn resize(&mut self, bucket_count: usize) {
        let old = std::mem::replace(&mut self.buckets, (0..bucket_count).map(|_| None).collect());
        for bucket in old.into_iter().flatten() {
            self.place(bucket);
        }
    }
}

impl<K: Hash + Eq, V> Default for UnorderedMap<K, V, RandomState> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + fmt::Debug, V: fmt::Debug, S: BuildHasher> fmt::Debug for UnorderedMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Index<&K> for UnorderedMap<K, V, S> {
    type Output = V;

    fn index(&self, key: &K) -> &Self::Output {
        self.get(key).unwrap_or_else(|| panic!("key not present in UnorderedMap"))
    }
}

impl<K: Hash + Eq, V> FromIterator<(K, V)> for UnorderedMap<K, V, RandomState> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Extend<(K, V)> for UnorderedMap<K, V, S> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
