//! Slot map with generational keys.
//!
//! A [`SlotMap`] stores values in a dense array of slots and hands out [`SlotKey`]s. Each key remembers the generation of
//! the slot at the time of insertion. Removing a value bumps the slot's generation, so old keys stop resolving even after
//! the slot is reused for a new value.
//!
//! # Example
//! ```
//! # use helios::prelude::*;
//! let mut map = SlotMap::new();
//! let key = map.insert("texture");
//! assert_eq!(map.remove(key), Some("texture"));
//! let reused = map.insert("mesh");
//! // Same slot, but the old key is stale.
//! assert_eq!(map.get(key), None);
//! assert_eq!(map.get(reused), Some(&"mesh"));
//! ```

use std::ops::{Index, IndexMut};

/// Generational handle into a [`SlotMap`].
///
/// Keys are ordered by slot index first and generation second. [`SlotKey::null()`] is the smallest possible key and
/// never resolves to a value.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

impl SlotKey {
    /// A key that never resolves to a value.
    pub const fn null() -> Self {
        Self {
            index: 0,
            generation: 0,
        }
    }

    /// Whether this is the null key.
    pub fn is_null(&self) -> bool {
        self.generation == 0
    }

    /// Slot index of this key.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot at the time this key was created.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    // Never zero, so that the null key never matches.
    generation: u32,
    value: Option<T>,
    next_free: Option<u32>,
}

/// Associative container with O(1) insertion, removal and lookup through generational [`SlotKey`]s.
#[derive(Debug, Clone)]
pub struct SlotMap<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

fn next_generation(generation: u32) -> u32 {
    match generation.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}

impl<T> SlotMap<T> {
    /// Create an empty slot map.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty slot map with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Insert a value and return its key.
    pub fn insert(&mut self, value: T) -> SlotKey {
        self.insert_with_key(|_| value)
    }

    /// Insert a value that needs to know its own key.
    pub fn insert_with_key<F: FnOnce(SlotKey) -> T>(&mut self, f: F) -> SlotKey {
        let key = match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                self.free_head = slot.next_free.take();
                SlotKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| panic!("SlotMap cannot hold more than u32::MAX slots"));
                self.slots.push(Slot {
                    generation: 1,
                    value: None,
                    next_free: None,
                });
                SlotKey {
                    index,
                    generation: 1,
                }
            }
        };

        self.slots[key.index as usize].value = Some(f(key));
        self.len += 1;
        key
    }

    /// Remove the value for `key`. Returns `None` if the key is stale or null.
    pub fn remove(&mut self, key: SlotKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = next_generation(slot.generation);
        slot.next_free = self.free_head;
        self.free_head = Some(key.index);
        self.len -= 1;
        Some(value)
    }

    /// Get a reference to the value for `key`.
    pub fn get(&self, key: SlotKey) -> Option<&T> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Get a mutable reference to the value for `key`.
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Whether `key` resolves to a value.
    pub fn contains_key(&self, key: SlotKey) -> bool {
        self.get(key).is_some()
    }

    /// Keep only the values for which `f` returns true.
    pub fn retain<F: FnMut(SlotKey, &mut T) -> bool>(&mut self, mut f: F) {
        let mut removed = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.as_mut() {
                let key = SlotKey {
                    index: index as u32,
                    generation: slot.generation,
                };
                if !f(key, value) {
                    removed.push(key);
                }
            }
        }
        for key in removed {
            self.remove(key);
        }
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots, live or vacant.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Remove every value. All keys handed out so far become stale.
    pub fn clear(&mut self) {
        let keys: Vec<SlotKey> = self.keys().collect();
        for key in keys {
            self.remove(key);
        }
    }

    /// Iterate over all live `(key, value)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotKey, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value.as_ref().map(|value| {
                (
                    SlotKey {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    value,
                )
            })
        })
    }

    /// Iterate mutably over all live `(key, value)` pairs in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotKey, &mut T)> + '_ {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value.as_mut().map(|value| {
                (
                    SlotKey {
                        index: index as u32,
                        generation,
                    },
                    value,
                )
            })
        })
    }

    /// Iterate over all live keys.
    pub fn keys(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterate over all live values.
    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.iter().map(|(_, value)| value)
    }
}

impl<T> Default for SlotMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<SlotKey> for SlotMap<T> {
    type Output = T;

    fn index(&self, key: SlotKey) -> &Self::Output {
        self.get(key).unwrap_or_else(|| panic!("stale or invalid slot key {key:?}"))
    }
}

impl<T> IndexMut<SlotKey> for SlotMap<T> {
    fn index_mut(&mut self, key: SlotKey) -> &mut Self::Output {
        self.get_mut(key).unwrap_or_else(|| panic!("stale or invalid slot key {key:?}"))
    }
}
