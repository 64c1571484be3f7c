//! Container primitives used throughout helios.
//!
//! # B-tree
//! [`btree::BTree`] is an ordered map with order statistics. It is the free block index of the
//! [`DynamicBlockAllocator`](crate::DynamicBlockAllocator).
//! # Slot map
//! [`slot_map::SlotMap`] hands out generational keys that detect use after removal.
//! # Linked list
//! [`linked_list::LinkedList`] is a doubly linked list with stable handles, stored in a slot map.
//! # Unordered map
//! [`unordered_map::UnorderedMap`] is an open addressing hash map using Robin Hood hashing.

pub mod btree;
pub mod linked_list;
pub mod slot_map;
pub mod unordered_map;
