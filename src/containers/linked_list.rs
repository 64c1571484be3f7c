//! Doubly linked list with stable handles.
//!
//! Nodes are stored in a [`SlotMap`], so a [`ListHandle`] stays valid while other nodes are inserted or removed, and a
//! handle to a removed node is detected as stale instead of aliasing whatever node reuses its storage.

use std::ops::{Index, IndexMut};

use crate::containers::slot_map::{SlotKey, SlotMap};

/// Stable handle to a node in a [`LinkedList`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListHandle(SlotKey);

impl ListHandle {
    /// Handle that never refers to a node. Orders before every other handle.
    pub const fn null() -> Self {
        Self(SlotKey::null())
    }
}

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    prev: Option<ListHandle>,
    next: Option<ListHandle>,
}

/// Doubly linked list supporting O(1) insertion and removal anywhere through [`ListHandle`]s.
#[derive(Debug, Clone)]
pub struct LinkedList<T> {
    nodes: SlotMap<Node<T>>,
    head: Option<ListHandle>,
    tail: Option<ListHandle>,
}

impl<T> LinkedList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::new(),
            head: None,
            tail: None,
        }
    }

    /// Number of elements in the list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Handle to the first element.
    pub fn front(&self) -> Option<ListHandle> {
        self.head
    }

    /// Handle to the last element.
    pub fn back(&self) -> Option<ListHandle> {
        self.tail
    }

    /// Insert at the front of the list.
    pub fn push_front(&mut self, value: T) -> ListHandle {
        self.link(value, None, self.head)
    }

    /// Insert at the back of the list.
    pub fn push_back(&mut self, value: T) -> ListHandle {
        self.link(value, self.tail, None)
    }

    /// Remove and return the first element.
    pub fn pop_front(&mut self) -> Option<T> {
        self.remove(self.head?)
    }

    /// Remove and return the last element.
    pub fn pop_back(&mut self) -> Option<T> {
        self.remove(self.tail?)
    }

    /// Insert `value` directly after the node at `after`. Returns `None` if `after` is stale.
    pub fn insert_after(&mut self, after: ListHandle, value: T) -> Option<ListHandle> {
        let next = self.nodes.get(after.0)?.next;
        Some(self.link(value, Some(after), next))
    }

    /// Insert `value` directly before the node at `before`. Returns `None` if `before` is stale.
    pub fn insert_before(&mut self, before: ListHandle, value: T) -> Option<ListHandle> {
        let prev = self.nodes.get(before.0)?.prev;
        Some(self.link(value, prev, Some(before)))
    }

    /// Unlink the node at `handle` and return its value. Returns `None` if the handle is stale.
    pub fn remove(&mut self, handle: ListHandle) -> Option<T> {
        let node = self.nodes.remove(handle.0)?;
        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.tail = node.prev,
        }
        Some(node.value)
    }

    /// Get the value at `handle`.
    pub fn get(&self, handle: ListHandle) -> Option<&T> {
        self.nodes.get(handle.0).map(|node| &node.value)
    }

    /// Get the value at `handle` mutably.
    pub fn get_mut(&mut self, handle: ListHandle) -> Option<&mut T> {
        self.nodes.get_mut(handle.0).map(|node| &mut node.value)
    }

    /// Whether `handle` refers to a node in this list.
    pub fn contains(&self, handle: ListHandle) -> bool {
        self.nodes.contains_key(handle.0)
    }

    /// Handle of the node after `handle`.
    pub fn next(&self, handle: ListHandle) -> Option<ListHandle> {
        self.nodes.get(handle.0)?.next
    }

    /// Handle of the node before `handle`.
    pub fn prev(&self, handle: ListHandle) -> Option<ListHandle> {
        self.nodes.get(handle.0)?.prev
    }

    /// Remove every element.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Iterate from front to back. The iterator is double ended.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.head,
            back: self.tail,
            remaining: self.len(),
        }
    }

    /// Iterate over `(handle, value)` pairs from front to back.
    pub fn handles(&self) -> impl Iterator<Item = (ListHandle, &T)> + '_ {
        std::iter::successors(self.head, move |handle| self.next(*handle)).map(move |handle| (handle, &self.node(handle).value))
    }

    fn link(&mut self, value: T, prev: Option<ListHandle>, next: Option<ListHandle>) -> ListHandle {
        let handle = ListHandle(self.nodes.insert(Node {
            value,
            prev,
            next,
        }));
        match prev {
            Some(prev) => self.node_mut(prev).next = Some(handle),
            None => self.head = Some(handle),
        }
        match next {
            Some(next) => self.node_mut(next).prev = Some(handle),
            None => self.tail = Some(handle),
        }
        handle
    }

    // Links stored inside the list always point at live nodes.
    fn node(&self, handle: ListHandle) -> &Node<T> {
        &self.nodes[handle.0]
    }

    fn node_mut(&mut self, handle: ListHandle) -> &mut Node<T> {
        &mut self.nodes[handle.0]
    }
}

impl<T> Default for LinkedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<ListHandle> for LinkedList<T> {
    type Output = T;

    fn index(&self, handle: ListHandle) -> &Self::Output {
        &self.node(handle).value
    }
}

impl<T> IndexMut<ListHandle> for LinkedList<T> {
    fn index_mut(&mut self, handle: ListHandle) -> &mut Self::Output {
        &mut self.node_mut(handle).value
    }
}

impl<T> FromIterator<T> for LinkedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

impl<T> Extend<T> for LinkedList<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

/// Front to back iterator over a [`LinkedList`].
pub struct Iter<'a, T> {
    list: &'a LinkedList<T>,
    front: Option<ListHandle>,
    back: Option<ListHandle>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.front?);
        self.front = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.back?);
        self.back = node.prev;
        self.remaining -= 1;
        Some(&node.value)
    }
}

impl<'a, T> ExactSizeIterator for Iter<'a, T> {}
