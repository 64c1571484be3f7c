//! In-memory B-tree with order statistics.
//!
//! [`BTree`] is an ordered map. Every node caches the number of entries in its subtree, which makes rank and select
//! queries ([`BTree::rank`], [`BTree::nth`]) logarithmic next to the usual lookups. The range queries
//! [`BTree::find_smallest_key_greater_than_equals`] and [`BTree::find_largest_key_less_than_equals`] are what the
//! [`DynamicBlockAllocator`](crate::DynamicBlockAllocator) uses to find the best fitting free block.
//!
//! Nodes are stored in a [`BlockAllocator`], so the tree does not touch the system allocator for every split and merge.
//!
//! # Example
//! ```
//! # use helios::prelude::*;
//! let mut tree = BTree::<u32, &str>::new();
//! tree.insert(64, "small");
//! tree.insert(256, "medium");
//! tree.insert(4096, "large");
//! assert_eq!(tree.find_smallest_key_greater_than_equals(&100), Some((&256, &"medium")));
//! assert_eq!(tree.rank(&4096), 2);
//! assert_eq!(tree.nth(0), Some((&64, &"small")));
//! ```

use std::fmt;

use crate::allocator::block_allocator::{BlockAllocator, BlockIndex};

type NodeId = BlockIndex;

struct Node<K, V> {
    keys: Vec<K>,
    values: Vec<V>,
    // Empty for leaves, `keys.len() + 1` entries otherwise.
    children: Vec<NodeId>,
    // Number of entries in this subtree.
    size: usize,
}

impl<K, V> Node<K, V> {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Selects which entry of a subtree gets removed.
enum Probe<'a, K> {
    Key(&'a K),
    First,
    Last,
}

/// Ordered map backed by a B-tree with at most `MAX_CHILDREN` children per node.
///
/// The tree uses a minimum degree of `MAX_CHILDREN / 2`, so an odd fan-out is rounded down to the next even value.
/// Fan-outs below 4 fail to compile.
pub struct BTree<K, V, const MAX_CHILDREN: usize = 16> {
    nodes: BlockAllocator<Node<K, V>, 32>,
    root: Option<NodeId>,
}

impl<K: Ord, V, const MAX_CHILDREN: usize> BTree<K, V, MAX_CHILDREN> {
    const VALID_FAN_OUT: () = assert!(MAX_CHILDREN >= 4, "BTree nodes need room for at least 4 children");
    const MIN_DEGREE: usize = MAX_CHILDREN / 2;
    const MAX_KEYS: usize = 2 * Self::MIN_DEGREE - 1;

    /// Create an empty tree.
    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_FAN_OUT;
        Self {
            nodes: BlockAllocator::new(),
            root: None,
        }
    }

    /// Number of entries in the tree.
    pub fn len(&self) -> usize {
        self.root.map_or(0, |root| self.nodes[root].size)
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Remove all entries and free all nodes.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Insert an entry. If the key was already present, its value is replaced and the old value is returned.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some((id, index)) = self.search(&key) {
            return Some(std::mem::replace(&mut self.nodes[id].values[index], value));
        }

        let root = match self.root {
            Some(root) => root,
            None => {
                let leaf = self.new_node(vec![key], vec![value], Vec::new(), 1);
                self.root = Some(leaf);
                return None;
            }
        };

        let root = if self.nodes[root].keys.len() == Self::MAX_KEYS {
            let size = self.nodes[root].size;
            let new_root = self.new_node(Vec::new(), Vec::new(), vec![root], size);
            self.split_child(new_root, 0);
            self.root = Some(new_root);
            new_root
        } else {
            root
        };

        self.insert_non_full(root, key, value);
        None
    }

    /// Get the value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        let (id, index) = self.search(key)?;
        Some(&self.nodes[id].values[index])
    }

    /// Get the value for `key` mutably.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let (id, index) = self.search(key)?;
        Some(&mut self.nodes[id].values[index])
    }

    /// Whether the tree has an entry for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_some()
    }

    /// Remove the entry for `key` and return its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.search(key)?;
        let root = self.root?;
        let (_, value) = self.remove_from(root, Probe::Key(key));
        self.collapse_root();
        Some(value)
    }

    /// Remove and return the entry with the smallest key.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let root = self.root?;
        let entry = self.remove_from(root, Probe::First);
        self.collapse_root();
        Some(entry)
    }

    /// Remove and return the entry with the largest key.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let root = self.root?;
        let entry = self.remove_from(root, Probe::Last);
        self.collapse_root();
        Some(entry)
    }

    /// Find the entry with the smallest key that is greater than or equal to `key`.
    pub fn find_smallest_key_greater_than_equals(&self, key: &K) -> Option<(&K, &V)> {
        let mut id = self.root?;
        let mut best = None;
        loop {
            let node = &self.nodes[id];
            let index = node.keys.partition_point(|k| k < key);
            if index < node.keys.len() {
                let entry = (&node.keys[index], &node.values[index]);
                if entry.0 == key {
                    return Some(entry);
                }
                best = Some(entry);
            }
            if node.is_leaf() {
                return best;
            }
            id = node.children[index];
        }
    }

    /// Find the entry with the largest key that is less than or equal to `key`.
    pub fn find_largest_key_less_than_equals(&self, key: &K) -> Option<(&K, &V)> {
        let mut id = self.root?;
        let mut best = None;
        loop {
            let node = &self.nodes[id];
            let index = node.keys.partition_point(|k| k <= key);
            if index > 0 {
                let entry = (&node.keys[index - 1], &node.values[index - 1]);
                if entry.0 == key {
                    return Some(entry);
                }
                best = Some(entry);
            }
            if node.is_leaf() {
                return best;
            }
            id = node.children[index];
        }
    }

    /// Entry with the smallest key.
    pub fn first(&self) -> Option<(&K, &V)> {
        let mut node = &self.nodes[self.root?];
        while !node.is_leaf() {
            node = &self.nodes[node.children[0]];
        }
        Some((&node.keys[0], &node.values[0]))
    }

    /// Entry with the largest key.
    pub fn last(&self) -> Option<(&K, &V)> {
        let mut node = &self.nodes[self.root?];
        while !node.is_leaf() {
            node = &self.nodes[node.children[node.children.len() - 1]];
        }
        let last = node.keys.len() - 1;
        Some((&node.keys[last], &node.values[last]))
    }

    /// Entry at position `index` in ascending key order.
    pub fn nth(&self, mut index: usize) -> Option<(&K, &V)> {
        if index >= self.len() {
            return None;
        }
        let mut id = self.root?;
        'descend: loop {
            let node = &self.nodes[id];
            if node.is_leaf() {
                return Some((&node.keys[index], &node.values[index]));
            }
            for (i, &child) in node.children.iter().enumerate() {
                let size = self.nodes[child].size;
                if index < size {
                    id = child;
                    continue 'descend;
                }
                index -= size;
                if index == 0 {
                    return Some((&node.keys[i], &node.values[i]));
                }
                index -= 1;
            }
            unreachable!("subtree sizes are inconsistent");
        }
    }

    /// Number of keys strictly smaller than `key`.
    pub fn rank(&self, key: &K) -> usize {
        let Some(mut id) = self.root else {
            return 0;
        };
        let mut rank = 0;
        loop {
            let node = &self.nodes[id];
            let (index, found) = match node.keys.binary_search(key) {
                Ok(index) => (index, true),
                Err(index) => (index, false),
            };
            rank += index;
            if node.is_leaf() {
                return rank;
            }
            rank += node.children[..index].iter().map(|&child| self.nodes[child].size).sum::<usize>();
            if found {
                return rank + self.nodes[node.children[index]].size;
            }
            id = node.children[index];
        }
    }

    /// Iterate over all entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V, MAX_CHILDREN> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
            remaining: self.len(),
        };
        if let Some(root) = self.root {
            iter.descend_left(root);
        }
        iter
    }

    /// Iterate over all keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Iterate over all values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Height of the tree. An empty tree has height zero, a single leaf has height one.
    pub fn height(&self) -> usize {
        let Some(mut id) = self.root else {
            return 0;
        };
        let mut height = 1;
        while !self.nodes[id].is_leaf() {
            id = self.nodes[id].children[0];
            height += 1;
        }
        height
    }

    fn new_node(&mut self, keys: Vec<K>, values: Vec<V>, children: Vec<NodeId>, size: usize) -> NodeId {
        self.nodes.allocate(Node {
            keys,
            values,
            children,
            size,
        })
    }

    fn search(&self, key: &K) -> Option<(NodeId, usize)> {
        let mut id = self.root?;
        loop {
            let node = &self.nodes[id];
            match node.keys.binary_search(key) {
                Ok(index) => return Some((id, index)),
                Err(_) if node.is_leaf() => return None,
                Err(index) => id = node.children[index],
            }
        }
    }

    fn insert_non_full(&mut self, mut id: NodeId, key: K, value: V) {
        loop {
            let node = &mut self.nodes[id];
            node.size += 1;
            let mut index = node.keys.partition_point(|k| k < &key);
            if node.is_leaf() {
                node.keys.insert(index, key);
                node.values.insert(index, value);
                return;
            }

            let child = node.children[index];
            if self.nodes[child].keys.len() == Self::MAX_KEYS {
                self.split_child(id, index);
                if key > self.nodes[id].keys[index] {
                    index += 1;
                }
            }
            id = self.nodes[id].children[index];
        }
    }

    /// Split the full child at `index` of `parent` around its median, which moves up into `parent`.
    fn split_child(&mut self, parent: NodeId, index: usize) {
        let t = Self::MIN_DEGREE;
        let child = self.nodes[parent].children[index];

        let node = &mut self.nodes[child];
        let keys = node.keys.split_off(t);
        let values = node.values.split_off(t);
        let children = if node.is_leaf() {
            Vec::new()
        } else {
            node.children.split_off(t)
        };
        let median_key = node.keys.remove(t - 1);
        let median_value = node.values.remove(t - 1);

        let size = keys.len() + children.iter().map(|&c| self.nodes[c].size).sum::<usize>();
        self.nodes[child].size -= size + 1;
        let sibling = self.new_node(keys, values, children, size);

        let parent = &mut self.nodes[parent];
        parent.keys.insert(index, median_key);
        parent.values.insert(index, median_value);
        parent.children.insert(index + 1, sibling);
    }

    /// Remove one entry from the subtree rooted at `id`. The entry must exist.
    /// Every child is topped up to at least `t` keys before descending into it, so no fix-up pass is needed afterwards.
    fn remove_from(&mut self, mut id: NodeId, probe: Probe<'_, K>) -> (K, V) {
        let t = Self::MIN_DEGREE;
        loop {
            let node = &mut self.nodes[id];
            node.size -= 1;
            let (index, found) = match probe {
                Probe::Key(key) => match node.keys.binary_search(key) {
                    Ok(index) => (index, true),
                    Err(index) => (index, false),
                },
                Probe::First => (0, node.is_leaf()),
                Probe::Last if node.is_leaf() => (node.keys.len() - 1, true),
                Probe::Last => (node.keys.len(), false),
            };

            if node.is_leaf() {
                debug_assert!(found, "removed entry must exist");
                return (node.keys.remove(index), node.values.remove(index));
            }

            if found {
                let left = node.children[index];
                let right = node.children[index + 1];
                if self.nodes[left].keys.len() >= t {
                    let (key, value) = self.remove_from(left, Probe::Last);
                    return self.replace_entry(id, index, key, value);
                }
                if self.nodes[right].keys.len() >= t {
                    let (key, value) = self.remove_from(right, Probe::First);
                    return self.replace_entry(id, index, key, value);
                }
                // Both neighbours are minimal, pull the entry down into the merged child.
                self.merge_children(id, index);
                id = left;
                continue;
            }

            let index = self.fill_child(id, index);
            id = self.nodes[id].children[index];
        }
    }

    fn replace_entry(&mut self, id: NodeId, index: usize, key: K, value: V) -> (K, V) {
        let node = &mut self.nodes[id];
        let key = std::mem::replace(&mut node.keys[index], key);
        let value = std::mem::replace(&mut node.values[index], value);
        (key, value)
    }

    /// Make sure the child at `index` holds at least `t` keys. Returns the index of the child to descend into, which
    /// shifts left by one when the child is merged into its left sibling.
    fn fill_child(&mut self, parent: NodeId, index: usize) -> usize {
        let t = Self::MIN_DEGREE;
        let node = &self.nodes[parent];
        if self.nodes[node.children[index]].keys.len() >= t {
            return index;
        }

        let child_count = node.children.len();
        let left_rich = index > 0 && self.nodes[node.children[index - 1]].keys.len() >= t;
        let right_rich = index + 1 < child_count && self.nodes[node.children[index + 1]].keys.len() >= t;

        if left_rich {
            self.rotate_right(parent, index - 1);
            index
        } else if right_rich {
            self.rotate_left(parent, index);
            index
        } else if index + 1 < child_count {
            self.merge_children(parent, index);
            index
        } else {
            self.merge_children(parent, index - 1);
            index - 1
        }
    }

    /// Move the last entry of child `index` up into `parent`, and the separator down into child `index + 1`.
    fn rotate_right(&mut self, parent: NodeId, index: usize) {
        let (left, right) = {
            let node = &self.nodes[parent];
            (node.children[index], node.children[index + 1])
        };

        let node = &mut self.nodes[left];
        let last = node.keys.len() - 1;
        let key = node.keys.remove(last);
        let value = node.values.remove(last);
        let child = if node.is_leaf() {
            None
        } else {
            Some(node.children.remove(last + 1))
        };
        let moved = 1 + child.map_or(0, |c| self.nodes[c].size);
        self.nodes[left].size -= moved;

        let (key, value) = self.replace_entry(parent, index, key, value);

        let node = &mut self.nodes[right];
        node.keys.insert(0, key);
        node.values.insert(0, value);
        if let Some(child) = child {
            node.children.insert(0, child);
        }
        node.size += moved;
    }

    /// Move the first entry of child `index + 1` up into `parent`, and the separator down into child `index`.
    fn rotate_left(&mut self, parent: NodeId, index: usize) {
        let (left, right) = {
            let node = &self.nodes[parent];
            (node.children[index], node.children[index + 1])
        };

        let node = &mut self.nodes[right];
        let key = node.keys.remove(0);
        let value = node.values.remove(0);
        let child = if node.is_leaf() {
            None
        } else {
            Some(node.children.remove(0))
        };
        let moved = 1 + child.map_or(0, |c| self.nodes[c].size);
        self.nodes[right].size -= moved;

        let (key, value) = self.replace_entry(parent, index, key, value);

        let node = &mut self.nodes[left];
        node.keys.push(key);
        node.values.push(value);
        if let Some(child) = child {
            node.children.push(child);
        }
        node.size += moved;
    }

    /// Merge child `index + 1` and the separator at `index` into child `index`.
    fn merge_children(&mut self, parent: NodeId, index: usize) {
        let node = &mut self.nodes[parent];
        let key = node.keys.remove(index);
        let value = node.values.remove(index);
        let left = node.children[index];
        let right = node.children.remove(index + 1);

        let Some(right) = self.nodes.release(right) else {
            unreachable!("child of a live node was already released");
        };

        let node = &mut self.nodes[left];
        node.keys.push(key);
        node.keys.extend(right.keys);
        node.values.push(value);
        node.values.extend(right.values);
        node.children.extend(right.children);
        node.size += 1 + right.size;
    }

    /// Drop an empty root, promoting its only child if it has one.
    fn collapse_root(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        if self.nodes[root].keys.is_empty() {
            self.root = self.nodes[root].children.first().copied();
            self.nodes.release(root);
        }
    }
}

impl<K: Ord, V, const MAX_CHILDREN: usize> Default for BTree<K, V, MAX_CHILDREN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + fmt::Debug, V: fmt::Debug, const MAX_CHILDREN: usize> fmt::Debug for BTree<K, V, MAX_CHILDREN> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord, V, const MAX_CHILDREN: usize> FromIterator<(K, V)> for BTree<K, V, MAX_CHILDREN> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tree = Self::new();
        tree.extend(iter);
        tree
    }
}

impl<K: Ord, V, const MAX_CHILDREN: usize> Extend<(K, V)> for BTree<K, V, MAX_CHILDREN> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// In-order iterator over a [`BTree`].
pub struct Iter<'a, K, V, const MAX_CHILDREN: usize> {
    tree: &'a BTree<K, V, MAX_CHILDREN>,
    // Path from the root to the next entry, with the next key index per node.
    stack: Vec<(NodeId, usize)>,
    remaining: usize,
}

impl<'a, K, V, const MAX_CHILDREN: usize> Iter<'a, K, V, MAX_CHILDREN> {
    fn descend_left(&mut self, mut id: NodeId) {
        loop {
            self.stack.push((id, 0));
            let node = &self.tree.nodes[id];
            if node.is_leaf() {
                return;
            }
            id = node.children[0];
        }
    }
}

impl<'a, K, V, const MAX_CHILDREN: usize> Iterator for Iter<'a, K, V, MAX_CHILDREN> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        loop {
            let (id, index) = *self.stack.last()?;
            let node = &tree.nodes[id];
            if index < node.keys.len() {
                if let Some(top) = self.stack.last_mut() {
                    top.1 += 1;
                }
                if !node.is_leaf() {
                    self.descend_left(node.children[index + 1]);
                }
                self.remaining -= 1;
                return Some((&node.keys[index], &node.values[index]));
            }
            self.stack.pop();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V, const MAX_CHILDREN: usize> ExactSizeIterator for Iter<'a, K, V, MAX_CHILDREN> {}
