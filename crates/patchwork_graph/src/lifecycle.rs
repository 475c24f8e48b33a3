// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deferred deletion.
//!
//! Graph traversal and event dispatch hold handles to patchers while they
//! run, so a patcher asking to be removed is only marked here. The host
//! drains the queue once per frame, between event handling and `update()`.

use indexmap::IndexSet;
use std::hash::Hash;

/// Set of objects waiting for the next drain point
#[derive(Debug, Clone)]
pub struct DeleteQueue<K> {
    pending: IndexSet<K>,
}

impl<K: Copy + Eq + Hash> DeleteQueue<K> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            pending: IndexSet::new(),
        }
    }

    /// Mark `key` for deletion. Returns `false` if it was already marked.
    pub fn mark(&mut self, key: K) -> bool {
        self.pending.insert(key)
    }

    /// Whether `key` is waiting for deletion
    pub fn contains(&self, key: K) -> bool {
        self.pending.contains(&key)
    }

    /// Number of pending objects
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take every pending key in marking order, leaving the queue empty
    pub fn drain(&mut self) -> Vec<K> {
        self.pending.drain(..).collect()
    }
}

impl<K: Copy + Eq + Hash> Default for DeleteQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
