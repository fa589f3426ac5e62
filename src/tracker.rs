//! Per-node tracking of assigned address blocks.
//!
//! The node resource only ever carries its full, current list of pod CIDRs.
//! To send deletes for blocks that went away we remember the last list seen
//! for every node and diff against it.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use parking_lot::Mutex;

/// Remembers the CIDRs last observed for each node.
///
/// All access goes through one lock; the map is small and only touched once
/// per node event.
#[derive(Debug, Default)]
pub struct CidrTracker {
    cidrs_by_node: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl CidrTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current` as the CIDRs of `node` and return those that were
    /// present before but are not any more.
    ///
    /// Duplicates in `current` collapse. The removed CIDRs come back sorted.
    pub fn reconcile<S: AsRef<str>>(&self, node: &str, current: &[S]) -> Vec<String> {
        let current: BTreeSet<String> = current.iter().map(|c| c.as_ref().to_string()).collect();

        let mut cidrs_by_node = self.cidrs_by_node.lock();
        if current.is_empty() && !cidrs_by_node.contains_key(node) {
            return Vec::new();
        }

        let previous = cidrs_by_node.entry(node.to_string()).or_default();
        let removed: Vec<String> = previous.difference(&current).cloned().collect();
        debug!(
            "Node {} CIDRs: {} current, {} removed",
            node,
            current.len(),
            removed.len()
        );
        *previous = current;
        removed
    }

    /// Drop the entry for `node` and return the CIDRs it held, sorted.
    ///
    /// Equivalent to reconciling with no CIDRs and then forgetting the node,
    /// under a single lock.
    pub fn take(&self, node: &str) -> Vec<String> {
        let removed: Vec<String> = self
            .cidrs_by_node
            .lock()
            .remove(node)
            .map(|cidrs| cidrs.into_iter().collect())
            .unwrap_or_default();
        debug!("Node {} untracked, {} CIDRs removed", node, removed.len());
        removed
    }

    /// Drop everything known about `node`. Returns whether it was tracked.
    pub fn forget(&self, node: &str) -> bool {
        self.cidrs_by_node.lock().remove(node).is_some()
    }

    /// The CIDRs currently recorded for `node`, sorted.
    pub fn tracked(&self, node: &str) -> Option<Vec<String>> {
        self.cidrs_by_node
            .lock()
            .get(node)
            .map(|cidrs| cidrs.iter().cloned().collect())
    }

    /// Number of nodes with an entry.
    pub fn len(&self) -> usize {
        self.cidrs_by_node.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
