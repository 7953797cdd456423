// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sibling-chain iteration and the enter/exit event list that the setup and
//! workload walks replay.

use alloc::vec::Vec;
use core::iter::FusedIterator;

use super::id::{INVALID, NodeId};
use super::store::NodeStore;

/// Follows a node's sibling chain from its first child to its last.
///
/// The order is the order the last update visited the children in. Returned
/// by [`NodeStore::children`].
#[derive(Clone, Debug)]
pub struct Children<'a> {
    store: &'a NodeStore,
    cursor: u32,
}

impl<'a> Children<'a> {
    /// Starts at the first child of slot `parent`.
    pub(crate) fn of(store: &'a NodeStore, parent: u32) -> Self {
        Self {
            store,
            cursor: store.first_child[parent as usize],
        }
    }
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let idx = self.cursor;
        (idx != INVALID).then(|| {
            self.cursor = self.store.next_sibling[idx as usize];
            self.store.id_at(idx)
        })
    }
}

impl FusedIterator for Children<'_> {}

/// One step of the depth-first walk the executor replays.
///
/// A node's `Enter` precedes the events of its whole subtree and its `Exit`
/// follows them, and a sibling's events start only after the previous
/// sibling's `Exit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalEvent {
    /// Pre-order visit.
    Enter {
        /// The visited node.
        node: NodeId,
        /// Distance from the root (the root is at depth 0).
        depth: u32,
    },
    /// Post-order visit.
    Exit {
        /// The visited node.
        node: NodeId,
        /// Distance from the root.
        depth: u32,
    },
}

impl TraversalEvent {
    /// Returns the visited node.
    #[must_use]
    pub const fn node(self) -> NodeId {
        match self {
            Self::Enter { node, .. } | Self::Exit { node, .. } => node,
        }
    }
}

impl NodeStore {
    /// Rebuilds the enter/exit event list for the subtree rooted at `root`.
    pub(crate) fn collect_events(&self, root: u32, out: &mut Vec<TraversalEvent>) {
        out.clear();
        if root != INVALID {
            self.dfs_collect(root, 0, out);
        }
    }

    fn dfs_collect(&self, idx: u32, depth: u32, out: &mut Vec<TraversalEvent>) {
        let node = self.id_at(idx);
        out.push(TraversalEvent::Enter { node, depth });
        let mut child = self.first_child[idx as usize];
        while child != INVALID {
            self.dfs_collect(child, depth + 1, out);
            child = self.next_sibling[child as usize];
        }
        out.push(TraversalEvent::Exit { node, depth });
    }
}
