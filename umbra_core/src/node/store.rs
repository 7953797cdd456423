// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays node storage with allocation and topology management.

use alloc::vec::Vec;
use core::fmt;

use crate::element::AnyElement;
use crate::environment::{Environment, EnvironmentStorage};
use crate::identity::StructuralIdentifier;
use crate::observed::ObservedSubscription;
use crate::state::StateTable;

use super::id::{INVALID, NodeId};
use super::traverse::Children;

/// Struct-of-arrays storage for all nodes.
///
/// Nodes are addressed by [`NodeId`] handles. Each node occupies a slot in
/// parallel arrays. Destroyed nodes are recycled through a free list, and
/// generation counters make handles to destroyed nodes fail validation.
///
/// Mutation is reserved to the [`Reconciler`](crate::reconciler::Reconciler);
/// the public surface is read-only.
pub struct NodeStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) last_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,

    // -- Identity and description --
    pub(crate) identifier: Vec<StructuralIdentifier>,
    pub(crate) element: Vec<Option<AnyElement>>,
    pub(crate) previous: Vec<Option<AnyElement>>,

    // -- Per-node runtime data --
    pub(crate) state: Vec<StateTable>,
    pub(crate) environment: Vec<EnvironmentStorage>,
    pub(crate) subscriptions: Vec<Vec<ObservedSubscription>>,
    pub(crate) needs_setup: Vec<bool>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,
}

impl fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStore")
            .field("slots", &self.len)
            .field("live", &self.live_count())
            .field("free", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    /// Creates an empty node store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty node store with room for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            parent: Vec::with_capacity(capacity),
            first_child: Vec::with_capacity(capacity),
            last_child: Vec::with_capacity(capacity),
            next_sibling: Vec::with_capacity(capacity),
            identifier: Vec::with_capacity(capacity),
            element: Vec::with_capacity(capacity),
            previous: Vec::with_capacity(capacity),
            state: Vec::with_capacity(capacity),
            environment: Vec::with_capacity(capacity),
            subscriptions: Vec::with_capacity(capacity),
            needs_setup: Vec::with_capacity(capacity),
            generation: Vec::with_capacity(capacity),
            alive: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    // -- Allocation --

    /// Creates a detached node for `identifier` with `needs_setup` raised.
    pub(crate) fn create_node(&mut self, identifier: StructuralIdentifier) -> NodeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Slots are cleared on destroy; only identity and flags change.
            let i = idx as usize;
            self.identifier[i] = identifier;
            self.needs_setup[i] = true;
            self.alive[i] = true;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.last_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.identifier.push(identifier);
            self.element.push(None);
            self.previous.push(None);
            self.state.push(StateTable::new());
            self.environment.push(EnvironmentStorage::default());
            self.subscriptions.push(Vec::new());
            self.needs_setup.push(true);
            self.generation.push(0);
            self.alive.push(true);
            idx
        };
        NodeId::new(idx, self.generation[idx as usize])
    }

    /// Destroys a node, dropping its element, state, environment, and
    /// subscriptions, and frees the slot.
    ///
    /// The node's children are not touched; the caller destroys them too.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub(crate) fn destroy_node(&mut self, id: NodeId) {
        self.validate(id);
        let i = id.idx as usize;
        self.parent[i] = INVALID;
        self.first_child[i] = INVALID;
        self.last_child[i] = INVALID;
        self.next_sibling[i] = INVALID;
        self.identifier[i] = StructuralIdentifier::new();
        self.element[i] = None;
        self.previous[i] = None;
        self.state[i].clear();
        self.environment[i].reset();
        self.subscriptions[i].clear();
        self.needs_setup[i] = false;
        self.alive[i] = false;

        // Bump generation so old handles immediately fail validation.
        self.generation[i] += 1;
        self.free_list.push(id.idx);
    }

    /// Returns whether the given handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        id.idx < self.len
            && self.alive[id.idx as usize]
            && self.generation[id.idx as usize] == id.generation
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    // -- Topology --

    /// Forgets `idx`'s child list so it can be rebuilt in order.
    pub(crate) fn clear_children(&mut self, idx: u32) {
        self.first_child[idx as usize] = INVALID;
        self.last_child[idx as usize] = INVALID;
    }

    /// Appends `child` as the last child of `parent` (or detaches it when
    /// `parent` is [`INVALID`]).
    pub(crate) fn append_child(&mut self, parent: u32, child: u32) {
        let c = child as usize;
        self.parent[c] = parent;
        self.next_sibling[c] = INVALID;
        if parent == INVALID {
            return;
        }
        let p = parent as usize;
        if self.first_child[p] == INVALID {
            self.first_child[p] = child;
        } else {
            let last = self.last_child[p];
            self.next_sibling[last as usize] = child;
        }
        self.last_child[p] = child;
    }

    /// Returns the parent of a node, if any.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != INVALID).then(|| self.id_at(p))
    }

    /// Returns an iterator over the direct children of a node.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        self.validate(id);
        Children::of(self, id.idx)
    }

    // -- Per-node data --

    /// Returns the structural identifier of a node.
    #[must_use]
    pub fn identifier(&self, id: NodeId) -> &StructuralIdentifier {
        self.validate(id);
        &self.identifier[id.idx as usize]
    }

    /// Returns the element the node was last reconciled from.
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&AnyElement> {
        self.validate(id);
        self.element[id.idx as usize].as_ref()
    }

    /// Returns the element the node was reconciled from before the last
    /// update, if it was reused.
    #[must_use]
    pub fn previous_element(&self, id: NodeId) -> Option<&AnyElement> {
        self.validate(id);
        self.previous[id.idx as usize].as_ref()
    }

    /// Returns whether the node will run its setup callbacks in the next
    /// setup pass.
    #[must_use]
    pub fn needs_setup(&self, id: NodeId) -> bool {
        self.validate(id);
        self.needs_setup[id.idx as usize]
    }

    /// Returns a read-only view of the node's environment.
    #[must_use]
    pub fn environment(&self, id: NodeId) -> Environment<'_> {
        self.validate(id);
        Environment::new(&self.environment, id.idx)
    }

    /// Returns handles to all live nodes in slot order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.len)
            .filter(|idx| self.alive[*idx as usize])
            .map(|idx| self.id_at(idx))
    }

    // -- Internal helpers --

    /// Returns the current handle for a slot.
    pub(crate) fn id_at(&self, idx: u32) -> NodeId {
        NodeId::new(idx, self.generation[idx as usize])
    }

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: NodeId) {
        assert!(
            self.is_alive(id),
            "stale NodeId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }
}
