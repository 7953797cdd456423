// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Persistent node tree.
//!
//! A *node* is the retained counterpart of one element position. Each node
//! has:
//!
//! - An identity ([`NodeId`]), a generational handle that goes stale when the
//!   node is destroyed, and a [`StructuralIdentifier`] naming its logical
//!   position.
//! - Topology: parent, first/last child, and next-sibling links forming an
//!   ordered tree. Child lists are rebuilt on every update.
//! - The current element (replaced on every update) and the previous element
//!   (kept for comparison and introspection).
//! - Declared state slots, an environment storage linked to the parent's,
//!   and observed-object subscriptions.
//! - The `needs_setup` flag.
//!
//! Nodes are stored in struct-of-arrays layout with index-based handles.
//!
//! [`StructuralIdentifier`]: crate::identity::StructuralIdentifier

mod id;
mod store;
mod traverse;

pub use id::{INVALID, NodeId};
pub use store::NodeStore;
pub use traverse::{Children, TraversalEvent};
