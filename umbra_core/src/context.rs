// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reconciler context.
//!
//! A [`ReconcilerContext`] is the handle every state accessor takes. It knows
//! whether a reconciliation, traversal, or explicit
//! [`with_context`](crate::reconciler::Reconciler::with_context) scope is
//! open, which node is currently being built or visited (so reads can register
//! dependencies), which node handles are still live, and which structural
//! identifiers have been marked dirty since the last update.
//!
//! The context is single-threaded and cheap to clone. Observed-object
//! callbacks hold a [`WeakContext`] so they never keep a reconciler alive.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use hashbrown::{HashMap, HashSet};

use crate::identity::StructuralIdentifier;
use crate::node::NodeId;

#[derive(Default)]
struct ContextInner {
    depth: Cell<u32>,
    active: RefCell<Vec<NodeId>>,
    live: RefCell<HashMap<NodeId, StructuralIdentifier>>,
    dirty: RefCell<HashSet<StructuralIdentifier>>,
}

/// Shared handle to a reconciler's dependency and dirty-tracking state.
#[derive(Clone)]
pub struct ReconcilerContext {
    inner: Rc<ContextInner>,
}

impl fmt::Debug for ReconcilerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconcilerContext")
            .field("depth", &self.inner.depth.get())
            .field("current_node", &self.current_node())
            .field("dirty", &self.inner.dirty.borrow().len())
            .finish_non_exhaustive()
    }
}

impl ReconcilerContext {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(ContextInner::default()),
        }
    }

    /// Returns whether a context scope is currently open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.depth.get() > 0
    }

    /// Returns the node currently being built or visited, if any.
    #[must_use]
    pub fn current_node(&self) -> Option<NodeId> {
        self.inner.active.borrow().last().copied()
    }

    /// Returns whether `id` refers to a node that has not been destroyed.
    #[must_use]
    pub fn is_live(&self, id: NodeId) -> bool {
        self.inner.live.borrow().contains_key(&id)
    }

    /// Marks the node behind `id` dirty for the next update.
    ///
    /// Returns `false` (and does nothing) if the node is no longer live.
    pub fn mark_dirty(&self, id: NodeId) -> bool {
        mark_dirty_inner(&self.inner, id)
    }

    /// Returns whether `identifier` is currently in the dirty set.
    #[must_use]
    pub fn is_dirty(&self, identifier: &StructuralIdentifier) -> bool {
        self.inner.dirty.borrow().contains(identifier)
    }

    /// Returns the number of identifiers in the dirty set.
    #[must_use]
    pub fn dirty_len(&self) -> usize {
        self.inner.dirty.borrow().len()
    }

    /// Returns a non-owning handle to this context.
    #[must_use]
    pub fn downgrade(&self) -> WeakContext {
        WeakContext {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Panics unless a scope is open.
    #[track_caller]
    pub(crate) fn assert_active(&self, what: &str) {
        assert!(
            self.is_active(),
            "{what} outside of an active reconciler context"
        );
    }

    /// Opens a scope. The scope closes when the guard is dropped.
    pub(crate) fn enter(&self) -> ContextScope {
        self.inner.depth.set(self.inner.depth.get() + 1);
        ContextScope {
            inner: Rc::clone(&self.inner),
        }
    }

    pub(crate) fn push_active(&self, id: NodeId) {
        self.inner.active.borrow_mut().push(id);
    }

    pub(crate) fn pop_active(&self) {
        self.inner.active.borrow_mut().pop();
    }

    pub(crate) fn register(&self, id: NodeId, identifier: StructuralIdentifier) {
        self.inner.live.borrow_mut().insert(id, identifier);
    }

    pub(crate) fn unregister(&self, id: NodeId) {
        self.inner.live.borrow_mut().remove(&id);
    }

    /// Takes the dirty set, leaving it empty for writes made during the pass.
    pub(crate) fn take_dirty(&self) -> HashSet<StructuralIdentifier> {
        core::mem::take(&mut *self.inner.dirty.borrow_mut())
    }

    /// Hands a consumed dirty set back so its storage serves later writes.
    pub(crate) fn recycle_dirty(&self, mut dirty: HashSet<StructuralIdentifier>) {
        dirty.clear();
        let mut current = self.inner.dirty.borrow_mut();
        if current.is_empty() {
            core::mem::swap(&mut *current, &mut dirty);
        }
    }

    /// Merges a previously taken dirty set back in.
    pub(crate) fn restore_dirty(&self, dirty: HashSet<StructuralIdentifier>) {
        self.inner.dirty.borrow_mut().extend(dirty);
    }
}

fn mark_dirty_inner(inner: &ContextInner, id: NodeId) -> bool {
    let live = inner.live.borrow();
    match live.get(&id) {
        Some(identifier) => {
            inner.dirty.borrow_mut().insert(identifier.clone());
            true
        }
        None => false,
    }
}

/// A non-owning [`ReconcilerContext`] handle.
#[derive(Clone, Debug)]
pub struct WeakContext {
    inner: Weak<ContextInner>,
}

impl WeakContext {
    /// Marks `id` dirty if the context is still alive.
    pub fn mark_dirty(&self, id: NodeId) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| mark_dirty_inner(&inner, id))
    }

    /// Upgrades to a strong handle.
    #[must_use]
    pub fn upgrade(&self) -> Option<ReconcilerContext> {
        self.inner.upgrade().map(|inner| ReconcilerContext { inner })
    }
}

impl fmt::Debug for ContextInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextInner").finish_non_exhaustive()
    }
}

/// Guard for an open context scope.
#[must_use]
pub(crate) struct ContextScope {
    inner: Rc<ContextInner>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        self.inner.depth.set(self.inner.depth.get() - 1);
    }
}

impl fmt::Debug for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextScope")
            .field("depth", &self.inner.depth.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Atom, ElementTypeId};

    fn ident(i: u32) -> StructuralIdentifier {
        StructuralIdentifier::new().appending(Atom::indexed(ElementTypeId::of::<u8>(), i))
    }

    #[test]
    fn scopes_nest() {
        let cx = ReconcilerContext::new();
        assert!(!cx.is_active());
        let outer = cx.enter();
        let inner = cx.enter();
        drop(inner);
        assert!(cx.is_active());
        drop(outer);
        assert!(!cx.is_active());
    }

    #[test]
    fn mark_dirty_requires_live_node() {
        let cx = ReconcilerContext::new();
        let id = NodeId::new(0, 0);
        assert!(!cx.mark_dirty(id));
        cx.register(id, ident(0));
        assert!(cx.mark_dirty(id));
        assert!(cx.is_dirty(&ident(0)));
        cx.unregister(id);
        assert!(!cx.mark_dirty(NodeId::new(0, 0)));
    }

    #[test]
    fn take_and_restore_dirty() {
        let cx = ReconcilerContext::new();
        let id = NodeId::new(3, 1);
        cx.register(id, ident(3));
        cx.mark_dirty(id);
        let taken = cx.take_dirty();
        assert_eq!(taken.len(), 1);
        assert_eq!(cx.dirty_len(), 0);
        cx.restore_dirty(taken);
        assert!(cx.is_dirty(&ident(3)));
    }

    #[test]
    fn recycled_dirty_set_starts_empty() {
        let cx = ReconcilerContext::new();
        let a = NodeId::new(1, 0);
        let b = NodeId::new(2, 0);
        cx.register(a, ident(1));
        cx.register(b, ident(2));
        cx.mark_dirty(a);
        let taken = cx.take_dirty();
        cx.recycle_dirty(taken);
        assert_eq!(cx.dirty_len(), 0);
        assert!(!cx.is_dirty(&ident(1)));

        // Writes made while the set was out are kept.
        let taken = cx.take_dirty();
        cx.mark_dirty(b);
        cx.recycle_dirty(taken);
        assert!(cx.is_dirty(&ident(2)));
    }

    #[test]
    fn weak_context_stops_after_drop() {
        let cx = ReconcilerContext::new();
        let id = NodeId::new(0, 0);
        cx.register(id, ident(0));
        let weak = cx.downgrade();
        assert!(weak.mark_dirty(id));
        drop(cx);
        assert!(!weak.mark_dirty(id));
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn active_stack_tracks_current_node() {
        let cx = ReconcilerContext::new();
        assert_eq!(cx.current_node(), None);
        cx.push_active(NodeId::new(1, 0));
        cx.push_active(NodeId::new(2, 0));
        assert_eq!(cx.current_node(), Some(NodeId::new(2, 0)));
        cx.pop_active();
        assert_eq!(cx.current_node(), Some(NodeId::new(1, 0)));
    }
}
