// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The update pass.
//!
//! An update walks the new element tree depth first, pre-order. For each
//! position it:
//!
//! 1. Computes the [`StructuralIdentifier`] from the parent's identifier and
//!    the parent's per-type sibling counters (or the element's explicit key).
//! 2. Reuses the node stored under that identifier, or creates one.
//! 3. Relinks the node's environment to its tree parent.
//! 4. Restores the element's declared state slots from the node.
//! 5. Decides whether a reused node changed: its element reports
//!    `requires_setup` against the previous element, or its identifier was
//!    in the dirty set consumed at the start of the update. A changed node
//!    is flagged `needs_setup`. Modifier-written environment values are
//!    dropped (behavior-written ones survive) before the element configures
//!    the environment again.
//! 6. Subscribes to declared observed objects, evaluates the body with the
//!    node active on the context, and recurses into body and children with a
//!    fresh sibling counter scope.
//!
//! Nodes whose identifier was not reached are destroyed afterwards.
//!
//! The walk keeps its working memory on the [`Reconciler`] between updates:
//! the identifier maps are double-buffered, the identifier under
//! construction is a single path that grows and shrinks with the recursion,
//! and pending children share one stack. Once those buffers have grown to
//! the size of the tree, an update of an unchanged tree through
//! [`update_into`](Reconciler::update_into) does not allocate.
//!
//! If a body or configure call fails, the walk stops and the error is
//! returned. Nodes visited so far keep their new state, nodes not yet
//! visited stay in the identifier map and are put back in their parent's
//! child list, and the consumed dirty set is put back for the next attempt.

use alloc::vec::Vec;

use hashbrown::{HashMap, HashSet};

use super::{Phase, Reconciler};
use crate::config::EnvironmentCheck;
use crate::context::ReconcilerContext;
use crate::element::{AnyElement, BuildScope};
use crate::environment::{Environment, EnvironmentValues, Origin, link_parent};
use crate::error::Error;
use crate::identity::{SiblingCounters, StructuralIdentifier};
use crate::node::{INVALID, NodeId, NodeStore, TraversalEvent};
use crate::observed::Observations;
use crate::state::StateSlots;
use crate::trace::{PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer, UpdateSummary};

#[cfg(feature = "trace-rich")]
use crate::trace::{NodeEvent, NodeEventKind};

/// The outcome of a single [`Reconciler::update`] call.
///
/// `created`, `reused`, and `invalidated` hold node handles in walk
/// (pre-)order. `removed` holds the identifiers of destroyed nodes in slot
/// order, since their handles no longer resolve.
#[derive(Clone, Debug, Default)]
pub struct UpdateChanges {
    /// Nodes created by the update.
    pub created: Vec<NodeId>,
    /// Nodes kept without change.
    pub reused: Vec<NodeId>,
    /// Nodes kept and flagged for setup.
    pub invalidated: Vec<NodeId>,
    /// Identifiers whose node was destroyed.
    pub removed: Vec<StructuralIdentifier>,
    /// Whether nodes were created or destroyed.
    pub topology_changed: bool,
}

impl UpdateChanges {
    /// Clears all change lists, keeping their capacity.
    pub fn clear(&mut self) {
        self.created.clear();
        self.reused.clear();
        self.invalidated.clear();
        self.removed.clear();
        self.topology_changed = false;
    }
}

impl Reconciler {
    /// Reconciles the node tree against a new element tree.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by an element's `body` or `configure`.
    ///
    /// # Panics
    ///
    /// Panics if two siblings share a type and an explicit key, or if the
    /// identifier map refers to a destroyed node.
    pub fn update(&mut self, root: impl Into<AnyElement>) -> Result<UpdateChanges, Error> {
        let mut changes = UpdateChanges::default();
        self.update_into(root, &mut changes, &mut Tracer::none())?;
        Ok(changes)
    }

    /// Like [`update`](Self::update), but reuses a caller-provided buffer and
    /// reports to `tracer`.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update). `changes` describes the partial walk.
    pub fn update_into(
        &mut self,
        root: impl Into<AnyElement>,
        changes: &mut UpdateChanges,
        tracer: &mut Tracer<'_>,
    ) -> Result<(), Error> {
        changes.clear();
        self.cycle += 1;
        let cycle = self.cycle;
        self.phase = Phase::Reconciling;
        tracer.phase_begin(&PhaseBeginEvent {
            cycle,
            phase: PhaseKind::Reconcile,
        });

        let scope = self.cx.enter();
        let dirty = self.cx.take_dirty();
        let dirty_consumed = count_set(&dirty);
        let mut path = core::mem::take(&mut self.path);
        path.clear();
        let mut stack = core::mem::take(&mut self.stack);
        stack.clear();

        let mut walk = Walk {
            previous: core::mem::take(&mut self.map),
            next: core::mem::take(&mut self.spare),
            path,
            stack,
            store: &mut self.store,
            cx: &self.cx,
            check: self.config.environment_check,
            dirty: &dirty,
            changes: &mut *changes,
            tracer: &mut *tracer,
            root: INVALID,
            #[cfg(feature = "trace-rich")]
            cycle,
        };
        let result = walk.visit(root.into(), INVALID, &mut SiblingCounters::default());

        let Walk {
            mut previous,
            mut next,
            path,
            mut stack,
            root,
            ..
        } = walk;
        stack.clear();
        self.path = path;
        self.stack = stack;
        if root != INVALID {
            self.root = root;
        }

        match &result {
            Ok(()) => {
                self.doomed.extend(previous.drain());
                self.doomed.sort_unstable_by_key(|(_, id)| *id);
                for (identifier, id) in self.doomed.drain(..) {
                    #[cfg(feature = "trace-rich")]
                    tracer.node(&NodeEvent {
                        cycle,
                        node: id,
                        kind: NodeEventKind::Removed,
                    });
                    self.cx.unregister(id);
                    self.store.destroy_node(id);
                    changes.removed.push(identifier);
                }
                self.cx.recycle_dirty(dirty);
            }
            Err(_) => {
                relink_unvisited(&mut self.store, &self.events, &next);
                next.extend(previous.drain());
                self.cx.restore_dirty(dirty);
            }
        }
        self.map = next;
        self.spare = previous;
        changes.topology_changed = !changes.created.is_empty() || !changes.removed.is_empty();
        drop(scope);

        self.store.collect_events(self.root, &mut self.events);
        self.phase = Phase::Idle;
        if result.is_ok() {
            tracer.update_summary(&UpdateSummary {
                cycle,
                created: count(&changes.created),
                reused: count(&changes.reused),
                invalidated: count(&changes.invalidated),
                removed: count(&changes.removed),
                dirty_consumed,
                node_count: u32::try_from(self.map.len()).unwrap_or(u32::MAX),
            });
        }
        tracer.phase_end(&PhaseEndEvent {
            cycle,
            phase: PhaseKind::Reconcile,
        });
        result
    }
}

/// Puts nodes a failed walk never reached back under their parent.
///
/// A visited node's child list is rebuilt from scratch, so its unvisited
/// children fall out of it. `events` is the traversal of the last good tree;
/// replaying it appends them after the visited ones in their old order.
/// Children of unvisited nodes were never unlinked.
fn relink_unvisited(
    store: &mut NodeStore,
    events: &[TraversalEvent],
    visited: &HashMap<StructuralIdentifier, NodeId>,
) {
    for event in events {
        let TraversalEvent::Enter { node, .. } = *event else {
            continue;
        };
        let idx = node.index();
        let parent = store.parent[idx as usize];
        if parent != INVALID
            && !visited.contains_key(&store.identifier[idx as usize])
            && visited.contains_key(&store.identifier[parent as usize])
        {
            store.append_child(parent, idx);
        }
    }
}

fn count<T>(items: &[T]) -> u32 {
    u32::try_from(items.len()).unwrap_or(u32::MAX)
}

fn count_set<T>(items: &HashSet<T>) -> u32 {
    u32::try_from(items.len()).unwrap_or(u32::MAX)
}

/// State of one update walk.
struct Walk<'a, 't> {
    store: &'a mut NodeStore,
    cx: &'a ReconcilerContext,
    check: EnvironmentCheck,
    dirty: &'a HashSet<StructuralIdentifier>,
    previous: HashMap<StructuralIdentifier, NodeId>,
    next: HashMap<StructuralIdentifier, NodeId>,
    /// Identifier of the node being visited.
    path: StructuralIdentifier,
    /// Children waiting to be visited, each parent's in reverse above its
    /// ancestors'.
    stack: Vec<AnyElement>,
    changes: &'a mut UpdateChanges,
    tracer: &'a mut Tracer<'t>,
    root: u32,
    #[cfg(feature = "trace-rich")]
    cycle: u64,
}

impl Walk<'_, '_> {
    fn visit(
        &mut self,
        mut element: AnyElement,
        parent: u32,
        counters: &mut SiblingCounters,
    ) -> Result<(), Error> {
        self.path
            .push(counters.atom(element.element_type(), element.key()));
        assert!(
            !self.next.contains_key(&self.path),
            "duplicate structural identifier `{}`: siblings of one type need distinct keys",
            self.path
        );

        let (id, created) = match self.previous.remove_entry(&self.path) {
            Some((identifier, id)) => {
                assert!(
                    self.store.is_alive(id),
                    "structural identifier `{identifier}` matched no live node"
                );
                self.next.insert(identifier, id);
                (id, false)
            }
            None => {
                let id = self.store.create_node(self.path.clone());
                self.cx.register(id, self.path.clone());
                self.next.insert(self.path.clone(), id);
                (id, true)
            }
        };
        let i = id.index();
        let idx = i as usize;
        if parent == INVALID {
            self.root = i;
        }

        // Topology and environment linkage.
        self.store.append_child(parent, i);
        self.store.clear_children(i);
        link_parent(&mut self.store.environment, i, parent, self.check);

        element
            .element_mut()
            .declare_state(&mut StateSlots::new(&mut self.store.state[idx]));

        if created {
            self.record(id, Outcome::Created);
        } else {
            let changed = self.dirty.contains(&self.path)
                || self.store.element[idx]
                    .as_ref()
                    .is_none_or(|previous| element.requires_setup(previous));
            if changed {
                self.store.needs_setup[idx] = true;
                self.record(id, Outcome::Invalidated);
            } else {
                self.record(id, Outcome::Reused);
            }
            self.store.environment[idx].retain_behavior_values();
        }

        let store = &mut *self.store;
        store.previous[idx] = store.element[idx].take();
        let element = store.element[idx].insert(element);

        element.as_element().configure(&mut EnvironmentValues::new(
            &mut store.environment,
            i,
            Origin::Modifier,
        ))?;
        element
            .as_element()
            .declare_observed(&mut Observations::new(id, self.cx, &mut store.subscriptions[idx]));

        self.cx.push_active(id);
        let body = element.as_element().body(&BuildScope {
            id,
            identifier: &self.path,
            environment: Environment::new(&store.environment, i),
            cx: self.cx,
        });
        self.cx.pop_active();

        let base = self.stack.len();
        self.stack.extend(body?);
        element.element_mut().take_children(&mut self.stack);
        // Reversed so popping yields children in order.
        self.stack[base..].reverse();

        let mut counters = SiblingCounters::default();
        while self.stack.len() > base {
            if let Some(child) = self.stack.pop() {
                self.visit(child, i, &mut counters)?;
            }
        }
        self.path.pop();
        Ok(())
    }

    fn record(&mut self, id: NodeId, outcome: Outcome) {
        let list = match outcome {
            Outcome::Created => &mut self.changes.created,
            Outcome::Reused => &mut self.changes.reused,
            Outcome::Invalidated => &mut self.changes.invalidated,
        };
        list.push(id);
        #[cfg(feature = "trace-rich")]
        self.tracer.node(&NodeEvent {
            cycle: self.cycle,
            node: id,
            kind: match outcome {
                Outcome::Created => NodeEventKind::Created,
                Outcome::Reused => NodeEventKind::Reused,
                Outcome::Invalidated => NodeEventKind::Invalidated,
            },
        });
        #[cfg(not(feature = "trace-rich"))]
        {
            _ = &self.tracer;
        }
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Created,
    Reused,
    Invalidated,
}
