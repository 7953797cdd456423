// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reconciler: update pass, traversal executor, and introspection.
//!
//! A [`Reconciler`] owns the [`NodeStore`], the identifier → node map of the
//! last successful update, the ordered traversal events, and the
//! [`ReconcilerContext`]. Each cycle has three steps:
//!
//! 1. [`update`](Reconciler::update) walks a freshly built element tree,
//!    reusing nodes whose [`StructuralIdentifier`] survived and creating or
//!    destroying the rest (see [`UpdateChanges`]).
//! 2. [`process_setup`](Reconciler::process_setup) runs the setup callbacks
//!    of nodes flagged `needs_setup`.
//! 3. [`process_workload`](Reconciler::process_workload) runs the workload
//!    callbacks of every node.
//!
//! Both walks visit nodes depth first: a node's enter callback precedes its
//! subtree, its exit callback follows it, and sibling `i` completes before
//! sibling `i + 1` starts.

mod process;
mod update;

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::config::ReconcilerConfig;
use crate::context::ReconcilerContext;
use crate::element::{AnyElement, Element};
use crate::environment::Environment;
use crate::error::Error;
use crate::identity::StructuralIdentifier;
use crate::node::{Children, INVALID, NodeId, NodeStore, TraversalEvent};
use crate::state::{self, State};

pub use update::UpdateChanges;

/// Where the reconciler is in its cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No pass is running.
    #[default]
    Idle,
    /// An update is matching elements to nodes.
    Reconciling,
    /// The setup walk is running.
    Setup,
    /// The workload walk is running.
    Workload,
}

/// Retained node tree driven by successive element trees.
#[derive(Debug)]
pub struct Reconciler {
    store: NodeStore,
    map: HashMap<StructuralIdentifier, NodeId>,
    events: Vec<TraversalEvent>,
    // Update scratch, kept across updates.
    spare: HashMap<StructuralIdentifier, NodeId>,
    path: StructuralIdentifier,
    stack: Vec<AnyElement>,
    doomed: Vec<(StructuralIdentifier, NodeId)>,
    cx: ReconcilerContext,
    config: ReconcilerConfig,
    full_setup: bool,
    phase: Phase,
    cycle: u64,
    root: u32,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    /// Creates an empty reconciler with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::new())
    }

    /// Creates an empty reconciler.
    #[must_use]
    pub fn with_config(config: ReconcilerConfig) -> Self {
        Self {
            store: NodeStore::with_capacity(config.node_capacity),
            map: HashMap::with_capacity(config.node_capacity),
            events: Vec::with_capacity(config.node_capacity * 2),
            spare: HashMap::with_capacity(config.node_capacity),
            path: StructuralIdentifier::new(),
            stack: Vec::new(),
            doomed: Vec::new(),
            cx: ReconcilerContext::new(),
            config,
            full_setup: false,
            phase: Phase::Idle,
            cycle: 0,
            root: INVALID,
        }
    }

    /// Runs [`update`](Self::update), then setup, then workload.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any of the three steps; later steps
    /// do not run.
    pub fn cycle(&mut self, root: impl Into<AnyElement>) -> Result<UpdateChanges, Error> {
        let changes = self.update(root)?;
        self.process_setup()?;
        self.process_workload()?;
        Ok(changes)
    }

    /// Makes the next setup walk visit every node, whether flagged or not.
    ///
    /// Useful when something outside the tree (such as a resize) invalidates
    /// every resource.
    pub fn mark_all_needing_setup(&mut self) {
        self.full_setup = true;
    }

    /// Returns whether the next setup walk will visit every node.
    #[must_use]
    pub fn full_setup_pending(&self) -> bool {
        self.full_setup
    }

    /// Runs `f` with a context scope open, so application code can write
    /// state outside of a traversal.
    pub fn with_context<R>(&self, f: impl FnOnce(&ReconcilerContext) -> R) -> R {
        let _scope = self.cx.enter();
        f(&self.cx)
    }

    // -- Queries --

    /// Returns the reconciler's context handle.
    #[must_use]
    pub fn context(&self) -> &ReconcilerContext {
        &self.cx
    }

    /// Returns the configuration the reconciler was created with.
    #[must_use]
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Returns where the reconciler is in its cycle.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the number of updates started so far.
    #[must_use]
    pub fn cycle_index(&self) -> u64 {
        self.cycle
    }

    /// Returns the node store.
    #[must_use]
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Returns the root node, if an update has created one.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        (self.root != INVALID && self.store.alive[self.root as usize])
            .then(|| self.store.id_at(self.root))
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns whether the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the node at `identifier`.
    #[must_use]
    pub fn node(&self, identifier: &StructuralIdentifier) -> Option<NodeId> {
        self.map.get(identifier).copied()
    }

    /// Returns a node's structural identifier.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn identifier(&self, id: NodeId) -> &StructuralIdentifier {
        self.store.identifier(id)
    }

    /// Returns a node's parent.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.store.parent(id)
    }

    /// Returns a node's children in order.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        self.store.children(id)
    }

    /// Returns whether the node will run its setup callbacks in the next
    /// setup walk.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn needs_setup(&self, id: NodeId) -> bool {
        self.store.needs_setup(id)
    }

    /// Returns whether a state write or notification has marked the node
    /// for re-evaluation in the next update.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn is_dirty(&self, id: NodeId) -> bool {
        self.cx.is_dirty(self.store.identifier(id))
    }

    /// Returns the nodes in depth-first pre-order.
    pub fn traversal_order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.events.iter().filter_map(|e| match *e {
            TraversalEvent::Enter { node, .. } => Some(node),
            TraversalEvent::Exit { .. } => None,
        })
    }

    /// Returns the enter/exit events both walks replay.
    #[must_use]
    pub fn traversal_events(&self) -> &[TraversalEvent] {
        &self.events
    }

    /// Returns the node's current element as `E`.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn element<E: Element>(&self, id: NodeId) -> Option<&E> {
        self.store.element(id)?.downcast_ref::<E>()
    }

    /// Follows child indices from the root. An empty path names the root.
    #[must_use]
    pub fn node_at(&self, path: &[usize]) -> Option<NodeId> {
        let mut node = self.root()?;
        for &index in path {
            node = self.store.children(node).nth(index)?;
        }
        Some(node)
    }

    /// Returns the identifier of the node at a child-index path.
    #[must_use]
    pub fn identifier_at(&self, path: &[usize]) -> Option<&StructuralIdentifier> {
        self.node_at(path).map(|id| self.store.identifier(id))
    }

    /// Returns the element of the node at a child-index path as `E`.
    #[must_use]
    pub fn element_at<E: Element>(&self, path: &[usize]) -> Option<&E> {
        self.element(self.node_at(path)?)
    }

    /// Returns a read-only view of a node's environment.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn environment(&self, id: NodeId) -> Environment<'_> {
        self.store.environment(id)
    }

    /// Returns the state box a node stores under `name`, if it holds a `T`.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn state<T: 'static>(&self, id: NodeId, name: &str) -> Option<State<T>> {
        self.store.validate(id);
        state::lookup(&self.store.state[id.index() as usize], name)
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};

    use super::*;
    use crate::element::{Behavior, BuildScope, NodeScope};
    use crate::modifier::{ElementExt, Empty, Group};
    use crate::state::{Binding, StateSlots};

    type Log = Rc<RefCell<Vec<String>>>;

    /// A counter whose body shows the count and whose child increments it.
    struct Counter {
        count: State<i32>,
        log: Log,
    }

    impl Counter {
        fn new(log: &Log) -> Self {
            Self {
                count: State::new(0),
                log: Rc::clone(log),
            }
        }
    }

    impl Element for Counter {
        fn declare_state(&mut self, slots: &mut StateSlots<'_>) {
            slots.slot("count", &mut self.count);
        }

        fn body(&self, scope: &BuildScope<'_>) -> Result<Option<AnyElement>, Error> {
            let count = self.count.get(scope.cx());
            Ok(Some(
                Label {
                    text: alloc::format!("count {count}"),
                    log: Rc::clone(&self.log),
                }
                .into(),
            ))
        }

        fn requires_setup(&self, previous: &Self) -> bool {
            self.count != previous.count
        }
    }

    struct Label {
        text: String,
        log: Log,
    }

    impl Element for Label {
        fn behavior(&self) -> Option<&dyn Behavior> {
            Some(self)
        }

        fn requires_setup(&self, previous: &Self) -> bool {
            self.text != previous.text
        }
    }

    impl Behavior for Label {
        fn setup_enter(&self, _scope: &mut NodeScope<'_>) -> Result<(), Error> {
            self.log.borrow_mut().push(alloc::format!("setup {}", self.text));
            Ok(())
        }

        fn workload_enter(&self, _scope: &mut NodeScope<'_>) -> Result<(), Error> {
            self.log.borrow_mut().push(alloc::format!("draw {}", self.text));
            Ok(())
        }
    }

    fn drain(log: &Log) -> Vec<String> {
        core::mem::take(&mut *log.borrow_mut())
    }

    #[test]
    fn counter_end_to_end() {
        let log: Log = Rc::default();
        let mut r = Reconciler::new();

        let changes = r.cycle(Counter::new(&log)).unwrap();
        assert_eq!(changes.created.len(), 2);
        assert_eq!(drain(&log), vec!["setup count 0", "draw count 0"]);

        let root = r.root().unwrap();
        let count = r.state::<i32>(root, "count").unwrap();
        r.with_context(|cx| count.set(cx, 1));
        assert!(r.is_dirty(root));

        let changes = r.cycle(Counter::new(&log)).unwrap();
        assert!(changes.created.is_empty());
        assert_eq!(changes.invalidated.len(), 2);
        assert_eq!(drain(&log), vec!["setup count 1", "draw count 1"]);
        assert!(!r.is_dirty(root));

        // Nothing changed: no setup, workload still runs.
        let changes = r.cycle(Counter::new(&log)).unwrap();
        assert_eq!(changes.reused.len(), 2);
        assert_eq!(drain(&log), vec!["draw count 1"]);
    }

    /// Counter app: a readout of the count, a caption that never reads it,
    /// and a button whose workload writes through a binding when pressed.
    struct Tally {
        count: State<i32>,
        pressed: Rc<Cell<bool>>,
        log: Log,
    }

    impl Tally {
        fn new(pressed: &Rc<Cell<bool>>, log: &Log) -> Self {
            Self {
                count: State::new(0),
                pressed: Rc::clone(pressed),
                log: Rc::clone(log),
            }
        }
    }

    impl Element for Tally {
        fn declare_state(&mut self, slots: &mut StateSlots<'_>) {
            slots.slot("count", &mut self.count);
        }

        fn body(&self, scope: &BuildScope<'_>) -> Result<Option<AnyElement>, Error> {
            let current = self.count.peek(scope.cx());
            Ok(Some(
                Group::new()
                    .with(Readout {
                        count: self.count.clone(),
                        log: Rc::clone(&self.log),
                    })
                    .with(Label {
                        text: "caption".into(),
                        log: Rc::clone(&self.log),
                    })
                    .with(Button {
                        next: current + 1,
                        value: self.count.binding(),
                        pressed: Rc::clone(&self.pressed),
                    })
                    .into(),
            ))
        }

        fn requires_setup(&self, _previous: &Self) -> bool {
            false
        }
    }

    struct Readout {
        count: State<i32>,
        log: Log,
    }

    impl Element for Readout {
        fn body(&self, scope: &BuildScope<'_>) -> Result<Option<AnyElement>, Error> {
            let count = self.count.get(scope.cx());
            Ok((count > 0).then(|| Badge.into()))
        }

        fn behavior(&self) -> Option<&dyn Behavior> {
            Some(self)
        }

        fn requires_setup(&self, previous: &Self) -> bool {
            self.count != previous.count
        }
    }

    impl Behavior for Readout {
        fn setup_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
            let count = self.count.peek(scope.cx());
            self.log.borrow_mut().push(alloc::format!("setup readout {count}"));
            Ok(())
        }
    }

    struct Badge;

    impl Element for Badge {}

    struct Button {
        next: i32,
        value: Binding<i32>,
        pressed: Rc<Cell<bool>>,
    }

    impl Element for Button {
        fn behavior(&self) -> Option<&dyn Behavior> {
            Some(self)
        }

        fn requires_setup(&self, _previous: &Self) -> bool {
            false
        }
    }

    impl Behavior for Button {
        fn workload_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
            if self.pressed.replace(false) {
                self.value.set(scope.cx(), self.next);
            }
            Ok(())
        }
    }

    #[test]
    fn button_increment_invalidates_only_the_reader() {
        let log: Log = Rc::default();
        let pressed = Rc::new(Cell::new(false));
        let mut r = Reconciler::new();

        let changes = r.cycle(Tally::new(&pressed, &log)).unwrap();
        assert_eq!(changes.created.len(), 5);
        assert_eq!(
            drain(&log),
            vec!["setup readout 0", "setup caption", "draw caption"]
        );
        let root = r.root().unwrap();
        let readout = r.node_at(&[0, 0]).unwrap();
        let caption = r.node_at(&[0, 1]).unwrap();
        let button = r.node_at(&[0, 2]).unwrap();

        // The press lands in the workload walk.
        pressed.set(true);
        r.process_workload().unwrap();
        assert_eq!(drain(&log), vec!["draw caption"]);
        assert!(r.is_dirty(readout));
        assert!(!r.is_dirty(root));
        assert!(!r.is_dirty(caption));
        assert!(!r.is_dirty(button));

        let changes = r.update(Tally::new(&pressed, &log)).unwrap();
        assert_eq!(changes.invalidated, vec![readout]);
        assert_eq!(changes.created.len(), 1);
        assert_eq!(
            alloc::format!("{}", r.identifier(changes.created[0])),
            "Tally#0/Group#0/Readout#0/Badge#0"
        );
        assert_eq!(r.node_at(&[0, 0, 0]), Some(changes.created[0]));
        assert!(r.needs_setup(readout));
        assert!(!r.needs_setup(caption));
        assert!(!r.needs_setup(button));
        assert!(!r.needs_setup(root));
        let count = r.state::<i32>(root, "count").unwrap();
        assert_eq!(r.with_context(|cx| count.peek(cx)), 1);

        r.process_setup().unwrap();
        assert_eq!(drain(&log), vec!["setup readout 1"]);
    }

    #[test]
    fn conditional_child_is_created_and_removed() {
        let build = |show: bool| Group::new().with(Empty).with(show.then_some(Empty));
        let mut r = Reconciler::new();
        r.update(build(false)).unwrap();
        assert_eq!(r.len(), 3);

        let changes = r.update(build(true)).unwrap();
        assert_eq!(changes.created.len(), 1);
        assert_eq!(r.len(), 4);
        assert!(changes.topology_changed);
        let inner = r.identifier_at(&[1, 0]).unwrap();
        assert_eq!(alloc::format!("{inner}"), "Group#0/Option#0/Empty#0");

        let changes = r.update(build(false)).unwrap();
        assert_eq!(changes.removed.len(), 1);
        assert_eq!(r.len(), 3);
        assert!(r.identifier_at(&[1, 0]).is_none());
    }

    #[test]
    fn path_queries_follow_children() {
        let mut r = Reconciler::new();
        assert!(r.node_at(&[]).is_none());
        r.update(Group::new().with(Empty).with(Empty.keyed("b")))
            .unwrap();
        assert!(r.element_at::<Group>(&[]).is_some());
        assert!(r.element_at::<Empty>(&[1]).is_some());
        assert_eq!(
            alloc::format!("{}", r.identifier_at(&[1]).unwrap()),
            "Group#0/Empty(\"b\")"
        );
        assert!(r.node_at(&[2]).is_none());
    }

    #[test]
    fn mark_all_reruns_every_setup() {
        let log: Log = Rc::default();
        let mut r = Reconciler::new();
        r.cycle(Counter::new(&log)).unwrap();
        drain(&log);

        r.mark_all_needing_setup();
        assert!(r.full_setup_pending());
        r.cycle(Counter::new(&log)).unwrap();
        assert_eq!(drain(&log), vec!["setup count 0", "draw count 0"]);
        assert!(!r.full_setup_pending());
    }

    #[test]
    fn phase_returns_to_idle() {
        let mut r = Reconciler::new();
        assert_eq!(r.phase(), Phase::Idle);
        r.cycle(Empty).unwrap();
        assert_eq!(r.phase(), Phase::Idle);
        assert_eq!(r.cycle_index(), 1);
    }

    #[test]
    fn with_context_opens_scope() {
        let r = Reconciler::new();
        assert!(!r.context().is_active());
        assert!(r.with_context(|cx| cx.is_active()));
        assert!(!r.context().is_active());
    }
}
