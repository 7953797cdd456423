// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The two-phase traversal executor.
//!
//! Both walks replay the enter/exit events built by the last update. The
//! setup walk only calls into nodes flagged `needs_setup` (or every node
//! after [`mark_all_needing_setup`](Reconciler::mark_all_needing_setup)) and
//! clears the flag at the node's exit. The workload walk calls into every
//! node.
//!
//! A callback error stops the walk and is returned. Nodes already set up
//! keep their cleared flag; the rest stay flagged.

use super::{Phase, Reconciler};
use crate::context::ReconcilerContext;
use crate::element::{AnyElement, NodeScope};
use crate::environment::{EnvironmentValues, Origin};
use crate::error::Error;
use crate::node::{NodeId, NodeStore, TraversalEvent};
use crate::trace::{PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer};

#[cfg(feature = "trace-rich")]
use crate::trace::{CallbackEvent, CallbackKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hook {
    SetupEnter,
    SetupExit,
    WorkloadEnter,
    WorkloadExit,
}

#[cfg(feature = "trace-rich")]
impl From<Hook> for CallbackKind {
    fn from(hook: Hook) -> Self {
        match hook {
            Hook::SetupEnter => Self::SetupEnter,
            Hook::SetupExit => Self::SetupExit,
            Hook::WorkloadEnter => Self::WorkloadEnter,
            Hook::WorkloadExit => Self::WorkloadExit,
        }
    }
}

impl Reconciler {
    /// Runs the setup callbacks of every node that needs them.
    ///
    /// # Errors
    ///
    /// Returns the first callback error; the remaining nodes are not visited.
    pub fn process_setup(&mut self) -> Result<(), Error> {
        self.process_setup_traced(&mut Tracer::none())
    }

    /// Like [`process_setup`](Self::process_setup), reporting to `tracer`.
    ///
    /// # Errors
    ///
    /// See [`process_setup`](Self::process_setup).
    pub fn process_setup_traced(&mut self, tracer: &mut Tracer<'_>) -> Result<(), Error> {
        self.phase = Phase::Setup;
        tracer.phase_begin(&PhaseBeginEvent {
            cycle: self.cycle,
            phase: PhaseKind::Setup,
        });
        let result = self.walk_setup(tracer);
        if result.is_ok() {
            self.full_setup = false;
        }
        self.phase = Phase::Idle;
        tracer.phase_end(&PhaseEndEvent {
            cycle: self.cycle,
            phase: PhaseKind::Setup,
        });
        result
    }

    /// Runs the workload callbacks of every node.
    ///
    /// # Errors
    ///
    /// Returns the first callback error; the remaining nodes are not visited.
    pub fn process_workload(&mut self) -> Result<(), Error> {
        self.process_workload_traced(&mut Tracer::none())
    }

    /// Like [`process_workload`](Self::process_workload), reporting to
    /// `tracer`.
    ///
    /// # Errors
    ///
    /// See [`process_workload`](Self::process_workload).
    pub fn process_workload_traced(&mut self, tracer: &mut Tracer<'_>) -> Result<(), Error> {
        self.phase = Phase::Workload;
        tracer.phase_begin(&PhaseBeginEvent {
            cycle: self.cycle,
            phase: PhaseKind::Workload,
        });
        let result = self.walk_workload(tracer);
        self.phase = Phase::Idle;
        tracer.phase_end(&PhaseEndEvent {
            cycle: self.cycle,
            phase: PhaseKind::Workload,
        });
        result
    }

    fn walk_setup(&mut self, tracer: &mut Tracer<'_>) -> Result<(), Error> {
        let _scope = self.cx.enter();
        let full = self.full_setup;
        for k in 0..self.events.len() {
            match self.events[k] {
                TraversalEvent::Enter { node, depth } => {
                    if full || self.store.needs_setup[node.index() as usize] {
                        self.invoke(node, depth, Hook::SetupEnter, tracer)?;
                    }
                }
                TraversalEvent::Exit { node, depth } => {
                    let idx = node.index() as usize;
                    if full || self.store.needs_setup[idx] {
                        self.invoke(node, depth, Hook::SetupExit, tracer)?;
                        self.store.needs_setup[idx] = false;
                    }
                }
            }
        }
        Ok(())
    }

    fn walk_workload(&mut self, tracer: &mut Tracer<'_>) -> Result<(), Error> {
        let _scope = self.cx.enter();
        for k in 0..self.events.len() {
            match self.events[k] {
                TraversalEvent::Enter { node, depth } => {
                    self.invoke(node, depth, Hook::WorkloadEnter, tracer)?;
                }
                TraversalEvent::Exit { node, depth } => {
                    self.invoke(node, depth, Hook::WorkloadExit, tracer)?;
                }
            }
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        node: NodeId,
        depth: u32,
        hook: Hook,
        tracer: &mut Tracer<'_>,
    ) -> Result<(), Error> {
        let ran = call_behavior(&mut self.store, &self.cx, node, depth, hook)?;
        #[cfg(feature = "trace-rich")]
        if ran {
            tracer.callback(&CallbackEvent {
                cycle: self.cycle,
                node,
                depth,
                callback: hook.into(),
            });
        }
        #[cfg(not(feature = "trace-rich"))]
        {
            _ = (ran, tracer);
        }
        Ok(())
    }
}

/// Calls one lifecycle callback of `node` with the node active. Returns
/// whether the node has a behavior.
fn call_behavior(
    store: &mut NodeStore,
    cx: &ReconcilerContext,
    node: NodeId,
    depth: u32,
    hook: Hook,
) -> Result<bool, Error> {
    let i = node.index();
    let idx = i as usize;
    let Some(behavior) = store.element[idx].as_ref().and_then(AnyElement::behavior) else {
        return Ok(false);
    };
    let mut scope = NodeScope {
        id: node,
        identifier: &store.identifier[idx],
        depth,
        environment: EnvironmentValues::new(&mut store.environment, i, Origin::Behavior),
        cx,
    };
    cx.push_active(node);
    let result = match hook {
        Hook::SetupEnter => behavior.setup_enter(&mut scope),
        Hook::SetupExit => behavior.setup_exit(&mut scope),
        Hook::WorkloadEnter => behavior.workload_enter(&mut scope),
        Hook::WorkloadExit => behavior.workload_exit(&mut scope),
    };
    cx.pop_active();
    result.map(|()| true)
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    use super::*;
    use crate::element::{Behavior, Element};
    use crate::environment::EnvironmentKey;
    use crate::modifier::{ElementExt, Group};

    type Log = Rc<RefCell<Vec<String>>>;

    /// Logs every callback as `<name> <callback>`.
    struct Pass {
        name: &'static str,
        log: Log,
        children: Vec<AnyElement>,
    }

    fn pass(name: &'static str, log: &Log) -> Pass {
        Pass {
            name,
            log: Rc::clone(log),
            children: Vec::new(),
        }
    }

    impl Pass {
        fn child(mut self, child: Pass) -> Self {
            self.children.push(child.into());
            self
        }

        fn note(&self, what: &str) {
            self.log
                .borrow_mut()
                .push(alloc::format!("{} {what}", self.name));
        }
    }

    impl Element for Pass {
        fn take_children(&mut self, children: &mut Vec<AnyElement>) {
            children.append(&mut self.children);
        }

        fn behavior(&self) -> Option<&dyn Behavior> {
            Some(self)
        }

        fn requires_setup(&self, previous: &Self) -> bool {
            self.name != previous.name
        }
    }

    impl Behavior for Pass {
        fn setup_enter(&self, _scope: &mut NodeScope<'_>) -> Result<(), Error> {
            self.note("setup-enter");
            Ok(())
        }

        fn setup_exit(&self, _scope: &mut NodeScope<'_>) -> Result<(), Error> {
            self.note("setup-exit");
            Ok(())
        }

        fn workload_enter(&self, _scope: &mut NodeScope<'_>) -> Result<(), Error> {
            self.note("enter");
            Ok(())
        }

        fn workload_exit(&self, _scope: &mut NodeScope<'_>) -> Result<(), Error> {
            self.note("exit");
            Ok(())
        }
    }

    fn tree(log: &Log) -> Pass {
        pass("root", log)
            .child(pass("A", log).child(pass("A.c", log)))
            .child(pass("B", log))
    }

    fn drain(log: &Log) -> Vec<String> {
        core::mem::take(&mut *log.borrow_mut())
    }

    #[test]
    fn workload_is_depth_first_enter_exit() {
        let log: Log = Rc::default();
        let mut r = Reconciler::new();
        r.update(tree(&log)).unwrap();
        r.process_workload().unwrap();
        assert_eq!(
            drain(&log),
            vec![
                "root enter",
                "A enter",
                "A.c enter",
                "A.c exit",
                "A exit",
                "B enter",
                "B exit",
                "root exit",
            ]
        );
    }

    #[test]
    fn setup_runs_once_per_change() {
        let log: Log = Rc::default();
        let mut r = Reconciler::new();
        r.update(tree(&log)).unwrap();
        r.process_setup().unwrap();
        assert_eq!(
            drain(&log),
            vec![
                "root setup-enter",
                "A setup-enter",
                "A.c setup-enter",
                "A.c setup-exit",
                "A setup-exit",
                "B setup-enter",
                "B setup-exit",
                "root setup-exit",
            ]
        );

        r.process_setup().unwrap();
        assert!(drain(&log).is_empty());

        r.update(tree(&log)).unwrap();
        r.process_setup().unwrap();
        assert!(drain(&log).is_empty());
    }

    #[test]
    fn setup_skips_unflagged_nodes() {
        let log: Log = Rc::default();
        let mut r = Reconciler::new();
        r.update(tree(&log)).unwrap();
        r.process_setup().unwrap();
        drain(&log);

        let changed = pass("root", &log)
            .child(pass("A", &log).child(pass("A.d", &log)))
            .child(pass("B", &log));
        r.update(changed).unwrap();
        r.process_setup().unwrap();
        assert_eq!(drain(&log), vec!["A.d setup-enter", "A.d setup-exit"]);
    }

    struct Failing;

    impl Element for Failing {
        fn behavior(&self) -> Option<&dyn Behavior> {
            Some(self)
        }
    }

    impl Behavior for Failing {
        fn setup_enter(&self, _scope: &mut NodeScope<'_>) -> Result<(), Error> {
            Err(Error::resource("out of buffers"))
        }
    }

    #[test]
    fn callback_error_stops_walk() {
        let log: Log = Rc::default();
        let mut r = Reconciler::new();
        r.update(Group::new().with(pass("A", &log)).with(Failing).with(pass("B", &log)))
            .unwrap();
        r.mark_all_needing_setup();
        let err = r.process_setup().unwrap_err();
        assert!(matches!(err, Error::ResourceCreation(_)));
        assert_eq!(drain(&log), vec!["A setup-enter", "A setup-exit"]);
        assert_eq!(r.phase(), Phase::Idle);
        assert!(r.full_setup_pending());
        assert!(!r.needs_setup(r.node_at(&[0]).unwrap()));
        assert!(r.needs_setup(r.node_at(&[2]).unwrap()));
    }

    struct Buffer;
    impl EnvironmentKey for Buffer {
        type Value = u32;
    }

    struct Allocates;

    impl Element for Allocates {
        fn behavior(&self) -> Option<&dyn Behavior> {
            Some(self)
        }
    }

    impl Behavior for Allocates {
        fn setup_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
            let next = scope.environment().get::<Buffer>().unwrap_or(0) + 1;
            scope.environment().set::<Buffer>(next);
            Ok(())
        }
    }

    #[test]
    fn behavior_environment_writes_survive_updates() {
        let mut r = Reconciler::new();
        r.cycle(Allocates.environment::<Buffer>(10)).unwrap();
        let leaf = r.node_at(&[0]).unwrap();
        assert_eq!(r.environment(leaf).get::<Buffer>(), Some(11));
        assert!(r.environment(leaf).contains_local::<Buffer>());

        // `Allocates` always requires setup, and its resource is kept across
        // the re-run.
        r.cycle(Allocates.environment::<Buffer>(10)).unwrap();
        assert_eq!(r.environment(leaf).get::<Buffer>(), Some(12));
    }

    #[test]
    fn scope_reports_node_and_depth() {
        struct Where(Rc<RefCell<Vec<(String, u32)>>>);
        impl Element for Where {
            fn behavior(&self) -> Option<&dyn Behavior> {
                Some(self)
            }
        }
        impl Behavior for Where {
            fn workload_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
                assert_eq!(scope.cx().current_node(), Some(scope.id()));
                self.0
                    .borrow_mut()
                    .push((alloc::format!("{}", scope.identifier()), scope.depth()));
                Ok(())
            }
        }

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut r = Reconciler::new();
        r.update(Group::new().with(Where(Rc::clone(&seen)))).unwrap();
        r.process_workload().unwrap();
        assert_eq!(*seen.borrow(), vec![(String::from("Group#0/Where#0"), 1)]);
    }

    #[cfg(feature = "trace-rich")]
    #[test]
    fn callbacks_are_traced() {
        use crate::trace::TraceSink;

        #[derive(Default)]
        struct Calls(Vec<(u32, CallbackKind)>);
        impl TraceSink for Calls {
            fn on_callback(&mut self, e: &CallbackEvent) {
                self.0.push((e.depth, e.callback));
            }
        }

        let log: Log = Rc::default();
        let mut r = Reconciler::new();
        r.update(pass("root", &log).child(pass("leaf", &log)))
            .unwrap();
        let mut sink = Calls::default();
        r.process_workload_traced(&mut Tracer::new(&mut sink))
            .unwrap();
        assert_eq!(
            sink.0,
            vec![
                (0, CallbackKind::WorkloadEnter),
                (1, CallbackKind::WorkloadEnter),
                (1, CallbackKind::WorkloadExit),
                (0, CallbackKind::WorkloadExit),
            ]
        );
    }
}
