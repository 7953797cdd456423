// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured and textual dumps of the node tree.
//!
//! [`Reconciler::snapshot`] captures every node in traversal order with its
//! identifier, element type, flags, declared state (as `Debug` text plus the
//! identifiers of its dependents), and local environment key names.
//! [`Snapshot::text_dump`] renders an indented hierarchy; `umbra_debug`
//! serializes the same data as JSON. [`Reconciler::element_dump`] is the
//! short form: one line per element, nothing else.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::{self, Write as _};

use crate::node::TraversalEvent;
use crate::reconciler::Reconciler;
use crate::state;

/// One declared state slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Slot name.
    pub name: &'static str,
    /// `Debug` rendering of the current value.
    pub value: String,
    /// Identifiers of the live nodes that read the slot.
    pub dependents: Vec<String>,
}

/// One node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSnapshot {
    /// Structural identifier.
    pub identifier: String,
    /// Parent's structural identifier (`None` for the root).
    pub parent: Option<String>,
    /// Distance from the root.
    pub depth: u32,
    /// Short name of the element type.
    pub element_type: &'static str,
    /// Explicit key, if the element had one.
    pub key: Option<String>,
    /// Whether the next setup walk calls into the node.
    pub needs_setup: bool,
    /// Whether the node is in the dirty set.
    pub is_dirty: bool,
    /// Declared state slots in declaration order.
    pub state: Vec<StateSnapshot>,
    /// Names of locally stored environment keys, sorted.
    pub environment: Vec<&'static str>,
    /// Whether the node's environment has a parent link.
    pub inherits_environment: bool,
}

/// The whole tree at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Number of updates started when the snapshot was taken.
    pub cycle: u64,
    /// Nodes in depth-first pre-order.
    pub nodes: Vec<NodeSnapshot>,
    /// Dirty identifiers belonging to live nodes, sorted.
    pub dirty: Vec<String>,
}

impl Reconciler {
    /// Captures the current node tree.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let store = self.store();
        let mut nodes = Vec::with_capacity(self.len());
        for event in self.traversal_events() {
            let TraversalEvent::Enter { node, depth } = *event else {
                continue;
            };
            let element = store.element(node);
            let state = state::describe(&store.state[node.index() as usize])
                .map(|(name, value, dependents)| StateSnapshot {
                    name,
                    value,
                    dependents: dependents
                        .into_iter()
                        .filter(|id| store.is_alive(*id))
                        .map(|id| format!("{}", store.identifier(id)))
                        .collect(),
                })
                .collect();
            let environment = store.environment(node);
            nodes.push(NodeSnapshot {
                identifier: format!("{}", store.identifier(node)),
                parent: store
                    .parent(node)
                    .map(|p| format!("{}", store.identifier(p))),
                depth,
                element_type: element.map_or("?", |e| e.element_type().short_name()),
                key: element.and_then(|e| e.key()).map(|k| format!("{k}")),
                needs_setup: store.needs_setup(node),
                is_dirty: self.is_dirty(node),
                state,
                environment: environment.local_keys(),
                inherits_environment: store.environment[node.index() as usize]
                    .parent()
                    .is_some(),
            });
        }
        let mut dirty: Vec<String> = nodes
            .iter()
            .filter(|n| n.is_dirty)
            .map(|n| n.identifier.clone())
            .collect();
        dirty.sort();
        Snapshot {
            cycle: self.cycle_index(),
            nodes,
            dirty,
        }
    }
}

impl Reconciler {
    /// Renders the element tree of the last update, one indented type name
    /// per line.
    ///
    /// With `verbose`, each line also carries the node's identifier and
    /// whether its element has setup/workload callbacks.
    #[must_use]
    pub fn element_dump(&self, verbose: bool) -> String {
        let mut out = String::new();
        // Writing into a `String` cannot fail.
        let _ = self.write_elements(&mut out, verbose);
        out
    }

    fn write_elements(&self, out: &mut String, verbose: bool) -> fmt::Result {
        let store = self.store();
        for event in self.traversal_events() {
            let TraversalEvent::Enter { node, depth } = *event else {
                continue;
            };
            let Some(element) = store.element(node) else {
                continue;
            };
            let indent = "  ".repeat(depth as usize);
            write!(out, "{indent}{}", element.element_type().short_name())?;
            if verbose {
                write!(
                    out,
                    " [id: {}, behavior: {}]",
                    store.identifier(node),
                    element.behavior().is_some()
                )?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}

impl Snapshot {
    /// Renders an indented, human-readable hierarchy.
    #[must_use]
    pub fn text_dump(&self, include_environment: bool) -> String {
        let mut out = String::new();
        // Writing into a `String` cannot fail.
        let _ = self.write_dump(&mut out, include_environment);
        out
    }

    fn write_dump(&self, out: &mut String, include_environment: bool) -> fmt::Result {
        writeln!(out, "=== RECONCILER SNAPSHOT ===")?;
        writeln!(out, "Cycle: {}", self.cycle)?;
        writeln!(out, "Total Nodes: {}", self.nodes.len())?;
        writeln!(out, "Dirty Nodes: {}", self.dirty.len())?;
        writeln!(out)?;
        writeln!(out, "=== NODE HIERARCHY ===")?;
        for node in &self.nodes {
            let indent = "  ".repeat(node.depth as usize);
            write!(out, "{indent}- {}", node.element_type)?;
            if node.is_dirty {
                write!(out, " [DIRTY]")?;
            }
            if node.needs_setup {
                write!(out, " [NEEDS SETUP]")?;
            }
            writeln!(out)?;
            writeln!(out, "{indent}  ID: {}", node.identifier)?;
            if !node.state.is_empty() {
                writeln!(out, "{indent}  State:")?;
                for slot in &node.state {
                    writeln!(out, "{indent}    - {}: {}", slot.name, slot.value)?;
                    if !slot.dependents.is_empty() {
                        writeln!(out, "{indent}      deps: [{}]", slot.dependents.join(", "))?;
                    }
                }
            }
            if include_environment && !node.environment.is_empty() {
                writeln!(out, "{indent}  Environment: {}", node.environment.join(", "))?;
            }
        }
        if !self.dirty.is_empty() {
            writeln!(out)?;
            writeln!(out, "=== DIRTY NODES ===")?;
            for identifier in &self.dirty {
                writeln!(out, "  - {identifier}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text_dump(false))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;
    use crate::element::{AnyElement, BuildScope, Element};
    use crate::environment::EnvironmentKey;
    use crate::error::Error;
    use crate::modifier::{Conditional, ElementExt, Empty, ForEach, Group};
    use crate::state::{State, StateSlots};

    struct Tint;
    impl EnvironmentKey for Tint {
        type Value = u8;
    }

    struct Counter {
        count: State<i32>,
    }

    impl Element for Counter {
        fn declare_state(&mut self, slots: &mut StateSlots<'_>) {
            slots.slot("count", &mut self.count);
        }

        fn body(&self, scope: &BuildScope<'_>) -> Result<Option<AnyElement>, Error> {
            let _ = self.count.get(scope.cx());
            Ok(Some(Empty.keyed("leaf")))
        }
    }

    fn counter() -> Counter {
        Counter {
            count: State::new(3),
        }
    }

    #[test]
    fn snapshot_lists_nodes_in_order() {
        let mut r = Reconciler::new();
        r.update(counter().environment::<Tint>(2)).unwrap();
        let snap = r.snapshot();

        assert_eq!(snap.cycle, 1);
        let ids: Vec<_> = snap.nodes.iter().map(|n| n.identifier.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "EnvironmentWriter#0",
                "EnvironmentWriter#0/Counter#0",
                "EnvironmentWriter#0/Counter#0/Empty(\"leaf\")",
            ]
        );
        let root = &snap.nodes[0];
        assert_eq!(root.parent, None);
        assert_eq!(root.environment, vec!["Tint"]);
        assert!(!root.inherits_environment);

        let counter = &snap.nodes[1];
        assert_eq!(counter.depth, 1);
        assert_eq!(counter.element_type, "Counter");
        assert!(counter.inherits_environment);
        assert_eq!(
            counter.state,
            vec![StateSnapshot {
                name: "count",
                value: "3".into(),
                dependents: vec!["EnvironmentWriter#0/Counter#0".into()],
            }]
        );
        assert_eq!(snap.nodes[2].key.as_deref(), Some("\"leaf\""));
        assert!(snap.nodes.iter().all(|n| n.needs_setup));
    }

    #[test]
    fn text_dump_marks_flags() {
        let mut r = Reconciler::new();
        r.cycle(counter()).unwrap();
        let node = r.root().unwrap();
        let count = r.state::<i32>(node, "count").unwrap();
        r.with_context(|cx| count.set(cx, 4));

        let dump = r.snapshot().text_dump(true);
        assert!(dump.starts_with("=== RECONCILER SNAPSHOT ===\n"));
        assert!(dump.contains("- Counter [DIRTY]\n"));
        assert!(dump.contains("    - count: 4\n"));
        assert!(dump.contains("      deps: [Counter#0]\n"));
        assert!(dump.contains("  - Empty\n"));
        assert!(dump.contains("=== DIRTY NODES ===\n  - Counter#0\n"));
        assert!(!dump.contains("[NEEDS SETUP]"));
    }

    #[test]
    fn element_dump_indents_by_depth() {
        let mut r = Reconciler::new();
        assert_eq!(r.element_dump(false), "");
        r.update(
            Group::new()
                .with(ForEach::new([1_i64, 2], |v| *v, |_| Empty))
                .with(Conditional::first(Empty.on_setup_enter(|_| Ok(())))),
        )
        .unwrap();

        assert_eq!(
            r.element_dump(false),
            "Group\n  ForEach\n    Empty\n    Empty\n  Conditional\n    TrueBranch\n      SetupModifier\n        Empty\n"
        );
        let verbose = r.element_dump(true);
        assert!(verbose.starts_with("Group [id: Group#0, behavior: false]\n"));
        assert!(verbose.contains("    Empty [id: Group#0/ForEach#0/Empty(2), behavior: false]\n"));
        assert!(verbose.contains(
            "      SetupModifier [id: Group#0/Conditional#0/TrueBranch#0/SetupModifier#0, behavior: true]\n"
        ));
    }
}
