// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON serialization of node-tree snapshots.
//!
//! [`to_json`] mirrors [`Snapshot`] field for field; [`write_json`] pretty
//! prints it.

use std::io::{self, Write};

use serde_json::{Value, json};

use umbra_core::snapshot::{NodeSnapshot, Snapshot, StateSnapshot};

/// Converts a snapshot into a JSON object.
#[must_use]
pub fn to_json(snapshot: &Snapshot) -> Value {
    json!({
        "cycle": snapshot.cycle,
        "total_nodes": snapshot.nodes.len(),
        "dirty": snapshot.dirty,
        "nodes": snapshot.nodes.iter().map(node_json).collect::<Vec<_>>(),
    })
}

/// Writes a snapshot as pretty-printed JSON.
///
/// # Errors
///
/// Returns any error from serializing into `writer`.
pub fn write_json(snapshot: &Snapshot, writer: &mut dyn Write) -> io::Result<()> {
    serde_json::to_writer_pretty(writer, &to_json(snapshot))?;
    Ok(())
}

fn node_json(node: &NodeSnapshot) -> Value {
    json!({
        "identifier": node.identifier,
        "parent": node.parent,
        "depth": node.depth,
        "type": node.element_type,
        "key": node.key,
        "needs_setup": node.needs_setup,
        "is_dirty": node.is_dirty,
        "state": node.state.iter().map(state_json).collect::<Vec<_>>(),
        "environment": {
            "keys": node.environment,
            "inherits": node.inherits_environment,
        },
    })
}

fn state_json(slot: &StateSnapshot) -> Value {
    json!({
        "name": slot.name,
        "value": slot.value,
        "dependents": slot.dependents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::element::{AnyElement, BuildScope, Element};
    use umbra_core::modifier::{ElementExt, Empty};
    use umbra_core::reconciler::Reconciler;
    use umbra_core::state::{State, StateSlots};
    use umbra_core::Error;

    struct Toggle {
        on: State<bool>,
    }

    impl Element for Toggle {
        fn declare_state(&mut self, slots: &mut StateSlots<'_>) {
            slots.slot("on", &mut self.on);
        }

        fn body(&self, scope: &BuildScope<'_>) -> Result<Option<AnyElement>, Error> {
            Ok(self.on.get(scope.cx()).then(|| Empty.keyed("lit")))
        }
    }

    #[test]
    fn json_mirrors_the_tree() {
        let mut r = Reconciler::new();
        r.update(Toggle {
            on: State::new(true),
        })
        .unwrap();

        let value = to_json(&r.snapshot());
        assert_eq!(value["cycle"], 1);
        assert_eq!(value["total_nodes"], 2);
        assert_eq!(value["nodes"][0]["type"], "Toggle");
        assert_eq!(value["nodes"][0]["parent"], Value::Null);
        assert_eq!(value["nodes"][0]["state"][0]["name"], "on");
        assert_eq!(value["nodes"][0]["state"][0]["value"], "true");
        assert_eq!(value["nodes"][1]["identifier"], "Toggle#0/Empty(\"lit\")");
        assert_eq!(value["nodes"][1]["key"], "\"lit\"");
        assert_eq!(value["nodes"][1]["environment"]["inherits"], true);
    }

    #[test]
    fn write_json_round_trips_through_parser() {
        let mut r = Reconciler::new();
        r.update(Empty).unwrap();
        let snapshot = r.snapshot();

        let mut out = Vec::new();
        write_json(&snapshot, &mut out).unwrap();
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, to_json(&snapshot));
    }
}
