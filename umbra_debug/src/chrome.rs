// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Recordings carry no clock, so each event's position in the recording is
//! used as its timestamp in microseconds. Phases become `B`/`E` duration
//! pairs; everything else becomes an instant event.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use umbra_core::node::NodeId;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// # Errors
///
/// Returns any error from serializing into `writer`.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for (ts, recorded) in decode(bytes).enumerate() {
        match recorded {
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": e.phase.label(),
                    "cat": "Cycle",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "cycle": e.cycle,
                    }
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": e.phase.label(),
                    "cat": "Cycle",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "args": {
                        "cycle": e.cycle,
                    }
                }));
            }
            RecordedEvent::UpdateSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "UpdateSummary",
                    "cat": "Summary",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "cycle": s.cycle,
                        "created": s.created,
                        "reused": s.reused,
                        "invalidated": s.invalidated,
                        "removed": s.removed,
                        "dirty_consumed": s.dirty_consumed,
                        "node_count": s.node_count,
                    }
                }));
            }
            RecordedEvent::Node(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.kind),
                    "cat": "Node",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "cycle": e.cycle,
                        "node": node_args(e.node),
                    }
                }));
            }
            RecordedEvent::Callback(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.callback),
                    "cat": "Callback",
                    "ts": ts,
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "cycle": e.cycle,
                        "depth": e.depth,
                        "node": node_args(e.node),
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn node_args(node: NodeId) -> Value {
    json!({
        "index": node.index(),
        "generation": node.generation(),
    })
}
