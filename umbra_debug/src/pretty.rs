// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use umbra_core::trace::{
    CallbackEvent, CallbackKind, NodeEvent, NodeEventKind, PhaseBeginEvent, PhaseEndEvent,
    TraceSink, UpdateSummary,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn node_kind_name(kind: NodeEventKind) -> &'static str {
    match kind {
        NodeEventKind::Created => "created",
        NodeEventKind::Reused => "reused",
        NodeEventKind::Invalidated => "invalidated",
        NodeEventKind::Removed => "removed",
    }
}

fn callback_name(kind: CallbackKind) -> &'static str {
    match kind {
        CallbackKind::SetupEnter => "setup-enter",
        CallbackKind::SetupExit => "setup-exit",
        CallbackKind::WorkloadEnter => "workload-enter",
        CallbackKind::WorkloadExit => "workload-exit",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] cycle={} {}",
            e.cycle,
            e.phase.label(),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] cycle={} {}",
            e.cycle,
            e.phase.label(),
        );
    }

    fn on_update_summary(&mut self, s: &UpdateSummary) {
        let _ = writeln!(
            self.writer,
            "[summary] cycle={} created={} reused={} invalidated={} removed={} \
             dirty={} nodes={}",
            s.cycle, s.created, s.reused, s.invalidated, s.removed, s.dirty_consumed, s.node_count,
        );
    }

    fn on_node(&mut self, e: &NodeEvent) {
        let _ = writeln!(
            self.writer,
            "[node] cycle={} node={:?} {}",
            e.cycle,
            e.node,
            node_kind_name(e.kind),
        );
    }

    fn on_callback(&mut self, e: &CallbackEvent) {
        let _ = writeln!(
            self.writer,
            "[callback] cycle={} depth={} node={:?} {}",
            e.cycle,
            e.depth,
            e.node,
            callback_name(e.callback),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::node::NodeId;
    use umbra_core::trace::PhaseKind;

    #[test]
    fn pretty_print_phase_and_summary() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_phase_begin(&PhaseBeginEvent {
            cycle: 2,
            phase: PhaseKind::Setup,
        });
        sink.on_update_summary(&UpdateSummary {
            cycle: 2,
            created: 1,
            reused: 3,
            node_count: 4,
            ..UpdateSummary::default()
        });
        let output = String::from_utf8(sink.writer).unwrap();
        assert!(output.contains("[phase:begin] cycle=2 setup"), "got: {output}");
        assert!(output.contains("created=1 reused=3"), "got: {output}");
        assert!(output.contains("nodes=4"), "got: {output}");
    }

    #[test]
    fn pretty_print_callback() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_callback(&CallbackEvent {
            cycle: 1,
            node: NodeId::from_raw(3, 0),
            depth: 2,
            callback: CallbackKind::WorkloadExit,
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            output,
            "[callback] cycle=1 depth=2 node=NodeId(3@gen0) workload-exit\n"
        );
    }
}
