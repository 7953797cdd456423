// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for reconciliation cycles.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! reconciler calls at each stage of a cycle. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates the per-node [`NodeEvent`] and
//!   per-callback [`CallbackEvent`] events plus the corresponding `TraceSink`
//!   methods.

#[cfg(feature = "trace-rich")]
use crate::node::NodeId;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of a cycle is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Matching the new element tree against the node tree.
    Reconcile,
    /// Setup callbacks on nodes that need them.
    Setup,
    /// Workload callbacks on every node.
    Workload,
}

impl PhaseKind {
    /// Returns a short lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reconcile => "reconcile",
            Self::Setup => "setup",
            Self::Workload => "workload",
        }
    }
}

/// What happened to a node during an update.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeEventKind {
    /// A new node was created for an unseen identifier.
    Created,
    /// An existing node was kept unchanged.
    Reused,
    /// An existing node was kept and flagged for setup.
    Invalidated,
    /// A node whose identifier disappeared was destroyed.
    Removed,
}

/// Which lifecycle callback ran.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// `Behavior::setup_enter`.
    SetupEnter,
    /// `Behavior::setup_exit`.
    SetupExit,
    /// `Behavior::workload_enter`.
    WorkloadEnter,
    /// `Behavior::workload_exit`.
    WorkloadExit,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Marks the beginning of a cycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseBeginEvent {
    /// Update counter.
    pub cycle: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
}

/// Marks the end of a cycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseEndEvent {
    /// Update counter.
    pub cycle: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
}

/// Per-update reconciliation counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Update counter.
    pub cycle: u64,
    /// Nodes created for new identifiers.
    pub created: u32,
    /// Nodes kept without change.
    pub reused: u32,
    /// Nodes kept and flagged for setup.
    pub invalidated: u32,
    /// Nodes destroyed.
    pub removed: u32,
    /// Dirty identifiers consumed at the start of the update.
    pub dirty_consumed: u32,
    /// Live nodes after the update.
    pub node_count: u32,
}

/// A per-node reconciliation record.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeEvent {
    /// Update counter.
    pub cycle: u64,
    /// The node (for `Removed`, the handle before destruction).
    pub node: NodeId,
    /// What happened.
    pub kind: NodeEventKind,
}

/// A lifecycle callback invocation.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallbackEvent {
    /// Update counter.
    pub cycle: u64,
    /// The visited node.
    pub node: NodeId,
    /// Distance from the root.
    pub depth: u32,
    /// Which callback ran.
    pub callback: CallbackKind,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the reconciler.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the beginning of a phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called with the counts of a finished update.
    fn on_update_summary(&mut self, s: &UpdateSummary) {
        _ = s;
    }

    /// Called for every node an update creates, keeps, or destroys
    /// (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_node(&mut self, e: &NodeEvent) {
        _ = e;
    }

    /// Called after every lifecycle callback that ran (requires `trace-rich`
    /// feature).
    #[cfg(feature = "trace-rich")]
    fn on_callback(&mut self, e: &CallbackEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&mut self, e: &PhaseBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&mut self, e: &PhaseEndEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_phase_end(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`UpdateSummary`].
    #[inline]
    pub fn update_summary(&mut self, s: &UpdateSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_update_summary(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits a [`NodeEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn node(&mut self, e: &NodeEvent) {
        if let Some(s) = &mut self.sink {
            s.on_node(e);
        }
    }

    /// Emits a [`CallbackEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn callback(&mut self, e: &CallbackEvent) {
        if let Some(s) = &mut self.sink {
            s.on_callback(e);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_phase_begin(&PhaseBeginEvent {
            cycle: 1,
            phase: PhaseKind::Reconcile,
        });
        sink.on_update_summary(&UpdateSummary::default());
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.phase_begin(&PhaseBeginEvent {
            cycle: 0,
            phase: PhaseKind::Setup,
        });
        tracer.phase_end(&PhaseEndEvent {
            cycle: 0,
            phase: PhaseKind::Setup,
        });
    }

    #[test]
    fn phase_labels() {
        assert_eq!(PhaseKind::Reconcile.label(), "reconcile");
        assert_eq!(PhaseKind::Workload.label(), "workload");
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use alloc::vec::Vec;

        struct RecordingSink {
            phases: Vec<(u64, PhaseKind)>,
        }
        impl TraceSink for RecordingSink {
            fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
                self.phases.push((e.cycle, e.phase));
            }
        }

        let mut sink = RecordingSink { phases: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.phase_begin(&PhaseBeginEvent {
            cycle: 4,
            phase: PhaseKind::Workload,
        });
        drop(tracer);
        assert_eq!(sink.phases, &[(4, PhaseKind::Workload)]);
    }
}
