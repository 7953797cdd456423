// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records, each led by a one-byte tag.
//! [`decode`] reads them back as an iterator of [`RecordedEvent`]. Node
//! handles are stored as their raw slot index and generation.

use umbra_core::node::NodeId;
use umbra_core::trace::{
    CallbackEvent, CallbackKind, NodeEvent, NodeEventKind, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind, TraceSink, UpdateSummary,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_PHASE_BEGIN: u8 = 1;
const TAG_PHASE_END: u8 = 2;
const TAG_UPDATE_SUMMARY: u8 = 3;
const TAG_NODE: u8 = 4;
const TAG_CALLBACK: u8 = 5;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Discards everything recorded so far.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_node(&mut self, node: NodeId) {
        self.write_u32(node.index());
        self.write_u32(node.generation());
    }

    fn write_phase(&mut self, p: PhaseKind) {
        self.write_u8(match p {
            PhaseKind::Reconcile => 0,
            PhaseKind::Setup => 1,
            PhaseKind::Workload => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.write_u8(TAG_PHASE_BEGIN);
        self.write_u64(e.cycle);
        self.write_phase(e.phase);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.write_u8(TAG_PHASE_END);
        self.write_u64(e.cycle);
        self.write_phase(e.phase);
    }

    fn on_update_summary(&mut self, s: &UpdateSummary) {
        self.write_u8(TAG_UPDATE_SUMMARY);
        self.write_u64(s.cycle);
        self.write_u32(s.created);
        self.write_u32(s.reused);
        self.write_u32(s.invalidated);
        self.write_u32(s.removed);
        self.write_u32(s.dirty_consumed);
        self.write_u32(s.node_count);
    }

    fn on_node(&mut self, e: &NodeEvent) {
        self.write_u8(TAG_NODE);
        self.write_u64(e.cycle);
        self.write_node(e.node);
        self.write_u8(match e.kind {
            NodeEventKind::Created => 0,
            NodeEventKind::Reused => 1,
            NodeEventKind::Invalidated => 2,
            NodeEventKind::Removed => 3,
        });
    }

    fn on_callback(&mut self, e: &CallbackEvent) {
        self.write_u8(TAG_CALLBACK);
        self.write_u64(e.cycle);
        self.write_node(e.node);
        self.write_u32(e.depth);
        self.write_u8(match e.callback {
            CallbackKind::SetupEnter => 0,
            CallbackKind::SetupExit => 1,
            CallbackKind::WorkloadEnter => 2,
            CallbackKind::WorkloadExit => 3,
        });
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`PhaseBeginEvent`].
    PhaseBegin(PhaseBeginEvent),
    /// A [`PhaseEndEvent`].
    PhaseEnd(PhaseEndEvent),
    /// An [`UpdateSummary`].
    UpdateSummary(UpdateSummary),
    /// A [`NodeEvent`].
    Node(NodeEvent),
    /// A [`CallbackEvent`].
    Callback(CallbackEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
///
/// Iteration stops at the first unknown tag or truncated record.
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_node(&mut self) -> Option<NodeId> {
        let idx = self.read_u32()?;
        let generation = self.read_u32()?;
        Some(NodeId::from_raw(idx, generation))
    }

    fn read_phase(&mut self) -> Option<PhaseKind> {
        Some(match self.read_u8()? {
            0 => PhaseKind::Reconcile,
            1 => PhaseKind::Setup,
            2 => PhaseKind::Workload,
            _ => return None,
        })
    }

    fn read_node_kind(&mut self) -> Option<NodeEventKind> {
        Some(match self.read_u8()? {
            0 => NodeEventKind::Created,
            1 => NodeEventKind::Reused,
            2 => NodeEventKind::Invalidated,
            3 => NodeEventKind::Removed,
            _ => return None,
        })
    }

    fn read_callback_kind(&mut self) -> Option<CallbackKind> {
        Some(match self.read_u8()? {
            0 => CallbackKind::SetupEnter,
            1 => CallbackKind::SetupExit,
            2 => CallbackKind::WorkloadEnter,
            3 => CallbackKind::WorkloadExit,
            _ => return None,
        })
    }

    fn decode_phase_begin(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseBegin(PhaseBeginEvent {
            cycle: self.read_u64()?,
            phase: self.read_phase()?,
        }))
    }

    fn decode_phase_end(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::PhaseEnd(PhaseEndEvent {
            cycle: self.read_u64()?,
            phase: self.read_phase()?,
        }))
    }

    fn decode_update_summary(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::UpdateSummary(UpdateSummary {
            cycle: self.read_u64()?,
            created: self.read_u32()?,
            reused: self.read_u32()?,
            invalidated: self.read_u32()?,
            removed: self.read_u32()?,
            dirty_consumed: self.read_u32()?,
            node_count: self.read_u32()?,
        }))
    }

    fn decode_node(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Node(NodeEvent {
            cycle: self.read_u64()?,
            node: self.read_node()?,
            kind: self.read_node_kind()?,
        }))
    }

    fn decode_callback(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Callback(CallbackEvent {
            cycle: self.read_u64()?,
            node: self.read_node()?,
            depth: self.read_u32()?,
            callback: self.read_callback_kind()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_PHASE_BEGIN => self.decode_phase_begin(),
            TAG_PHASE_END => self.decode_phase_end(),
            TAG_UPDATE_SUMMARY => self.decode_update_summary(),
            TAG_NODE => self.decode_node(),
            TAG_CALLBACK => self.decode_callback(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
