// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and export helpers for umbra diagnostics.
//!
//! This crate provides [`TraceSink`](umbra_core::trace::TraceSink)
//! implementations and serializers for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`] writes one human-readable line per event.
//! - [`recorder::RecorderSink`] records a compact binary stream, read back
//!   with [`recorder::decode`].
//! - [`chrome::export`] turns recorded bytes into Chrome Trace Event Format
//!   JSON.
//! - [`snapshot::to_json`] serializes a
//!   [`Snapshot`](umbra_core::snapshot::Snapshot) of the node tree.

pub mod chrome;
pub mod pretty;
pub mod recorder;
pub mod snapshot;
