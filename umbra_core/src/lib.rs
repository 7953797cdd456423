// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Retained-mode reconciler for declarative render-graph descriptions.
//!
//! `umbra_core` turns successive declarative descriptions of a render graph
//! (passes, pipelines, draws, dispatches) into a persistent node tree. It
//! decides which nodes survive from one description to the next, which of
//! them must be re-initialized (*setup*) and which merely re-executed
//! (*workload*), and threads inherited configuration (*environment*) and
//! localized mutable state through that tree. It is `no_std` compatible (with
//! `alloc`) and stores nodes in struct-of-arrays form behind generational
//! handles.
//!
//! # Architecture
//!
//! ```text
//!   application builds element tree
//!       │
//!       ▼
//!   Reconciler::update() ──► UpdateChanges
//!       │   (identity, reuse, environment, state restore)
//!       ▼
//!   Reconciler::process_setup()     nodes flagged `needs_setup`
//!       │
//!       ▼
//!   Reconciler::process_workload()  every node, every cycle
//!       │
//!       ▼
//!   state writes / observed notifications ──► dirty set ──► next update
//! ```
//!
//! **[`identity`]**: Structural identifiers: paths of (type, disambiguator)
//! atoms naming a logical position in the tree.
//!
//! **[`element`]**: The [`Element`](element::Element) description protocol,
//! the [`Behavior`](element::Behavior) lifecycle callbacks, and type erasure.
//!
//! **[`modifier`]**: Containers, conditionals, keyed lists, and the
//! environment, setup, workload, and on-change modifiers.
//!
//! **[`node`]**: Struct-of-arrays node storage with generational handles.
//!
//! **[`reconciler`]**: The update pass and the two-phase traversal executor.
//!
//! **[`environment`]**: Hierarchical key/value configuration with parent
//! lookup.
//!
//! **[`state`]**: State boxes, state handles, and bindings with dependency
//! tracking.
//!
//! **[`observed`]**: Bridges external change notifications into the dirty
//! set.
//!
//! **[`context`]**: The explicit reconciler context threaded through state
//! access.
//!
//! **[`snapshot`]**: Structured and textual dumps of the node tree.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! reconciliation instrumentation, with zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-node
//!   lifecycle and per-callback events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod config;
pub mod context;
pub mod element;
pub mod environment;
pub mod error;
pub mod identity;
pub mod modifier;
pub mod node;
pub mod observed;
pub mod reconciler;
pub mod snapshot;
pub mod state;
pub mod trace;

pub use error::Error;
