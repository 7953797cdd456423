// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated counter application that exercises the tracing and diagnostics
//! pipeline.
//!
//! Runs a handful of cycles over a small element tree, changing state between
//! them, and records every event to both a
//! [`PrettyPrintSink`](umbra_debug::pretty::PrettyPrintSink) and a
//! [`RecorderSink`](umbra_debug::recorder::RecorderSink). Afterwards it prints
//! a text dump of the node tree and writes a Chrome trace and a JSON snapshot.

use std::fs::File;
use std::io::BufWriter;

use umbra_core::Error;
use umbra_core::element::{AnyElement, Behavior, BuildScope, Element, NodeScope};
use umbra_core::environment::EnvironmentKey;
use umbra_core::modifier::{ElementExt, ForEach, Group};
use umbra_core::reconciler::{Reconciler, UpdateChanges};
use umbra_core::state::{State, StateSlots};
use umbra_core::trace::{
    CallbackEvent, NodeEvent, PhaseBeginEvent, PhaseEndEvent, TraceSink, Tracer, UpdateSummary,
};

use umbra_debug::pretty::PrettyPrintSink;
use umbra_debug::recorder::RecorderSink;

// ---------------------------------------------------------------------------
// Elements
// ---------------------------------------------------------------------------

struct Tint;

impl EnvironmentKey for Tint {
    type Value = u32;

    fn default_value() -> Option<u32> {
        Some(0)
    }
}

/// Handle written by `Draw` during setup and read back during workload.
struct Buffer;

impl EnvironmentKey for Buffer {
    type Value = u32;
}

struct App {
    count: State<u32>,
    items: State<Vec<u32>>,
}

impl App {
    fn new() -> Self {
        Self {
            count: State::new(0),
            items: State::new(vec![1, 2, 3]),
        }
    }
}

impl Element for App {
    fn declare_state(&mut self, slots: &mut StateSlots<'_>) {
        slots.slot("count", &mut self.count);
        slots.slot("items", &mut self.items);
    }

    fn body(&self, scope: &BuildScope<'_>) -> Result<Option<AnyElement>, Error> {
        let count = self.count.get(scope.cx());
        let items = self.items.get(scope.cx());
        let list = ForEach::new(items, |id| *id, |id| Draw { vertices: id * 3 });
        let content = Group::new().with(Label { count }).with(list);
        Ok(Some(content.environment::<Tint>(count % 2).erased()))
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

#[derive(PartialEq)]
struct Label {
    count: u32,
}

impl Element for Label {
    fn requires_setup(&self, previous: &Self) -> bool {
        self != previous
    }
}

#[derive(PartialEq)]
struct Draw {
    vertices: u32,
}

impl Element for Draw {
    fn behavior(&self) -> Option<&dyn Behavior> {
        Some(self)
    }

    fn requires_setup(&self, previous: &Self) -> bool {
        self != previous
    }
}

impl Behavior for Draw {
    fn setup_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
        let tint = scope.environment().require::<Tint>()?;
        scope.environment().set::<Buffer>(self.vertices + tint);
        Ok(())
    }

    fn workload_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
        scope.environment().require::<Buffer>()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fan-out sink
// ---------------------------------------------------------------------------

struct Fanout {
    pretty: PrettyPrintSink,
    recorder: RecorderSink,
}

impl TraceSink for Fanout {
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.pretty.on_phase_begin(e);
        self.recorder.on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.pretty.on_phase_end(e);
        self.recorder.on_phase_end(e);
    }

    fn on_update_summary(&mut self, s: &UpdateSummary) {
        self.pretty.on_update_summary(s);
        self.recorder.on_update_summary(s);
    }

    fn on_node(&mut self, e: &NodeEvent) {
        self.pretty.on_node(e);
        self.recorder.on_node(e);
    }

    fn on_callback(&mut self, e: &CallbackEvent) {
        self.pretty.on_callback(e);
        self.recorder.on_callback(e);
    }
}

fn run_cycle(
    reconciler: &mut Reconciler,
    changes: &mut UpdateChanges,
    sink: &mut Fanout,
) -> Result<(), Error> {
    let mut tracer = Tracer::new(sink);
    reconciler.update_into(App::new(), changes, &mut tracer)?;
    reconciler.process_setup_traced(&mut tracer)?;
    reconciler.process_workload_traced(&mut tracer)
}

fn main() {
    let mut sink = Fanout {
        pretty: PrettyPrintSink::stderr(),
        recorder: RecorderSink::new(),
    };
    let mut reconciler = Reconciler::new();
    let mut changes = UpdateChanges::default();

    // 1. Initial build, then an idle cycle that reuses everything.
    for _ in 0..2 {
        run_cycle(&mut reconciler, &mut changes, &mut sink).expect("cycle failed");
    }

    let root = reconciler.root().expect("tree has a root");
    let count = reconciler
        .state::<u32>(root, "count")
        .expect("app declares count");
    let items = reconciler
        .state::<Vec<u32>>(root, "items")
        .expect("app declares items");

    // 2. Bump the counter: the label and the tint change.
    reconciler.with_context(|cx| count.set(cx, 1));
    run_cycle(&mut reconciler, &mut changes, &mut sink).expect("cycle failed");

    // 3. Reorder and grow the list: keyed draws are reused, one is created.
    reconciler.with_context(|cx| items.set(cx, vec![3, 1, 2, 4]));
    run_cycle(&mut reconciler, &mut changes, &mut sink).expect("cycle failed");

    // 4. Drop an item: its node is destroyed.
    reconciler.with_context(|cx| items.update(cx, |v| v.retain(|id| *id != 1)));
    run_cycle(&mut reconciler, &mut changes, &mut sink).expect("cycle failed");
    println!(
        "last update: created={} reused={} invalidated={} removed={}",
        changes.created.len(),
        changes.reused.len(),
        changes.invalidated.len(),
        changes.removed.len(),
    );

    // -- dumps -------------------------------------------------------------
    print!("{}", reconciler.element_dump(true));
    let snapshot = reconciler.snapshot();
    println!("{}", snapshot.text_dump(true));

    let path = "snapshot.json";
    let file = File::create(path).expect("failed to create snapshot.json");
    umbra_debug::snapshot::write_json(&snapshot, &mut BufWriter::new(file))
        .expect("failed to write snapshot");
    println!("Wrote {path}");

    let path = "trace.json";
    let file = File::create(path).expect("failed to create trace.json");
    let mut writer = BufWriter::new(file);
    umbra_debug::chrome::export(sink.recorder.as_bytes(), &mut writer)
        .expect("failed to write Chrome trace");
    println!("Wrote {path} ({} cycles)", reconciler.cycle_index());
}
