// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Localized mutable state with dependency tracking.
//!
//! A [`StateBox`] owns a value and the list of nodes that read it. Reading
//! through [`StateBox::get`] registers the node currently being built or
//! visited; writing through [`StateBox::set`] marks every live reader dirty so
//! the next update re-evaluates it with `needs_setup` raised.
//!
//! Elements hold state through [`State`] handles and announce them by name in
//! [`Element::declare_state`](crate::element::Element::declare_state). On the
//! first update the reconciler stores the element's boxes on the node; on
//! later updates it swaps the stored boxes back into the freshly built
//! element, so values survive even though elements are rebuilt every cycle.
//!
//! Dependents are recorded as [`NodeId`] handles, never as owning
//! references, so a box held by a node never keeps that node alive.
//!
//! [`Binding`] is a get/set pair. Bindings over the same box (or projections
//! of it) compare equal.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::cell::RefCell;
use core::fmt;

use crate::context::ReconcilerContext;
use crate::node::NodeId;

/// A mutable value plus the nodes that depend on it.
pub struct StateBox<T> {
    value: RefCell<T>,
    dependents: RefCell<Vec<NodeId>>,
}

impl<T: fmt::Debug> fmt::Debug for StateBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBox")
            .field("value", &self.value.borrow())
            .field("dependents", &self.dependents.borrow())
            .finish()
    }
}

impl<T: 'static> StateBox<T> {
    /// Creates a box holding `value` with no dependents.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            dependents: RefCell::new(Vec::new()),
        }
    }

    /// Reads the value and registers the current node as a dependent.
    ///
    /// # Panics
    ///
    /// Panics if no context scope is open.
    #[track_caller]
    pub fn get(&self, cx: &ReconcilerContext) -> T
    where
        T: Clone,
    {
        self.with(cx, T::clone)
    }

    /// Borrows the value and registers the current node as a dependent.
    ///
    /// # Panics
    ///
    /// Panics if no context scope is open.
    #[track_caller]
    pub fn with<R>(&self, cx: &ReconcilerContext, f: impl FnOnce(&T) -> R) -> R {
        cx.assert_active("state read");
        self.track(cx);
        f(&*self.value.borrow())
    }

    /// Reads the value without registering a dependency.
    ///
    /// # Panics
    ///
    /// Panics if no context scope is open.
    #[track_caller]
    pub fn peek(&self, cx: &ReconcilerContext) -> T
    where
        T: Clone,
    {
        cx.assert_active("state read");
        self.value.borrow().clone()
    }

    /// Stores `value` and marks every live dependent dirty.
    ///
    /// # Panics
    ///
    /// Panics if no context scope is open.
    #[track_caller]
    pub fn set(&self, cx: &ReconcilerContext, value: T) {
        cx.assert_active("state write");
        *self.value.borrow_mut() = value;
        self.invalidate(cx);
    }

    /// Mutates the value in place and marks every live dependent dirty.
    ///
    /// # Panics
    ///
    /// Panics if no context scope is open.
    #[track_caller]
    pub fn update(&self, cx: &ReconcilerContext, f: impl FnOnce(&mut T)) {
        cx.assert_active("state write");
        f(&mut *self.value.borrow_mut());
        self.invalidate(cx);
    }

    /// Returns the currently registered dependents.
    #[must_use]
    pub fn dependents(&self) -> Vec<NodeId> {
        self.dependents.borrow().clone()
    }

    fn track(&self, cx: &ReconcilerContext) {
        let mut deps = self.dependents.borrow_mut();
        deps.retain(|id| cx.is_live(*id));
        if let Some(node) = cx.current_node() {
            if !deps.contains(&node) {
                deps.push(node);
            }
        }
    }

    fn invalidate(&self, cx: &ReconcilerContext) {
        let mut deps = self.dependents.borrow_mut();
        deps.retain(|id| cx.mark_dirty(*id));
    }
}

/// Type-erased view of a stored state box, used for restoration and dumps.
pub(crate) trait StateCell: Any {
    fn debug_value(&self) -> String;
    fn dependent_ids(&self) -> Vec<NodeId>;
}

impl<T: fmt::Debug + 'static> StateCell for StateBox<T> {
    fn debug_value(&self) -> String {
        format!("{:?}", self.value.borrow())
    }

    fn dependent_ids(&self) -> Vec<NodeId> {
        self.dependents()
    }
}

/// A shared handle to a [`StateBox`].
///
/// Two handles are equal when they refer to the same box, which is what
/// makes an element whose only change is a restored state handle compare
/// equal to its previous version.
pub struct State<T> {
    cell: Rc<StateBox<T>>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T> PartialEq for State<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: fmt::Debug> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("State").field(&self.cell.value.borrow()).finish()
    }
}

impl<T: 'static> State<T> {
    /// Creates a handle to a new box holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            cell: Rc::new(StateBox::new(initial)),
        }
    }

    /// Returns the underlying box.
    #[must_use]
    pub fn cell(&self) -> &StateBox<T> {
        &self.cell
    }

    /// See [`StateBox::get`].
    #[track_caller]
    pub fn get(&self, cx: &ReconcilerContext) -> T
    where
        T: Clone,
    {
        self.cell.get(cx)
    }

    /// See [`StateBox::with`].
    #[track_caller]
    pub fn with<R>(&self, cx: &ReconcilerContext, f: impl FnOnce(&T) -> R) -> R {
        self.cell.with(cx, f)
    }

    /// See [`StateBox::peek`].
    #[track_caller]
    pub fn peek(&self, cx: &ReconcilerContext) -> T
    where
        T: Clone,
    {
        self.cell.peek(cx)
    }

    /// See [`StateBox::set`].
    #[track_caller]
    pub fn set(&self, cx: &ReconcilerContext, value: T) {
        self.cell.set(cx, value);
    }

    /// See [`StateBox::update`].
    #[track_caller]
    pub fn update(&self, cx: &ReconcilerContext, f: impl FnOnce(&mut T)) {
        self.cell.update(cx, f);
    }

    /// Returns a binding that reads and writes this state.
    #[must_use]
    pub fn binding(&self) -> Binding<T>
    where
        T: Clone,
    {
        let get_cell = Rc::clone(&self.cell);
        let set_cell = Rc::clone(&self.cell);
        Binding::from_parts(
            self.cell.clone(),
            move |cx| get_cell.get(cx),
            move |cx, v| set_cell.set(cx, v),
        )
    }
}

/// Name-keyed state slots stored on one node.
pub(crate) type StateTable = Vec<(&'static str, Rc<dyn StateCell>)>;

/// Visitor passed to [`Element::declare_state`](crate::element::Element::declare_state).
pub struct StateSlots<'a> {
    table: &'a mut StateTable,
}

impl fmt::Debug for StateSlots<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.table.iter().map(|(name, _)| name))
            .finish()
    }
}

impl<'a> StateSlots<'a> {
    pub(crate) fn new(table: &'a mut StateTable) -> Self {
        Self { table }
    }

    /// Declares a state slot.
    ///
    /// If the node already stores a box under `name`, `state` is pointed at
    /// it. Otherwise the box behind `state` is stored for later updates.
    ///
    /// # Panics
    ///
    /// Panics if a box of a different type is stored under `name`.
    pub fn slot<T: fmt::Debug + 'static>(&mut self, name: &'static str, state: &mut State<T>) {
        if let Some((_, cell)) = self.table.iter().find(|(n, _)| *n == name) {
            let any: Rc<dyn Any> = Rc::<dyn StateCell>::clone(cell);
            match any.downcast::<StateBox<T>>() {
                Ok(cell) => state.cell = cell,
                Err(_) => panic!("state slot `{name}` changed type"),
            }
        } else {
            let cell: Rc<dyn StateCell> = state.cell.clone();
            self.table.push((name, cell));
        }
    }
}

/// Returns the box stored under `name`, if it holds a `T`.
pub(crate) fn lookup<T: 'static>(table: &StateTable, name: &str) -> Option<State<T>> {
    let (_, cell) = table.iter().find(|(n, _)| *n == name)?;
    let any: Rc<dyn Any> = Rc::<dyn StateCell>::clone(cell);
    any.downcast::<StateBox<T>>().ok().map(|cell| State { cell })
}

/// A dump-friendly summary of one stored slot.
pub(crate) fn describe(
    table: &StateTable,
) -> impl Iterator<Item = (&'static str, String, Vec<NodeId>)> + '_ {
    table
        .iter()
        .map(|(name, cell)| (*name, cell.debug_value(), cell.dependent_ids()))
}

type Getter<T> = Rc<dyn Fn(&ReconcilerContext) -> T>;
type Setter<T> = Rc<dyn Fn(&ReconcilerContext, T)>;

/// A get/set pair over some underlying storage.
///
/// Bindings compare equal when they refer to the same underlying storage,
/// whether directly or through [`map`](Self::map) projections.
pub struct Binding<T> {
    get: Getter<T>,
    set: Setter<T>,
    identity: Rc<dyn Any>,
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            get: Rc::clone(&self.get),
            set: Rc::clone(&self.set),
            identity: Rc::clone(&self.identity),
        }
    }
}

impl<T> PartialEq for Binding<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.identity, &other.identity)
    }
}

impl<T> fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").finish_non_exhaustive()
    }
}

impl<T: 'static> Binding<T> {
    pub(crate) fn from_parts(
        identity: Rc<dyn Any>,
        get: impl Fn(&ReconcilerContext) -> T + 'static,
        set: impl Fn(&ReconcilerContext, T) + 'static,
    ) -> Self {
        Self {
            get: Rc::new(get),
            set: Rc::new(set),
            identity,
        }
    }

    /// Creates a binding from custom accessors with its own identity.
    pub fn from_fns(
        get: impl Fn(&ReconcilerContext) -> T + 'static,
        set: impl Fn(&ReconcilerContext, T) + 'static,
    ) -> Self {
        Self::from_parts(Rc::new(()), get, set)
    }

    /// Creates a binding that always reads `value` and ignores writes.
    pub fn constant(value: T) -> Self
    where
        T: Clone,
    {
        Self::from_fns(move |_| value.clone(), |_, _| {})
    }

    /// Reads through the binding.
    pub fn get(&self, cx: &ReconcilerContext) -> T {
        (self.get)(cx)
    }

    /// Writes through the binding.
    pub fn set(&self, cx: &ReconcilerContext, value: T) {
        (self.set)(cx, value);
    }

    /// Projects a part of the bound value.
    ///
    /// Writes read the whole value, apply `set`, and write it back.
    pub fn map<U: 'static>(
        &self,
        get: impl Fn(&T) -> U + 'static,
        set: impl Fn(&mut T, U) + 'static,
    ) -> Binding<U> {
        let read = Rc::clone(&self.get);
        let read_for_write = Rc::clone(&self.get);
        let write = Rc::clone(&self.set);
        Binding::from_parts(
            Rc::clone(&self.identity),
            move |cx| get(&read(cx)),
            move |cx, u| {
                let mut whole = read_for_write(cx);
                set(&mut whole, u);
                write(cx, whole);
            },
        )
    }
}
