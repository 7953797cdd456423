// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural builders and modifiers.
//!
//! Builders shape the tree: [`Empty`], [`Group`] (ordered container),
//! [`ForEach`] (keyed list), `Option<E>` (optional content), and
//! [`Conditional`] (one of two contents). Modifiers wrap a
//! single content element: [`EnvironmentWriter`], [`EnvironmentReader`],
//! [`SetupModifier`], [`WorkloadModifier`], and [`OnChange`]. The
//! [`ElementExt`] trait provides the chaining methods.
//!
//! Every builder and modifier occupies its own tree level, so wrapping an
//! element in a modifier changes the structural identifiers below it.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

use crate::element::{AnyElement, Behavior, BuildScope, Element, NodeScope};
use crate::environment::{EnvironmentKey, EnvironmentValues};
use crate::error::Error;
use crate::identity::Key;
use crate::state::{State, StateSlots};

/// An element with no body, children, or behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Empty;

impl Element for Empty {
    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

/// An ordered container.
#[derive(Debug, Default)]
pub struct Group {
    children: Vec<AnyElement>,
}

impl Group {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a child and returns the group.
    #[must_use]
    pub fn with(mut self, child: impl Into<AnyElement>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Appends a child.
    pub fn push(&mut self, child: impl Into<AnyElement>) {
        self.children.push(child.into());
    }

    /// Returns the number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Returns whether the group has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl<E: Into<AnyElement>> FromIterator<E> for Group {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        Self {
            children: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<E: Into<AnyElement>> Extend<E> for Group {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        self.children.extend(iter.into_iter().map(Into::into));
    }
}

impl Element for Group {
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        children.append(&mut self.children);
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

/// A list whose children are identified by key instead of position, so
/// reordering the data reuses the existing nodes.
#[derive(Debug, Default)]
pub struct ForEach {
    children: Vec<AnyElement>,
}

impl ForEach {
    /// Builds one child per item, keyed by `key(&item)`.
    pub fn new<T, K, E>(
        items: impl IntoIterator<Item = T>,
        key: impl Fn(&T) -> K,
        content: impl Fn(T) -> E,
    ) -> Self
    where
        K: Into<Key>,
        E: Into<AnyElement>,
    {
        let children = items
            .into_iter()
            .map(|item| {
                let k = key(&item);
                content(item).into().with_key(k)
            })
            .collect();
        Self { children }
    }
}

impl Element for ForEach {
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        children.append(&mut self.children);
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

/// `Some(e)` contributes `e` as its single child; `None` contributes nothing.
impl<E: Element> Element for Option<E> {
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        if let Some(content) = self.take() {
            children.push(AnyElement::new(content));
        }
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

/// Which side of a [`Conditional`] is shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Branch {
    /// The content built when the condition holds.
    First,
    /// The content built otherwise.
    Second,
}

/// A two-way choice between contents.
///
/// The chosen content sits below a [`TrueBranch`] or [`FalseBranch`] node, so
/// the two sides never share structural identifiers: switching sides
/// destroys the old subtree and creates the new one, even when both sides
/// build the same element type.
#[derive(Debug)]
pub struct Conditional {
    branch: Branch,
    content: Option<AnyElement>,
}

impl Conditional {
    /// Builds `if_true()` when `condition` holds and `if_false()` otherwise.
    /// Only the chosen side is built.
    pub fn new<A, B>(
        condition: bool,
        if_true: impl FnOnce() -> A,
        if_false: impl FnOnce() -> B,
    ) -> Self
    where
        A: Into<AnyElement>,
        B: Into<AnyElement>,
    {
        if condition {
            Self::first(if_true())
        } else {
            Self::second(if_false())
        }
    }

    /// Shows `content` on the first side.
    pub fn first(content: impl Into<AnyElement>) -> Self {
        Self {
            branch: Branch::First,
            content: Some(content.into()),
        }
    }

    /// Shows `content` on the second side.
    pub fn second(content: impl Into<AnyElement>) -> Self {
        Self {
            branch: Branch::Second,
            content: Some(content.into()),
        }
    }

    /// Returns the side being shown.
    #[must_use]
    pub fn branch(&self) -> Branch {
        self.branch
    }
}

impl Element for Conditional {
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        let Some(content) = self.content.take() else {
            return;
        };
        children.push(match self.branch {
            Branch::First => TrueBranch(Some(content)).into(),
            Branch::Second => FalseBranch(Some(content)).into(),
        });
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

/// Holds the first side of a [`Conditional`].
#[derive(Debug)]
pub struct TrueBranch(Option<AnyElement>);

/// Holds the second side of a [`Conditional`].
#[derive(Debug)]
pub struct FalseBranch(Option<AnyElement>);

impl Element for TrueBranch {
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        children.extend(self.0.take());
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

impl Element for FalseBranch {
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        children.extend(self.0.take());
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

/// Writes one environment value for its content's subtree.
pub struct EnvironmentWriter<K: EnvironmentKey> {
    value: K::Value,
    content: Option<AnyElement>,
}

impl<K: EnvironmentKey> fmt::Debug for EnvironmentWriter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentWriter")
            .field("key", &K::name())
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl<K: EnvironmentKey> EnvironmentWriter<K> {
    /// Wraps `content`, writing `value` for `K`.
    pub fn new(value: K::Value, content: impl Into<AnyElement>) -> Self {
        Self {
            value,
            content: Some(content.into()),
        }
    }
}

impl<K: EnvironmentKey> Element for EnvironmentWriter<K> {
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        children.extend(self.content.take());
    }

    fn configure(&self, environment: &mut EnvironmentValues<'_>) -> Result<(), Error> {
        environment.set::<K>(self.value.clone());
        Ok(())
    }

    fn requires_setup(&self, previous: &Self) -> bool {
        self.value != previous.value
    }
}

type ReadFn<V> = Box<dyn Fn(V) -> AnyElement>;

/// Builds its body from one environment value.
pub struct EnvironmentReader<K: EnvironmentKey> {
    read: ReadFn<K::Value>,
}

impl<K: EnvironmentKey> fmt::Debug for EnvironmentReader<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentReader")
            .field("key", &K::name())
            .finish_non_exhaustive()
    }
}

impl<K: EnvironmentKey> EnvironmentReader<K> {
    /// Calls `read` with the nearest value of `K` to build the body.
    pub fn new<E: Into<AnyElement>>(read: impl Fn(K::Value) -> E + 'static) -> Self {
        Self {
            read: Box::new(move |v| read(v).into()),
        }
    }
}

impl<K: EnvironmentKey> Element for EnvironmentReader<K> {
    fn body(&self, scope: &BuildScope<'_>) -> Result<Option<AnyElement>, Error> {
        let value = scope.environment().require::<K>()?;
        Ok(Some((self.read)(value)))
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

type ScopeFn = Box<dyn Fn(&mut NodeScope<'_>) -> Result<(), Error>>;

/// Runs an action when its node is set up.
pub struct SetupModifier {
    action: ScopeFn,
    content: Option<AnyElement>,
}

impl fmt::Debug for SetupModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetupModifier")
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl SetupModifier {
    /// Wraps `content`, running `action` on setup enter.
    pub fn new(
        content: impl Into<AnyElement>,
        action: impl Fn(&mut NodeScope<'_>) -> Result<(), Error> + 'static,
    ) -> Self {
        Self {
            action: Box::new(action),
            content: Some(content.into()),
        }
    }
}

impl Element for SetupModifier {
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        children.extend(self.content.take());
    }

    fn behavior(&self) -> Option<&dyn Behavior> {
        Some(self)
    }
}

impl Behavior for SetupModifier {
    fn setup_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
        (self.action)(scope)
    }
}

/// Runs an action on every workload pass.
pub struct WorkloadModifier {
    action: ScopeFn,
    content: Option<AnyElement>,
}

impl fmt::Debug for WorkloadModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkloadModifier")
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl WorkloadModifier {
    /// Wraps `content`, running `action` on workload enter.
    pub fn new(
        content: impl Into<AnyElement>,
        action: impl Fn(&mut NodeScope<'_>) -> Result<(), Error> + 'static,
    ) -> Self {
        Self {
            action: Box::new(action),
            content: Some(content.into()),
        }
    }
}

impl Element for WorkloadModifier {
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        children.extend(self.content.take());
    }

    fn behavior(&self) -> Option<&dyn Behavior> {
        Some(self)
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

impl Behavior for WorkloadModifier {
    fn workload_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
        (self.action)(scope)
    }
}

/// Calls an action while building whenever a watched value differs from the
/// value seen on the previous update.
pub struct OnChange<V: 'static> {
    value: V,
    initial: bool,
    action: Rc<dyn Fn(&V, &V)>,
    previous: State<Option<V>>,
    content: Option<AnyElement>,
}

impl<V: fmt::Debug> fmt::Debug for OnChange<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnChange")
            .field("value", &self.value)
            .field("initial", &self.initial)
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

impl<V: Clone + PartialEq + fmt::Debug + 'static> OnChange<V> {
    /// Wraps `content`, calling `action(old, new)` when `value` changes.
    pub fn new(
        content: impl Into<AnyElement>,
        value: V,
        action: impl Fn(&V, &V) + 'static,
    ) -> Self {
        Self {
            value,
            initial: false,
            action: Rc::new(action),
            previous: State::new(None),
            content: Some(content.into()),
        }
    }

    /// Also calls the action (with equal old and new values) on the first
    /// update.
    #[must_use]
    pub fn initial(mut self, initial: bool) -> Self {
        self.initial = initial;
        self
    }
}

impl<V: Clone + PartialEq + fmt::Debug + 'static> Element for OnChange<V> {
    fn declare_state(&mut self, slots: &mut StateSlots<'_>) {
        slots.slot("previous", &mut self.previous);
    }

    fn body(&self, scope: &BuildScope<'_>) -> Result<Option<AnyElement>, Error> {
        let cx = scope.cx();
        match self.previous.peek(cx) {
            None => {
                if self.initial {
                    (self.action)(&self.value, &self.value);
                }
                self.previous.set(cx, Some(self.value.clone()));
            }
            Some(old) if old != self.value => {
                (self.action)(&old, &self.value);
                self.previous.set(cx, Some(self.value.clone()));
            }
            Some(_) => {}
        }
        Ok(None)
    }

    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        children.extend(self.content.take());
    }

    fn requires_setup(&self, _previous: &Self) -> bool {
        false
    }
}

/// Chaining helpers for anything convertible to [`AnyElement`].
pub trait ElementExt: Into<AnyElement> + Sized {
    /// Erases the element.
    fn erased(self) -> AnyElement {
        self.into()
    }

    /// Attaches an explicit key.
    fn keyed(self, key: impl Into<Key>) -> AnyElement {
        self.into().with_key(key)
    }

    /// Writes `value` for `K` in this element's subtree.
    fn environment<K: EnvironmentKey>(self, value: K::Value) -> EnvironmentWriter<K> {
        EnvironmentWriter::new(value, self)
    }

    /// Runs `action` whenever the wrapper node is set up.
    fn on_setup_enter(
        self,
        action: impl Fn(&mut NodeScope<'_>) -> Result<(), Error> + 'static,
    ) -> SetupModifier {
        SetupModifier::new(self, action)
    }

    /// Runs `action` on every workload pass.
    fn on_workload_enter(
        self,
        action: impl Fn(&mut NodeScope<'_>) -> Result<(), Error> + 'static,
    ) -> WorkloadModifier {
        WorkloadModifier::new(self, action)
    }

    /// Calls `action(old, new)` when `value` differs from the previous
    /// update's value.
    fn on_change<V: Clone + PartialEq + fmt::Debug + 'static>(
        self,
        value: V,
        action: impl Fn(&V, &V) + 'static,
    ) -> OnChange<V> {
        OnChange::new(self, value, action)
    }
}

impl<T: Into<AnyElement>> ElementExt for T {}
