// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The element description protocol.
//!
//! An [`Element`] is an immutable, user-authored description of one tree
//! position: a render pass, a pipeline, a draw, a container. Applications
//! build a fresh element tree every cycle; the
//! [`Reconciler`](crate::reconciler::Reconciler) matches it against the
//! retained node tree and then discards it.
//!
//! An element contributes to the tree in up to three ways:
//!
//! - **Body**: a single element computed from the element's own fields, its
//!   state, and the environment ([`Element::body`]).
//! - **Children**: elements it owns by value ([`Element::take_children`]).
//! - **Behavior**: lifecycle callbacks invoked by the setup and workload
//!   passes ([`Element::behavior`] returning a [`Behavior`]).
//!
//! [`AnyElement`] erases the concrete type and carries an optional explicit
//! [`Key`].
//!
//! ```
//! use umbra_core::element::{AnyElement, Behavior, Element, NodeScope};
//! use umbra_core::Error;
//!
//! #[derive(PartialEq)]
//! struct Draw {
//!     vertex_count: u32,
//! }
//!
//! impl Element for Draw {
//!     fn behavior(&self) -> Option<&dyn Behavior> {
//!         Some(self)
//!     }
//!
//!     fn requires_setup(&self, previous: &Self) -> bool {
//!         self != previous
//!     }
//! }
//!
//! impl Behavior for Draw {
//!     fn workload_enter(&self, _scope: &mut NodeScope<'_>) -> Result<(), Error> {
//!         // Encode the draw here.
//!         Ok(())
//!     }
//! }
//!
//! let erased = AnyElement::new(Draw { vertex_count: 3 }).with_key("triangle");
//! assert!(erased.downcast_ref::<Draw>().is_some());
//! ```

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use crate::context::ReconcilerContext;
use crate::environment::{Environment, EnvironmentValues};
use crate::error::Error;
use crate::identity::{ElementTypeId, Key, StructuralIdentifier};
use crate::node::NodeId;
use crate::observed::Observations;
use crate::state::StateSlots;

/// A declarative description of one tree position.
///
/// Every method has a default, so a plain marker struct is already a valid
/// (empty) element.
pub trait Element: Any {
    /// Computes the element's single body element, if it has one.
    ///
    /// Runs with the node active on the context, so state reads register a
    /// dependency on this node.
    ///
    /// # Errors
    ///
    /// Errors abort the update and are returned from it unchanged.
    fn body(&self, scope: &BuildScope<'_>) -> Result<Option<AnyElement>, Error> {
        _ = scope;
        Ok(None)
    }

    /// Moves the element's owned children into `children`, in order.
    fn take_children(&mut self, children: &mut Vec<AnyElement>) {
        _ = children;
    }

    /// Declares the element's state slots by name.
    fn declare_state(&mut self, slots: &mut StateSlots<'_>) {
        _ = slots;
    }

    /// Declares the observable objects the element depends on.
    fn declare_observed(&self, observations: &mut Observations<'_>) {
        _ = observations;
    }

    /// Writes environment values for this node and its subtree.
    ///
    /// # Errors
    ///
    /// Errors abort the update and are returned from it unchanged.
    fn configure(&self, environment: &mut EnvironmentValues<'_>) -> Result<(), Error> {
        _ = environment;
        Ok(())
    }

    /// Returns the element's lifecycle callbacks, if it has any.
    fn behavior(&self) -> Option<&dyn Behavior> {
        None
    }

    /// Returns whether a reused node must run setup again when its element
    /// changes from `previous` to `self`.
    ///
    /// The default treats elements as incomparable and always answers `true`.
    fn requires_setup(&self, previous: &Self) -> bool
    where
        Self: Sized,
    {
        _ = previous;
        true
    }
}

/// Lifecycle callbacks of a leaf (or any element with side effects).
///
/// The setup pass calls `setup_enter`/`setup_exit` on nodes flagged
/// `needs_setup`; the workload pass calls `workload_enter`/`workload_exit`
/// on every node. `*_enter` runs before the node's subtree, `*_exit` after.
pub trait Behavior {
    /// Called before the subtree's setup callbacks.
    ///
    /// # Errors
    ///
    /// Errors abort the pass and are returned from it unchanged.
    fn setup_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
        _ = scope;
        Ok(())
    }

    /// Called after the subtree's setup callbacks.
    ///
    /// # Errors
    ///
    /// Errors abort the pass and are returned from it unchanged.
    fn setup_exit(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
        _ = scope;
        Ok(())
    }

    /// Called before the subtree's workload callbacks.
    ///
    /// # Errors
    ///
    /// Errors abort the pass and are returned from it unchanged.
    fn workload_enter(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
        _ = scope;
        Ok(())
    }

    /// Called after the subtree's workload callbacks.
    ///
    /// # Errors
    ///
    /// Errors abort the pass and are returned from it unchanged.
    fn workload_exit(&self, scope: &mut NodeScope<'_>) -> Result<(), Error> {
        _ = scope;
        Ok(())
    }
}

/// What [`Element::body`] can see about its node.
pub struct BuildScope<'a> {
    pub(crate) id: NodeId,
    pub(crate) identifier: &'a StructuralIdentifier,
    pub(crate) environment: Environment<'a>,
    pub(crate) cx: &'a ReconcilerContext,
}

impl fmt::Debug for BuildScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildScope")
            .field("id", &self.id)
            .field("identifier", self.identifier)
            .finish_non_exhaustive()
    }
}

impl<'a> BuildScope<'a> {
    /// Returns the node being built.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the node's structural identifier.
    #[must_use]
    pub fn identifier(&self) -> &'a StructuralIdentifier {
        self.identifier
    }

    /// Returns the node's environment, including values its own element
    /// configured.
    #[must_use]
    pub fn environment(&self) -> Environment<'a> {
        self.environment
    }

    /// Returns the reconciler context for state access.
    #[must_use]
    pub fn cx(&self) -> &'a ReconcilerContext {
        self.cx
    }
}

/// What a [`Behavior`] callback can see and change about its node.
pub struct NodeScope<'a> {
    pub(crate) id: NodeId,
    pub(crate) identifier: &'a StructuralIdentifier,
    pub(crate) depth: u32,
    pub(crate) environment: EnvironmentValues<'a>,
    pub(crate) cx: &'a ReconcilerContext,
}

impl fmt::Debug for NodeScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeScope")
            .field("id", &self.id)
            .field("identifier", self.identifier)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl<'a> NodeScope<'a> {
    /// Returns the visited node.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the node's structural identifier.
    #[must_use]
    pub fn identifier(&self) -> &'a StructuralIdentifier {
        self.identifier
    }

    /// Returns the node's distance from the root.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns the node's environment. Values written here survive updates
    /// until the node is destroyed.
    pub fn environment(&mut self) -> &mut EnvironmentValues<'a> {
        &mut self.environment
    }

    /// Returns the reconciler context for state access.
    #[must_use]
    pub fn cx(&self) -> &'a ReconcilerContext {
        self.cx
    }
}

type CompareFn = fn(&dyn Element, &dyn Element) -> bool;

/// A type-erased element with an optional explicit key.
pub struct AnyElement {
    inner: Box<dyn Element>,
    ty: ElementTypeId,
    key: Option<Key>,
    compare: CompareFn,
}

impl fmt::Debug for AnyElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyElement")
            .field("type", &self.ty)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<E: Element> From<E> for AnyElement {
    fn from(element: E) -> Self {
        Self::new(element)
    }
}

fn compare_as<E: Element>(current: &dyn Element, previous: &dyn Element) -> bool {
    let current: &dyn Any = current;
    let previous: &dyn Any = previous;
    match (current.downcast_ref::<E>(), previous.downcast_ref::<E>()) {
        (Some(current), Some(previous)) => current.requires_setup(previous),
        _ => true,
    }
}

impl AnyElement {
    /// Erases `element`.
    pub fn new<E: Element>(element: E) -> Self {
        Self {
            inner: Box::new(element),
            ty: ElementTypeId::of::<E>(),
            key: None,
            compare: compare_as::<E>,
        }
    }

    /// Attaches an explicit key, replacing positional identity.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Returns the explicit key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Returns the concrete element type.
    #[must_use]
    pub fn element_type(&self) -> ElementTypeId {
        self.ty
    }

    /// Returns the element as `E`, if that is its concrete type.
    #[must_use]
    pub fn downcast_ref<E: Element>(&self) -> Option<&E> {
        let any: &dyn Any = &*self.inner;
        any.downcast_ref::<E>()
    }

    /// Returns the element as a trait object.
    #[must_use]
    pub fn as_element(&self) -> &dyn Element {
        &*self.inner
    }

    /// Returns the element's lifecycle callbacks, if any.
    #[must_use]
    pub fn behavior(&self) -> Option<&dyn Behavior> {
        self.inner.behavior()
    }

    /// Returns whether replacing `previous` with `self` requires setup.
    ///
    /// Elements of different types always do.
    #[must_use]
    pub fn requires_setup(&self, previous: &Self) -> bool {
        if self.ty != previous.ty {
            return true;
        }
        (self.compare)(&*self.inner, &*previous.inner)
    }

    pub(crate) fn element_mut(&mut self) -> &mut dyn Element {
        &mut *self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(PartialEq)]
    struct Draw(u32);

    impl Element for Draw {
        fn requires_setup(&self, previous: &Self) -> bool {
            self != previous
        }
    }

    struct Marker;
    impl Element for Marker {}

    #[test]
    fn compare_uses_concrete_impl() {
        let a = AnyElement::new(Draw(1));
        let b = AnyElement::new(Draw(1));
        let c = AnyElement::new(Draw(2));
        assert!(!a.requires_setup(&b));
        assert!(a.requires_setup(&c));
    }

    #[test]
    fn default_compare_is_conservative() {
        assert!(AnyElement::new(Marker).requires_setup(&AnyElement::new(Marker)));
    }

    #[test]
    fn type_change_requires_setup() {
        assert!(AnyElement::new(Draw(1)).requires_setup(&AnyElement::new(Marker)));
    }

    #[test]
    fn keys_and_downcasts() {
        let e = AnyElement::from(Draw(4)).with_key(9);
        assert_eq!(e.key(), Some(&Key::Int(9)));
        assert_eq!(e.element_type(), ElementTypeId::of::<Draw>());
        assert_eq!(e.downcast_ref::<Draw>().map(|d| d.0), Some(4));
        assert!(e.downcast_ref::<Marker>().is_none());
        assert!(e.behavior().is_none());
    }
}
