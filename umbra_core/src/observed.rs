// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bridging external change notifications into the dirty set.
//!
//! An external model object implements [`ObservableObject`] by exposing a
//! [`ChangeNotifier`] and calling [`ChangeNotifier::notify`] whenever it
//! changes. Elements hold such objects through [`ObservedObject`] and list
//! them in [`Element::declare_observed`](crate::element::Element::declare_observed).
//!
//! The reconciler keeps at most one [`Subscription`] per (node, object) pair.
//! A notification marks the node dirty through a [`WeakContext`]; it never
//! re-walks the tree. Subscriptions for objects a node stops declaring are
//! dropped on the next update, and all of a node's subscriptions are dropped
//! when the node is destroyed.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::any::Any;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::ops::Deref;

use crate::context::{ReconcilerContext, WeakContext};
use crate::node::NodeId;
use crate::state::Binding;

type Callback = Rc<dyn Fn()>;

#[derive(Default)]
struct NotifierInner {
    subscribers: RefCell<Vec<(u64, Callback)>>,
    next_id: Cell<u64>,
}

/// A list of change callbacks owned by an observable object.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Rc<NotifierInner>,
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ChangeNotifier {
    /// Creates a notifier with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`. It stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .subscribers
            .borrow_mut()
            .push((id, Rc::new(callback)));
        Subscription {
            notifier: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Invokes every registered callback.
    ///
    /// Callbacks may subscribe or unsubscribe while running; changes take
    /// effect for the next notification.
    pub fn notify(&self) {
        let callbacks: Vec<Callback> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

/// Keeps a callback registered with a [`ChangeNotifier`] until dropped.
#[must_use = "dropping a subscription unsubscribes it"]
pub struct Subscription {
    notifier: Weak<NotifierInner>,
    id: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.notifier.upgrade() {
            inner
                .subscribers
                .borrow_mut()
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// An external object whose changes should invalidate the nodes using it.
pub trait ObservableObject: 'static {
    /// Returns the notifier fired on every change.
    fn notifier(&self) -> &ChangeNotifier;
}

/// A shared handle to an [`ObservableObject`] held by an element.
pub struct ObservedObject<T> {
    object: Rc<T>,
}

impl<T> Clone for ObservedObject<T> {
    fn clone(&self) -> Self {
        Self {
            object: Rc::clone(&self.object),
        }
    }
}

impl<T> PartialEq for ObservedObject<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.object, &other.object)
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservedObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObservedObject").field(&self.object).finish()
    }
}

impl<T> Deref for ObservedObject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.object
    }
}

impl<T: ObservableObject> ObservedObject<T> {
    /// Wraps a new object.
    #[must_use]
    pub fn new(object: T) -> Self {
        Self {
            object: Rc::new(object),
        }
    }

    /// Wraps an already shared object.
    #[must_use]
    pub fn from_rc(object: Rc<T>) -> Self {
        Self { object }
    }

    /// Returns the shared object.
    #[must_use]
    pub fn as_rc(&self) -> &Rc<T> {
        &self.object
    }

    /// Projects a field of the object as a [`Binding`].
    ///
    /// The object is expected to use interior mutability in `set` and to
    /// notify its observers itself.
    pub fn binding<V: 'static>(
        &self,
        get: impl Fn(&T) -> V + 'static,
        set: impl Fn(&T, V) + 'static,
    ) -> Binding<V> {
        let read = Rc::clone(&self.object);
        let write = Rc::clone(&self.object);
        let identity: Rc<dyn Any> = self.object.clone();
        Binding::from_parts(identity, move |_| get(&read), move |_, v| set(&write, v))
    }
}

/// One node's subscription to one object.
pub(crate) struct ObservedSubscription {
    object: Rc<dyn Any>,
    _subscription: Subscription,
}

impl fmt::Debug for ObservedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedSubscription").finish_non_exhaustive()
    }
}

/// Visitor passed to [`Element::declare_observed`](crate::element::Element::declare_observed).
pub struct Observations<'a> {
    node: NodeId,
    context: WeakContext,
    previous: Vec<ObservedSubscription>,
    next: &'a mut Vec<ObservedSubscription>,
}

impl fmt::Debug for Observations<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observations")
            .field("node", &self.node)
            .field("observed", &self.next.len())
            .finish_non_exhaustive()
    }
}

impl<'a> Observations<'a> {
    /// Starts a declaration pass over `subscriptions`.
    ///
    /// Existing subscriptions move to the new list as they are re-declared;
    /// whatever is left over is dropped when the visitor is dropped.
    pub(crate) fn new(
        node: NodeId,
        cx: &ReconcilerContext,
        subscriptions: &'a mut Vec<ObservedSubscription>,
    ) -> Self {
        let previous = core::mem::take(subscriptions);
        Self {
            node,
            context: cx.downgrade(),
            previous,
            next: subscriptions,
        }
    }

    /// Declares that the node depends on `object`.
    ///
    /// Declaring the same object twice in one pass is harmless.
    pub fn observe<T: ObservableObject>(&mut self, object: &ObservedObject<T>) {
        let erased: Rc<dyn Any> = object.object.clone();
        if self.next.iter().any(|s| Rc::ptr_eq(&s.object, &erased)) {
            return;
        }
        if let Some(pos) = self
            .previous
            .iter()
            .position(|s| Rc::ptr_eq(&s.object, &erased))
        {
            let kept = self.previous.swap_remove(pos);
            self.next.push(kept);
            return;
        }
        let context = self.context.clone();
        let node = self.node;
        let subscription = object.notifier().subscribe(move || {
            context.mark_dirty(node);
        });
        self.next.push(ObservedSubscription {
            object: erased,
            _subscription: subscription,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Atom, ElementTypeId, StructuralIdentifier};

    #[derive(Default)]
    struct Model {
        notifier: ChangeNotifier,
        value: Cell<i32>,
    }

    impl Model {
        fn set_value(&self, v: i32) {
            self.value.set(v);
            self.notifier.notify();
        }
    }

    impl ObservableObject for Model {
        fn notifier(&self) -> &ChangeNotifier {
            &self.notifier
        }
    }

    fn ident() -> StructuralIdentifier {
        StructuralIdentifier::new().appending(Atom::indexed(ElementTypeId::of::<Model>(), 0))
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let notifier = ChangeNotifier::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let sub = notifier.subscribe(move || counter.set(counter.get() + 1));
        notifier.notify();
        drop(sub);
        notifier.notify();
        assert_eq!(hits.get(), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn notification_marks_node_dirty() {
        let cx = ReconcilerContext::new();
        let node = NodeId::new(0, 0);
        cx.register(node, ident());
        let model = ObservedObject::new(Model::default());
        let mut subs = Vec::new();
        Observations::new(node, &cx, &mut subs).observe(&model);

        assert!(!cx.is_dirty(&ident()));
        model.set_value(3);
        assert!(cx.is_dirty(&ident()));
    }

    #[test]
    fn redeclaring_keeps_one_subscription() {
        let cx = ReconcilerContext::new();
        let node = NodeId::new(0, 0);
        let model = ObservedObject::new(Model::default());
        let mut subs = Vec::new();
        {
            let mut obs = Observations::new(node, &cx, &mut subs);
            obs.observe(&model);
            obs.observe(&model);
        }
        Observations::new(node, &cx, &mut subs).observe(&model.clone());
        assert_eq!(subs.len(), 1);
        assert_eq!(model.notifier().subscriber_count(), 1);
    }

    #[test]
    fn undeclared_objects_are_unsubscribed() {
        let cx = ReconcilerContext::new();
        let node = NodeId::new(0, 0);
        let a = ObservedObject::new(Model::default());
        let b = ObservedObject::new(Model::default());
        let mut subs = Vec::new();
        {
            let mut obs = Observations::new(node, &cx, &mut subs);
            obs.observe(&a);
            obs.observe(&b);
        }
        Observations::new(node, &cx, &mut subs).observe(&b);
        assert_eq!(a.notifier().subscriber_count(), 0);
        assert_eq!(b.notifier().subscriber_count(), 1);
    }

    #[test]
    fn binding_projects_field() {
        let cx = ReconcilerContext::new();
        let model = ObservedObject::new(Model::default());
        let binding = model.binding(|m| m.value.get(), Model::set_value);
        binding.set(&cx, 5);
        assert_eq!(binding.get(&cx), 5);
        assert_eq!(binding, model.binding(|m| m.value.get(), Model::set_value));
    }
}
