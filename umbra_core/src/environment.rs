// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hierarchical environment values.
//!
//! Every node owns an [`EnvironmentStorage`]: a local key/value map plus a
//! link to the storage of its tree parent. Storages live side by side in the
//! node store and link to each other by slot index, so a child's link never
//! owns its parent.
//!
//! Lookup walks the chain: local map first, then each ancestor, then the
//! key's [`default_value`](EnvironmentKey::default_value). Writes are always
//! local, so a value set on a node is visible to that node's subtree and to
//! nothing else.
//!
//! Each entry remembers its [`Origin`]. Values written while configuring a
//! node from its element are [`Origin::Modifier`] and are rebuilt from the
//! element on every update. Values written by lifecycle callbacks (typically
//! resources created during setup) are [`Origin::Behavior`] and survive
//! updates until the node is destroyed.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{Any, TypeId};
use core::fmt;

use hashbrown::HashMap;

use crate::config::EnvironmentCheck;
use crate::error::Error;
use crate::identity::short_type_name;
use crate::node::INVALID;

/// A typed key into the environment.
///
/// ```
/// use umbra_core::environment::EnvironmentKey;
///
/// struct SampleCount;
///
/// impl EnvironmentKey for SampleCount {
///     type Value = u32;
///
///     fn default_value() -> Option<u32> {
///         Some(1)
///     }
/// }
/// ```
pub trait EnvironmentKey: 'static {
    /// The stored value type.
    type Value: Clone + PartialEq + 'static;

    /// Value returned when no storage in the chain holds the key.
    fn default_value() -> Option<Self::Value> {
        None
    }

    /// Human-readable key name for diagnostics.
    fn name() -> &'static str {
        short_type_name(core::any::type_name::<Self>())
    }
}

/// Who wrote an environment entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Written while configuring a node from its element.
    Modifier,
    /// Written by a setup or workload callback.
    Behavior,
}

struct Entry {
    name: &'static str,
    value: Box<dyn Any>,
    origin: Origin,
}

/// Local environment values of one node plus its parent link.
pub struct EnvironmentStorage {
    values: HashMap<TypeId, Entry>,
    parent: u32,
}

impl Default for EnvironmentStorage {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            parent: INVALID,
        }
    }
}

impl fmt::Debug for EnvironmentStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentStorage")
            .field("keys", &self.local_keys())
            .field("parent", &self.parent())
            .finish()
    }
}

impl EnvironmentStorage {
    /// Returns the slot index of the parent storage, if linked.
    #[must_use]
    pub fn parent(&self) -> Option<u32> {
        (self.parent != INVALID).then_some(self.parent)
    }

    /// Returns the names of the locally stored keys, sorted.
    #[must_use]
    pub fn local_keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.values.values().map(|e| e.name).collect();
        keys.sort_unstable();
        keys
    }

    /// Returns the number of locally stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns whether no keys are stored locally.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drops every entry and the parent link.
    pub(crate) fn reset(&mut self) {
        self.values.clear();
        self.parent = INVALID;
    }

    /// Drops modifier-origin entries, keeping values written by callbacks.
    pub(crate) fn retain_behavior_values(&mut self) {
        self.values.retain(|_, e| e.origin == Origin::Behavior);
    }

    fn get_local<K: EnvironmentKey>(&self) -> Option<&K::Value> {
        self.values
            .get(&TypeId::of::<K>())
            .and_then(|e| e.value.downcast_ref::<K::Value>())
    }
}

/// Links `child`'s storage to `parent`'s storage.
///
/// # Panics
///
/// Panics if the link would make a storage its own parent, or (with
/// [`EnvironmentCheck::FullChain`]) its own ancestor.
pub(crate) fn link_parent(
    storages: &mut [EnvironmentStorage],
    child: u32,
    parent: u32,
    check: EnvironmentCheck,
) {
    assert!(
        child != parent,
        "environment storage cannot be its own parent"
    );
    if check == EnvironmentCheck::FullChain {
        let mut cursor = parent;
        while cursor != INVALID {
            assert!(
                cursor != child,
                "environment storage cannot be its own ancestor"
            );
            cursor = storages[cursor as usize].parent;
        }
    }
    storages[child as usize].parent = parent;
}

fn lookup<K: EnvironmentKey>(storages: &[EnvironmentStorage], start: u32) -> Option<&K::Value> {
    let mut cursor = start;
    while cursor != INVALID {
        let storage = &storages[cursor as usize];
        if let Some(v) = storage.get_local::<K>() {
            return Some(v);
        }
        cursor = storage.parent;
    }
    None
}

/// Read-only view of one node's environment.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    storages: &'a [EnvironmentStorage],
    node: u32,
}

impl fmt::Debug for Environment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

impl<'a> Environment<'a> {
    pub(crate) fn new(storages: &'a [EnvironmentStorage], node: u32) -> Self {
        Self { storages, node }
    }

    /// Returns the nearest value of `K`, falling back to its default.
    #[must_use]
    pub fn get<K: EnvironmentKey>(&self) -> Option<K::Value> {
        lookup::<K>(self.storages, self.node)
            .cloned()
            .or_else(K::default_value)
    }

    /// Returns the nearest value of `K`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEnvironment`] if neither the chain nor the
    /// key's default supplies a value.
    pub fn require<K: EnvironmentKey>(&self) -> Result<K::Value, Error> {
        self.get::<K>()
            .ok_or(Error::MissingEnvironment { key: K::name() })
    }

    /// Returns whether any storage in the chain holds `K`.
    #[must_use]
    pub fn contains<K: EnvironmentKey>(&self) -> bool {
        lookup::<K>(self.storages, self.node).is_some()
    }

    /// Returns whether this node's own storage holds `K`.
    #[must_use]
    pub fn contains_local<K: EnvironmentKey>(&self) -> bool {
        self.storages[self.node as usize].get_local::<K>().is_some()
    }

    /// Returns the names of this node's locally stored keys, sorted.
    #[must_use]
    pub fn local_keys(&self) -> Vec<&'static str> {
        self.storages[self.node as usize].local_keys()
    }
}

/// Read/write view of one node's environment.
///
/// Writes land in the node's own storage with the view's [`Origin`].
pub struct EnvironmentValues<'a> {
    storages: &'a mut [EnvironmentStorage],
    node: u32,
    origin: Origin,
}

impl fmt::Debug for EnvironmentValues<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentValues")
            .field("node", &self.node)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl<'a> EnvironmentValues<'a> {
    pub(crate) fn new(storages: &'a mut [EnvironmentStorage], node: u32, origin: Origin) -> Self {
        Self {
            storages,
            node,
            origin,
        }
    }

    /// Returns a read-only view of the same node.
    #[must_use]
    pub fn view(&self) -> Environment<'_> {
        Environment::new(self.storages, self.node)
    }

    /// Returns the nearest value of `K`, falling back to its default.
    #[must_use]
    pub fn get<K: EnvironmentKey>(&self) -> Option<K::Value> {
        self.view().get::<K>()
    }

    /// Returns the nearest value of `K`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEnvironment`] if no value is available.
    pub fn require<K: EnvironmentKey>(&self) -> Result<K::Value, Error> {
        self.view().require::<K>()
    }

    /// Returns whether any storage in the chain holds `K`.
    #[must_use]
    pub fn contains<K: EnvironmentKey>(&self) -> bool {
        self.view().contains::<K>()
    }

    /// Writes `value` for `K` into this node's storage.
    pub fn set<K: EnvironmentKey>(&mut self, value: K::Value) {
        self.storages[self.node as usize].values.insert(
            TypeId::of::<K>(),
            Entry {
                name: K::name(),
                value: Box::new(value),
                origin: self.origin,
            },
        );
    }

    /// Removes `K` from this node's storage, returning the old local value.
    pub fn remove_local<K: EnvironmentKey>(&mut self) -> Option<K::Value> {
        let entry = self.storages[self.node as usize]
            .values
            .remove(&TypeId::of::<K>())?;
        entry.value.downcast::<K::Value>().ok().map(|v| *v)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    struct Device;
    impl EnvironmentKey for Device {
        type Value = &'static str;
    }

    struct SampleCount;
    impl EnvironmentKey for SampleCount {
        type Value = u32;

        fn default_value() -> Option<u32> {
            Some(1)
        }
    }

    /// Builds a chain 0 <- 1 <- 2.
    fn chain() -> Vec<EnvironmentStorage> {
        let mut storages = vec![
            EnvironmentStorage::default(),
            EnvironmentStorage::default(),
            EnvironmentStorage::default(),
        ];
        link_parent(&mut storages, 1, 0, EnvironmentCheck::FullChain);
        link_parent(&mut storages, 2, 1, EnvironmentCheck::FullChain);
        storages
    }

    #[test]
    fn lookup_walks_ancestors() {
        let mut storages = chain();
        EnvironmentValues::new(&mut storages, 0, Origin::Modifier).set::<Device>("gpu0");
        let env = Environment::new(&storages, 2);
        assert_eq!(env.get::<Device>(), Some("gpu0"));
        assert!(env.contains::<Device>());
        assert!(!env.contains_local::<Device>());
    }

    #[test]
    fn nearest_ancestor_wins() {
        let mut storages = chain();
        EnvironmentValues::new(&mut storages, 0, Origin::Modifier).set::<SampleCount>(4);
        EnvironmentValues::new(&mut storages, 1, Origin::Modifier).set::<SampleCount>(8);
        assert_eq!(Environment::new(&storages, 2).get::<SampleCount>(), Some(8));
        assert_eq!(Environment::new(&storages, 0).get::<SampleCount>(), Some(4));
    }

    #[test]
    fn default_applies_when_absent() {
        let storages = chain();
        let env = Environment::new(&storages, 2);
        assert_eq!(env.get::<SampleCount>(), Some(1));
        assert!(!env.contains::<SampleCount>());
        assert_eq!(env.get::<Device>(), None);
    }

    #[test]
    fn require_reports_missing_key() {
        let storages = chain();
        let err = Environment::new(&storages, 2).require::<Device>().unwrap_err();
        assert!(matches!(err, Error::MissingEnvironment { key: "Device" }));
    }

    #[test]
    fn writes_are_local() {
        let mut storages = chain();
        EnvironmentValues::new(&mut storages, 1, Origin::Modifier).set::<Device>("gpu1");
        assert_eq!(Environment::new(&storages, 0).get::<Device>(), None);
        assert_eq!(Environment::new(&storages, 2).get::<Device>(), Some("gpu1"));
    }

    #[test]
    fn retain_keeps_behavior_values() {
        let mut storages = chain();
        EnvironmentValues::new(&mut storages, 1, Origin::Modifier).set::<Device>("gpu1");
        EnvironmentValues::new(&mut storages, 1, Origin::Behavior).set::<SampleCount>(4);
        storages[1].retain_behavior_values();
        assert_eq!(storages[1].local_keys(), vec!["SampleCount"]);
    }

    #[test]
    fn remove_local_returns_value() {
        let mut storages = chain();
        let mut values = EnvironmentValues::new(&mut storages, 2, Origin::Modifier);
        values.set::<SampleCount>(16);
        assert_eq!(values.remove_local::<SampleCount>(), Some(16));
        assert_eq!(values.get::<SampleCount>(), Some(1));
    }

    #[test]
    #[should_panic(expected = "environment storage cannot be its own parent")]
    fn self_link_panics() {
        let mut storages = chain();
        link_parent(&mut storages, 1, 1, EnvironmentCheck::SelfLink);
    }

    #[test]
    #[should_panic(expected = "environment storage cannot be its own ancestor")]
    fn cyclic_link_panics() {
        let mut storages = chain();
        link_parent(&mut storages, 0, 2, EnvironmentCheck::FullChain);
    }
}
