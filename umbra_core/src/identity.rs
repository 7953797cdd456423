// Copyright 2026 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural identity of tree positions.
//!
//! A [`StructuralIdentifier`] is the path from the root to a position, one
//! [`Atom`] per level. Each atom pairs the element's type with a
//! disambiguator: either a positional index counted per type among the
//! untagged siblings of one parent, or an explicit [`Key`] supplied by the
//! caller. Two identifiers compare equal exactly when they name the same
//! logical slot, and that equality is the only criterion for node reuse.

use alloc::rc::Rc;
use alloc::string::String;
use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};

use smallvec::SmallVec;

/// Runtime identity of an element type.
///
/// Equality and hashing use only the [`TypeId`]; the name is carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct ElementTypeId {
    id: TypeId,
    name: &'static str,
}

impl ElementTypeId {
    /// Returns the identity of `T`.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Returns the full type name.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    /// Returns the type name without module path or generic arguments.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        short_type_name(self.name)
    }
}

impl PartialEq for ElementTypeId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ElementTypeId {}

impl Hash for ElementTypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ElementTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Strips the module path and generic arguments from a type name.
pub(crate) fn short_type_name(name: &'static str) -> &'static str {
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

/// An explicit, caller-supplied disambiguator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// An integer key.
    Int(i64),
    /// A string key.
    Str(Rc<str>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for Key {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Self::Str(v.into())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Self::Str(v.into())
    }
}

impl From<Rc<str>> for Key {
    fn from(v: Rc<str>) -> Self {
        Self::Str(v)
    }
}

/// The disambiguating half of an [`Atom`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    /// Positional index among untagged siblings of the same type.
    Index(u32),
    /// Explicit key.
    Explicit(Key),
}

/// One level of a [`StructuralIdentifier`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Atom {
    ty: ElementTypeId,
    component: Component,
}

impl Atom {
    /// Creates a positional atom.
    #[must_use]
    pub const fn indexed(ty: ElementTypeId, index: u32) -> Self {
        Self {
            ty,
            component: Component::Index(index),
        }
    }

    /// Creates an explicitly keyed atom.
    #[must_use]
    pub const fn keyed(ty: ElementTypeId, key: Key) -> Self {
        Self {
            ty,
            component: Component::Explicit(key),
        }
    }

    /// Returns the element type of this atom.
    #[inline]
    #[must_use]
    pub const fn element_type(&self) -> ElementTypeId {
        self.ty
    }

    /// Returns the disambiguator of this atom.
    #[inline]
    #[must_use]
    pub const fn component(&self) -> &Component {
        &self.component
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            Component::Index(i) => write!(f, "{}#{i}", self.ty.short_name()),
            Component::Explicit(k) => write!(f, "{}({k})", self.ty.short_name()),
        }
    }
}

/// The path of atoms from the root to a tree position.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct StructuralIdentifier {
    atoms: SmallVec<[Atom; 4]>,
}

impl StructuralIdentifier {
    /// Returns the empty identifier (the parent of the root).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this identifier extended by one atom.
    #[must_use]
    pub fn appending(&self, atom: Atom) -> Self {
        let mut atoms = self.atoms.clone();
        atoms.push(atom);
        Self { atoms }
    }

    /// Extends the identifier in place by one atom.
    pub(crate) fn push(&mut self, atom: Atom) {
        self.atoms.push(atom);
    }

    /// Drops the innermost atom.
    pub(crate) fn pop(&mut self) {
        self.atoms.pop();
    }

    pub(crate) fn clear(&mut self) {
        self.atoms.clear();
    }

    /// Returns the atoms from the root down.
    #[inline]
    #[must_use]
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Returns the number of atoms.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.atoms.len()
    }

    /// Returns the innermost atom, or `None` for the empty identifier.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Atom> {
        self.atoms.last()
    }

    /// Returns whether `self` is a strict prefix of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.atoms.len() < other.atoms.len() && other.atoms.starts_with(&self.atoms)
    }
}

impl fmt::Display for StructuralIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.atoms.is_empty() {
            return f.write_str("<root>");
        }
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{atom}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for StructuralIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StructuralIdentifier({self})")
    }
}

/// Assigns positional indices to untagged siblings, one counter per type.
///
/// A fresh counter set is used for each parent's child list.
#[derive(Debug, Default)]
pub(crate) struct SiblingCounters {
    counts: SmallVec<[(ElementTypeId, u32); 8]>,
}

impl SiblingCounters {
    /// Returns the next index for `ty` and advances its counter.
    pub(crate) fn next(&mut self, ty: ElementTypeId) -> u32 {
        if let Some((_, n)) = self.counts.iter_mut().find(|(t, _)| *t == ty) {
            let index = *n;
            *n += 1;
            index
        } else {
            self.counts.push((ty, 1));
            0
        }
    }

    /// Computes the atom for a child of type `ty` with an optional key.
    ///
    /// Keyed children do not consume a positional index.
    pub(crate) fn atom(&mut self, ty: ElementTypeId, key: Option<&Key>) -> Atom {
        match key {
            Some(key) => Atom::keyed(ty, key.clone()),
            None => Atom::indexed(ty, self.next(ty)),
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    struct Pass;
    struct Draw;
    struct Wrapper<T>(T);

    #[test]
    fn short_name_strips_path_and_generics() {
        assert_eq!(ElementTypeId::of::<Pass>().short_name(), "Pass");
        assert_eq!(ElementTypeId::of::<Wrapper<Draw>>().short_name(), "Wrapper");
    }

    #[test]
    fn type_ids_compare_by_type() {
        assert_eq!(ElementTypeId::of::<Pass>(), ElementTypeId::of::<Pass>());
        assert_ne!(ElementTypeId::of::<Pass>(), ElementTypeId::of::<Draw>());
    }

    #[test]
    fn counters_are_per_type() {
        let mut counters = SiblingCounters::default();
        let pass = ElementTypeId::of::<Pass>();
        let draw = ElementTypeId::of::<Draw>();
        assert_eq!(counters.next(pass), 0);
        assert_eq!(counters.next(draw), 0);
        assert_eq!(counters.next(pass), 1);
        assert_eq!(counters.next(draw), 1);
        assert_eq!(counters.next(draw), 2);
    }

    #[test]
    fn keyed_atoms_do_not_advance_counter() {
        let mut counters = SiblingCounters::default();
        let draw = ElementTypeId::of::<Draw>();
        let key = Key::from("a");
        let keyed = counters.atom(draw, Some(&key));
        let untagged = counters.atom(draw, None);
        assert_eq!(keyed, Atom::keyed(draw, Key::from("a")));
        assert_eq!(untagged, Atom::indexed(draw, 0));
    }

    #[test]
    fn identifiers_equal_iff_paths_equal() {
        let pass = ElementTypeId::of::<Pass>();
        let draw = ElementTypeId::of::<Draw>();
        let root = StructuralIdentifier::new().appending(Atom::indexed(pass, 0));
        let a = root.appending(Atom::indexed(draw, 0));
        let b = root.appending(Atom::indexed(draw, 0));
        let c = root.appending(Atom::indexed(draw, 1));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(root.is_ancestor_of(&a));
        assert!(!a.is_ancestor_of(&root));
        assert!(!a.is_ancestor_of(&b));
        assert_eq!(a.depth(), 2);
    }

    #[test]
    fn display_joins_atoms() {
        let pass = ElementTypeId::of::<Pass>();
        let draw = ElementTypeId::of::<Draw>();
        let id = StructuralIdentifier::new()
            .appending(Atom::indexed(pass, 0))
            .appending(Atom::keyed(draw, Key::from(7)))
            .appending(Atom::keyed(draw, Key::from("bg")));
        assert_eq!(format!("{id}"), "Pass#0/Draw(7)/Draw(\"bg\")");
        assert_eq!(format!("{}", StructuralIdentifier::new()), "<root>");
    }
}
