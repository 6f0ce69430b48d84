//! Name to object dictionaries.
//!
//! A [`Dictionary`] belongs to one session or template scope. Redefining a
//! name silently replaces the old binding. The [`GlobalDictionary`] is shared
//! by every session of a process and can hold several objects per name.

use indexmap::IndexMap;
use ivio_core::{ObjectHandle, ObjectKind};
use parking_lot::RwLock;

/// Per-scope name bindings, in definition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<String, ObjectHandle>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, returning the handle it replaced.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        handle: ObjectHandle,
    ) -> Option<ObjectHandle> {
        self.entries.insert(name.into(), handle)
    }

    pub fn lookup(&self, name: &str) -> Option<ObjectHandle> {
        self.entries.get(name).copied()
    }

    /// Remove the binding for `name`.
    pub fn undefine(&mut self, name: &str) -> Option<ObjectHandle> {
        self.entries.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Bindings in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ObjectHandle)> {
        self.entries.iter().map(|(name, handle)| (name.as_str(), *handle))
    }
}

/// Process-wide dictionary consulted when a session lookup fails.
///
/// Lookups take a shared lock; definitions are serialized.
#[derive(Debug, Default)]
pub struct GlobalDictionary {
    entries: RwLock<IndexMap<String, Vec<ObjectHandle>>>,
}

impl GlobalDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `handle` under `name`. A handle already listed moves to the end,
    /// making it the preferred match.
    pub fn define(&self, name: &str, handle: ObjectHandle) {
        let mut entries = self.entries.write();
        let list = entries.entry(name.to_string()).or_default();
        list.retain(|h| *h != handle);
        list.push(handle);
    }

    /// Most recently defined object named `name` that passes `filter`.
    pub fn lookup(&self, name: &str, filter: Option<ObjectKind>) -> Option<ObjectHandle> {
        let entries = self.entries.read();
        entries
            .get(name)?
            .iter()
            .rev()
            .find(|h| h.matches(filter))
            .copied()
    }

    /// All objects named `name` that pass `filter`, oldest first.
    pub fn lookup_all(&self, name: &str, filter: Option<ObjectKind>) -> Vec<ObjectHandle> {
        let entries = self.entries.read();
        entries
            .get(name)
            .map(|list| list.iter().filter(|h| h.matches(filter)).copied().collect())
            .unwrap_or_default()
    }

    /// Remove `handle` from `name`. Returns whether it was listed.
    pub fn undefine(&self, name: &str, handle: ObjectHandle) -> bool {
        let mut entries = self.entries.write();
        let Some(list) = entries.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| *h != handle);
        let removed = list.len() != before;
        if list.is_empty() {
            entries.shift_remove(name);
        }
        removed
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
