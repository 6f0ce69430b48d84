//! Write-reference counting and DEF name assignment.
//!
//! Writing a graph takes two passes. The counting pass calls
//! [`WriteRefCounter::add_write_reference`] once per path that reaches an
//! object. The write pass asks [`WriteRefCounter::emission`] how to write
//! each object it reaches: in full, in full with a `DEF` name, or as a
//! `USE` of a name written earlier.
//!
//! Names are kept bare where possible. A name already claimed in the
//! current DEF scope, or an unnamed object that is written more than once,
//! gets an instance suffix: `Wheel+3`, or `_+0` for unnamed nodes.

use crate::codec::NameRules;
use crate::input::Dialect;
use crate::options::WriteOptions;
use indexmap::{IndexMap, IndexSet};
use ivio_core::ObjectHandle;

/// Identifier recorded for an object once it was first written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefId {
    /// Written under its own name.
    NoSuffix,
    /// Written under `name + prefix + id`.
    Suffix(u32),
}

/// How to write an object in the write pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// Write the body without a name.
    Body,
    /// Write `DEF name` and then the body.
    Def(String),
    /// Write `USE name` instead of the body.
    Use(String),
}

#[derive(Debug, Clone, Copy, Default)]
struct WriteState {
    write_refs: i32,
    in_graph: bool,
}

/// DEF names claimed so far, one set per template level.
#[derive(Debug, Clone)]
pub struct DefScopes {
    scopes: Vec<IndexSet<String>>,
}

impl Default for DefScopes {
    fn default() -> Self {
        Self::new()
    }
}

impl DefScopes {
    pub fn new() -> Self {
        Self {
            scopes: vec![IndexSet::new()],
        }
    }

    fn current(&mut self) -> &mut IndexSet<String> {
        if self.scopes.is_empty() {
            self.scopes.push(IndexSet::new());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub fn add(&mut self, name: &str) {
        self.current().insert(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes.last().map_or(false, |s| s.contains(name))
    }

    /// Release `name` for reuse. False if it was not claimed.
    pub fn remove(&mut self, name: &str) -> bool {
        self.current().shift_remove(name)
    }

    /// Start an empty scope for a template body.
    pub fn push(&mut self) {
        self.scopes.push(IndexSet::new());
    }

    /// Drop the innermost template scope. The outermost scope stays.
    pub fn pop(&mut self) -> bool {
        if self.scopes.len() > 1 {
            self.scopes.pop();
            true
        } else {
            false
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Forget every claimed name and template level.
    pub fn clear(&mut self) {
        self.scopes.truncate(1);
        self.current().clear();
    }
}

/// Per-output table of write counts and assigned identifiers.
#[derive(Debug, Clone)]
pub struct WriteRefCounter {
    states: IndexMap<ObjectHandle, WriteState>,
    ids: IndexMap<ObjectHandle, RefId>,
    next_id: u32,
    prefix: String,
    dont_mangle: bool,
}

impl Default for WriteRefCounter {
    fn default() -> Self {
        Self::new("+", false)
    }
}

impl WriteRefCounter {
    /// Counter using `prefix` between a name and its instance number.
    pub fn new(prefix: impl Into<String>, dont_mangle: bool) -> Self {
        Self {
            states: IndexMap::new(),
            ids: IndexMap::new(),
            next_id: 0,
            prefix: prefix.into(),
            dont_mangle,
        }
    }

    pub fn from_options(options: &WriteOptions) -> Self {
        Self::new(options.instance_prefix.clone(), options.dont_mangle_names)
    }

    pub fn instance_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_instance_prefix(&mut self, prefix: impl Into<String>) {
        self.prefix = prefix.into();
    }

    /// Release bare DEF names after their last use.
    pub fn set_dont_mangle(&mut self, enabled: bool) {
        self.dont_mangle = enabled;
    }

    // Counting pass

    /// Count one more path to `object`. References made only through
    /// field connections do not put the object in the graph.
    pub fn add_write_reference(&mut self, object: ObjectHandle, from_field: bool) {
        let refs = self.write_ref(object) + 1;
        if !from_field {
            self.set_in_graph(object, true);
        }
        self.set_write_ref(object, refs);
    }

    /// Remaining writes expected for `object`.
    pub fn write_ref(&self, object: ObjectHandle) -> i32 {
        self.states.get(&object).map_or(0, |s| s.write_refs)
    }

    /// Set the remaining write count. Reaching zero forgets the object so
    /// a later write starts over with a full body.
    pub fn set_write_ref(&mut self, object: ObjectHandle, refs: i32) {
        debug_assert!(refs >= 0, "write reference underflow for {}", object);
        if refs < 0 {
            log::warn!("write reference count below zero for {}", object);
        }
        if refs <= 0 {
            self.states.shift_remove(&object);
            self.ids.shift_remove(&object);
            return;
        }
        self.states.entry(object).or_default().write_refs = refs;
    }

    pub fn decrement_write_ref(&mut self, object: ObjectHandle) {
        let refs = self.write_ref(object) - 1;
        self.set_write_ref(object, refs);
    }

    pub fn has_multiple_write_refs(&self, object: ObjectHandle) -> bool {
        self.write_ref(object) > 1
    }

    /// Whether `object` is reached through the graph and must be written.
    pub fn should_write(&self, object: ObjectHandle) -> bool {
        self.in_graph(object)
    }

    pub fn in_graph(&self, object: ObjectHandle) -> bool {
        self.states.get(&object).map_or(false, |s| s.in_graph)
    }

    pub fn set_in_graph(&mut self, object: ObjectHandle, in_graph: bool) {
        self.states.entry(object).or_default().in_graph = in_graph;
    }

    // Identifiers

    /// Assign the next instance number to `object`.
    pub fn add_reference(&mut self, object: ObjectHandle) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(object, RefId::Suffix(id));
        id
    }

    /// Identifier of `object`, or `None` before its first write.
    pub fn find_reference(&self, object: ObjectHandle) -> Option<RefId> {
        self.ids.get(&object).copied()
    }

    pub fn set_reference(&mut self, object: ObjectHandle, id: RefId) {
        self.ids.insert(object, id);
    }

    pub fn remove_reference(&mut self, object: ObjectHandle) -> Option<RefId> {
        self.ids.shift_remove(&object)
    }

    fn suffixed(&self, object: ObjectHandle, name: &str, id: u32) -> String {
        let mut out = String::from(name);
        let valid_start = self
            .prefix
            .bytes()
            .next()
            .map_or(false, |c| NameRules::new(Dialect::Inventor, true).is_start(c));
        if name.is_empty() && object.is_node() && !valid_start {
            out.push('_');
        }
        out.push_str(&self.prefix);
        out.push_str(&id.to_string());
        out
    }

    /// Name to write for `object`, whose own name is `name`. The first
    /// call claims a name in `defs`; later calls return the same name.
    pub fn write_name(&mut self, object: ObjectHandle, name: &str, defs: &mut DefScopes) -> String {
        let multiref = self.has_multiple_write_refs(object);
        match self.find_reference(object) {
            Some(id) => {
                let write_name = match id {
                    RefId::NoSuffix => name.to_string(),
                    RefId::Suffix(n) => self.suffixed(object, name, n),
                };
                if !multiref && self.dont_mangle {
                    defs.remove(&write_name);
                }
                write_name
            }
            None => {
                let claimed = defs.contains(name);
                if !claimed && (!multiref || !name.is_empty()) {
                    if multiref {
                        defs.add(name);
                    }
                    self.set_reference(object, RefId::NoSuffix);
                    return name.to_string();
                }
                let id = self.add_reference(object);
                let write_name = self.suffixed(object, name, id);
                defs.add(&write_name);
                write_name
            }
        }
    }

    /// Decide how to write `object` now and count the write.
    pub fn emission(&mut self, object: ObjectHandle, name: &str, defs: &mut DefScopes) -> Emission {
        let first_write = self.find_reference(object).is_none();
        let multiref = self.has_multiple_write_refs(object);
        let write_name = self.write_name(object, name, defs);
        let emission = if !first_write {
            Emission::Use(write_name)
        } else if !name.is_empty() || multiref {
            Emission::Def(write_name)
        } else {
            Emission::Body
        };
        self.decrement_write_ref(object);
        emission
    }

    /// Objects whose expected writes never all happened.
    pub fn leftover(&self) -> Vec<ObjectHandle> {
        let left: Vec<ObjectHandle> = self
            .states
            .iter()
            .filter(|(_, s)| s.write_refs > 0)
            .map(|(&object, _)| object)
            .collect();
        if !left.is_empty() {
            log::warn!("{} object(s) still have pending write references", left.len());
        }
        left
    }

    /// Forget all counts and identifiers.
    pub fn clear(&mut self) {
        self.states.clear();
        self.ids.clear();
        self.next_id = 0;
    }
}
