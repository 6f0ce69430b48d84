//! Template (PROTO) scopes.
//!
//! Each active template definition owns a dictionary and a route ledger so
//! names used in its body stay out of the enclosing scope.

use super::dictionary::Dictionary;
use super::ledger::RouteLedger;
use crate::options::TemplateLookup;
use ivio_core::ObjectHandle;
use smallvec::SmallVec;

/// `IS` binding of a field inside a template body to a template interface
/// field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsReference {
    pub container: ObjectHandle,
    pub field: String,
    pub interface: String,
}

/// One active template definition.
#[derive(Debug, Clone, Default)]
pub struct TemplateScope {
    name: String,
    pub dictionary: Dictionary,
    pub ledger: RouteLedger,
    is_refs: Vec<IsReference>,
}

impl TemplateScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_is_reference(&mut self, reference: IsReference) {
        self.is_refs.push(reference);
    }

    pub fn is_references(&self) -> &[IsReference] {
        &self.is_refs
    }
}

/// Result of a name lookup through the template scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLookup {
    Found(ObjectHandle),
    /// The innermost scope missed and its names are isolated.
    Blocked,
    /// No scope knows the name; the session dictionary comes next.
    Missed,
}

/// Stack of active template scopes, innermost last.
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    scopes: SmallVec<[TemplateScope; 2]>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: TemplateScope) {
        self.scopes.push(scope);
    }

    pub fn pop(&mut self) -> Option<TemplateScope> {
        self.scopes.pop()
    }

    pub fn current(&self) -> Option<&TemplateScope> {
        self.scopes.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut TemplateScope> {
        self.scopes.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Look `name` up from the innermost scope outwards.
    pub fn lookup(&self, name: &str, policy: TemplateLookup) -> ScopeLookup {
        let Some(innermost) = self.scopes.last() else {
            return ScopeLookup::Missed;
        };
        if let Some(handle) = innermost.dictionary.lookup(name) {
            return ScopeLookup::Found(handle);
        }
        match policy {
            TemplateLookup::Isolated => ScopeLookup::Blocked,
            TemplateLookup::FallThrough => self
                .scopes
                .iter()
                .rev()
                .skip(1)
                .find_map(|scope| scope.dictionary.lookup(name))
                .map_or(ScopeLookup::Missed, ScopeLookup::Found),
        }
    }
}
