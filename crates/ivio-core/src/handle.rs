//! Opaque handles to caller-owned scene objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a scene object.
///
/// Used to restrict lookups in the process-wide dictionary to a kind of
/// object, e.g. only nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A scene graph node.
    Node,
    /// An engine driving field values.
    Engine,
    /// A named template definition.
    Proto,
    /// Anything else that can carry a name.
    Other,
}

impl ObjectKind {
    /// Short lowercase label used in log output.
    pub fn label(self) -> &'static str {
        match self {
            ObjectKind::Node => "node",
            ObjectKind::Engine => "engine",
            ObjectKind::Proto => "proto",
            ObjectKind::Other => "object",
        }
    }
}

/// Copyable identifier of an object living in an external object table.
///
/// Two handles are the same object exactly when they compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle {
    id: u64,
    kind: ObjectKind,
}

impl ObjectHandle {
    /// Create a handle from a table index and kind.
    pub const fn new(id: u64, kind: ObjectKind) -> Self {
        Self { id, kind }
    }

    /// Shorthand for a node handle.
    pub const fn node(id: u64) -> Self {
        Self::new(id, ObjectKind::Node)
    }

    /// Shorthand for an engine handle.
    pub const fn engine(id: u64) -> Self {
        Self::new(id, ObjectKind::Engine)
    }

    /// Index into the caller's object table.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Kind of the referenced object.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Whether this handle refers to a node.
    pub fn is_node(&self) -> bool {
        self.kind == ObjectKind::Node
    }

    /// Check the handle against an optional kind filter.
    pub fn matches(&self, filter: Option<ObjectKind>) -> bool {
        filter.map_or(true, |kind| kind == self.kind)
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind.label(), self.id)
    }
}
