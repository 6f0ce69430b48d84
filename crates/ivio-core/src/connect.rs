//! Collaborator trait for wiring ROUTE endpoints.

use crate::handle::ObjectHandle;

/// Connects a slot on one object to a slot on another.
///
/// Implemented by the scene graph layer. Returns `false` when the slots do
/// not exist or cannot be connected; the engine reports that as a
/// diagnostic and moves on.
pub trait Connector {
    /// Wire `from.from_slot` to `to.to_slot`.
    fn connect(
        &mut self,
        from: ObjectHandle,
        from_slot: &str,
        to: ObjectHandle,
        to_slot: &str,
    ) -> bool;
}

impl<F> Connector for F
where
    F: FnMut(ObjectHandle, &str, ObjectHandle, &str) -> bool,
{
    fn connect(
        &mut self,
        from: ObjectHandle,
        from_slot: &str,
        to: ObjectHandle,
        to_slot: &str,
    ) -> bool {
        self(from, from_slot, to, to_slot)
    }
}

/// Connector that refuses every link.
///
/// Used when a session reads ROUTEs without any scene graph attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectingConnector;

impl Connector for RejectingConnector {
    fn connect(
        &mut self,
        _from: ObjectHandle,
        _from_slot: &str,
        _to: ObjectHandle,
        _to_slot: &str,
    ) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_connector() {
        let mut links = Vec::new();
        {
            let mut connector = |a: ObjectHandle, fa: &str, b: ObjectHandle, fb: &str| {
                links.push(format!("{}.{} -> {}.{}", a, fa, b, fb));
                true
            };
            assert!(connector.connect(ObjectHandle::node(1), "out", ObjectHandle::node(2), "in"));
        }
        assert_eq!(links, vec!["node#1.out -> node#2.in"]);
    }

    #[test]
    fn test_rejecting_connector() {
        let mut c = RejectingConnector;
        assert!(!c.connect(ObjectHandle::node(1), "a", ObjectHandle::node(2), "b"));
    }
}
