//! Deferred ROUTE links.
//!
//! Links are recorded while their endpoints may still be undefined and
//! resolved once, when the enclosing stream or template scope closes.

use ivio_core::{Connector, ObjectHandle};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A link from `from.from_slot` to `to.to_slot`, by object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    pub from: String,
    pub from_slot: String,
    pub to: String,
    pub to_slot: String,
}

impl Route {
    pub fn new(
        from: impl Into<String>,
        from_slot: impl Into<String>,
        to: impl Into<String>,
        to_slot: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            from_slot: from_slot.into(),
            to: to.into(),
            to_slot: to_slot.into(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} TO {}.{}", self.from, self.from_slot, self.to, self.to_slot)
    }
}

/// Why a route could not be established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteFailure {
    /// One or both endpoint names are undefined; lists the missing names.
    Unresolved { route: Route, missing: Vec<String> },
    /// Both endpoints exist but the connector refused the link.
    Rejected { route: Route },
}

impl RouteFailure {
    pub fn route(&self) -> &Route {
        match self {
            RouteFailure::Unresolved { route, .. } | RouteFailure::Rejected { route } => route,
        }
    }

    /// Message suitable for a diagnostic.
    pub fn message(&self) -> String {
        match self {
            RouteFailure::Unresolved { route, missing } => format!(
                "Unable to create ROUTE from {}.{} to {}.{}. Couldn't find node reference(s): {}",
                route.from,
                route.from_slot,
                route.to,
                route.to_slot,
                missing.join(", ")
            ),
            RouteFailure::Rejected { route } => format!(
                "Unable to create ROUTE from {}.{} to {}.{}. The fields could not be connected.",
                route.from, route.from_slot, route.to, route.to_slot
            ),
        }
    }
}

/// Pending routes of one scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteLedger {
    routes: Vec<Route>,
}

impl RouteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Resolve and connect every route, emptying the ledger.
    ///
    /// A failed route never stops the others; failures are returned in
    /// recording order.
    pub fn resolve_all<L>(
        &mut self,
        mut lookup: L,
        connector: &mut dyn Connector,
    ) -> Vec<RouteFailure>
    where
        L: FnMut(&str) -> Option<ObjectHandle>,
    {
        let mut failures = Vec::new();
        for route in self.routes.drain(..) {
            let from = lookup(&route.from);
            let to = lookup(&route.to);
            match (from, to) {
                (Some(from), Some(to)) => {
                    if !connector.connect(from, &route.from_slot, to, &route.to_slot) {
                        failures.push(RouteFailure::Rejected { route });
                    }
                }
                (from, to) => {
                    let mut missing = Vec::with_capacity(2);
                    if from.is_none() {
                        missing.push(route.from.clone());
                    }
                    if to.is_none() {
                        missing.push(route.to.clone());
                    }
                    failures.push(RouteFailure::Unresolved { route, missing });
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::Dictionary;
    use ivio_core::RejectingConnector;

    #[test]
    fn test_route_display() {
        let route = Route::new("Timer", "fraction_changed", "Mover", "set_fraction");
        assert_eq!(route.to_string(), "Timer.fraction_changed TO Mover.set_fraction");
    }

    #[test]
    fn test_resolve_after_late_definitions() {
        let mut ledger = RouteLedger::new();
        let mut dict = Dictionary::new();
        ledger.record(Route::new("A", "out", "B", "in"));
        dict.define("A", ObjectHandle::node(1));
        dict.define("B", ObjectHandle::node(2));

        let mut links = Vec::new();
        let mut connector = |from: ObjectHandle, fs: &str, to: ObjectHandle, ts: &str| {
            links.push((from, fs.to_string(), to, ts.to_string()));
            true
        };
        let failures = ledger.resolve_all(|n| dict.lookup(n), &mut connector);
        assert!(failures.is_empty());
        assert!(ledger.is_empty());
        assert_eq!(
            links,
            vec![(
                ObjectHandle::node(1),
                "out".to_string(),
                ObjectHandle::node(2),
                "in".to_string()
            )]
        );
    }

    #[test]
    fn test_missing_target_reported_once() {
        let mut ledger = RouteLedger::new();
        let mut dict = Dictionary::new();
        dict.define("A", ObjectHandle::node(1));
        dict.define("B", ObjectHandle::node(2));
        ledger.record(Route::new("A", "out", "Ghost", "in"));
        ledger.record(Route::new("A", "out", "B", "in"));

        let mut connected = 0;
        let mut connector = |_: ObjectHandle, _: &str, _: ObjectHandle, _: &str| {
            connected += 1;
            true
        };
        let failures = ledger.resolve_all(|n| dict.lookup(n), &mut connector);
        assert_eq!(connected, 1);
        assert_eq!(failures.len(), 1);
        match &failures[0] {
            RouteFailure::Unresolved { missing, .. } => {
                assert_eq!(missing, &vec!["Ghost".to_string()])
            }
            other => panic!("unexpected failure {:?}", other),
        }
        assert!(failures[0].message().contains("Ghost"));
    }

    #[test]
    fn test_rejected_route() {
        let mut ledger = RouteLedger::new();
        ledger.record(Route::new("A", "x", "A", "y"));
        let failures = ledger.resolve_all(|_| Some(ObjectHandle::node(1)), &mut RejectingConnector);
        assert!(matches!(failures[0], RouteFailure::Rejected { .. }));
        assert_eq!(failures[0].route().to_slot, "y");
    }
}
