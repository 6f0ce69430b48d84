//! Named references and deferred links on the read side.

pub mod dictionary;
pub mod ledger;
pub mod scope;

pub use dictionary::{Dictionary, GlobalDictionary};
pub use ledger::{Route, RouteFailure, RouteLedger};
pub use scope::{IsReference, ScopeLookup, ScopeStack, TemplateScope};
