//! ivio-core: Shared types for the ivio scene file engine.
//!
//! The engine never owns scene objects. It stores and compares the
//! [`ObjectHandle`]s the caller hands it, reports parse problems through a
//! [`DiagnosticSink`], and asks a [`Connector`] to wire ROUTE endpoints once
//! both ends are known.
//!
//! ```text
//! scene graph layer ──handles──> ivio ──diagnostics──> DiagnosticSink
//!          ^                        │
//!          └──── Connector ─────────┘
//! ```

pub mod connect;
pub mod diagnostics;
pub mod handle;

pub use connect::{Connector, RejectingConnector};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, LogSink, Severity};
pub use handle::{ObjectHandle, ObjectKind};
