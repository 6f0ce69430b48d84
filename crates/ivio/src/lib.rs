//! ivio: Reader/writer engine for Open Inventor and VRML scene files.
//!
//! This crate turns a byte stream into the tokens a scene graph builder
//! consumes (names, numbers, strings, binary blobs), and writes those
//! tokens back out. It handles everything below the scene graph:
//!
//! - plain, gzip and bzip2 sources and sinks, sniffed by magic bytes
//! - buffered reading with push-back, line counting and optional prefetch
//! - header negotiation: ASCII or binary, version and dialect
//! - ASCII and big-endian binary encodings of every primitive
//! - DEF/USE name dictionaries, ROUTE bookkeeping and template scopes
//! - write-side reference counting that decides DEF and USE names
//!
//! # Supported Headers
//!
//! | Header | Encoding | Dialect |
//! |--------|----------|---------|
//! | `#Inventor V2.1 ascii` | ASCII | Inventor |
//! | `#Inventor V2.1 binary` | binary | Inventor |
//! | `#Inventor V1.0`, `V2.0`, `V2.4`, `V2.5` | either | Inventor |
//! | `#VRML V1.0 ascii` | ASCII | VRML 1.0 |
//! | `#VRML V2.0 utf8` | ASCII | VRML97 |
//!
//! More headers can be registered through [`GlobalContext::register_header`].
//!
//! # Quick Start
//!
//! ```
//! use ivio::{GlobalContext, Input, Output};
//!
//! let ctx = GlobalContext::shared();
//!
//! let mut out = Output::new(ctx.clone());
//! out.write_str("Translation { translation ");
//! out.write_f32(1.5);
//! out.write_str(" 0 0 }\n");
//!
//! let mut input = Input::new(ctx);
//! input.set_buffer(out.buffer().to_vec()).unwrap();
//! assert!(input.is_valid_buffer());
//! assert_eq!(input.read_name(true).as_deref(), Some("Translation"));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ByteSource ─> BufferedReader ─> StreamStack ─> Input ──tokens──> graph builder
//!                                    │             │
//!                              HeaderRegistry   Dictionary, ScopeStack, RouteLedger
//!
//! graph walker ──values──> Output ─> ByteSink
//!                            │
//!                      WriteRefCounter, DefScopes
//! ```
//!
//! Process-wide state (fallback dictionary, header registry, search path,
//! environment switches) lives in one [`GlobalContext`] shared by every
//! session.

pub mod codec;
pub mod context;
pub mod error;
pub mod input;
pub mod options;
pub mod output;
pub mod refs;
pub mod search;
pub mod source;

pub use context::GlobalContext;
pub use error::{IoError, Result};
pub use input::{Dialect, FormatVersion, HeaderInfo, HeaderRegistry, HeaderStatus, Input, IsClause};
pub use options::{EnvSwitches, ReadOptions, TemplateLookup, WriteOptions};
pub use output::{Emission, Output, ProtoPolicy, WriteRefCounter, WriteStage};
pub use refs::{Dictionary, GlobalDictionary, Route, RouteFailure};
pub use search::SearchPath;
pub use source::CompressionMethod;

pub use ivio_core::{
    CollectingSink, Connector, Diagnostic, DiagnosticSink, LogSink, ObjectHandle, ObjectKind,
    RejectingConnector, Severity,
};
