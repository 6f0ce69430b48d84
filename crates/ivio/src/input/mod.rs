//! Read side: buffered streams, header negotiation and the input session.

pub mod header;
mod prefetch;
pub mod reader;
pub mod session;
pub mod stack;

pub use header::{Dialect, FormatVersion, HeaderHook, HeaderInfo, HeaderRegistry, HeaderStatus};
pub use reader::BufferedReader;
pub use session::{Input, IsClause};
pub use stack::{Stream, StreamOrigin};
