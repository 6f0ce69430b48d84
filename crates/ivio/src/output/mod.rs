//! Writing scene files.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `session` | [`Output`]: targets, header, primitives, templates, routes |
//! | `writeref` | [`WriteRefCounter`]: write counts and DEF/USE naming |

pub mod session;
pub mod writeref;

pub use session::{ObjectRoute, Output, ProtoPolicy, WriteStage};
pub use writeref::{DefScopes, Emission, RefId, WriteRefCounter};
