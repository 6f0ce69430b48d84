//! Primitive value codecs.
//!
//! | Module    | Role                                                |
//! |-----------|-----------------------------------------------------|
//! | `grammar` | nom recognizers for the ASCII numeric grammar       |
//! | `ascii`   | token scanning over a [`BufferedReader`] with push-back |
//! | `names`   | identifier character classes per dialect            |
//! | `binary`  | big-endian words, length-prefixed strings, padding  |
//! | `format`  | locale-independent number and string formatting     |
//!
//! [`BufferedReader`]: crate::input::reader::BufferedReader

pub mod ascii;
pub mod binary;
pub mod format;
pub mod grammar;
pub mod names;

pub use names::NameRules;
