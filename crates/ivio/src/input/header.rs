//! File header registry and negotiation.
//!
//! The first line of a stream decides its encoding, version and dialect.
//! Header lines are matched against a registry with trailing blanks
//! ignored on both sides; a line that merely starts with a registered
//! header also matches.

use super::reader::BufferedReader;
use crate::error::{IoError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Longest accepted header, in bytes.
pub const MAX_HEADER_LEN: usize = 80;

/// Character that introduces a header line.
pub const HEADER_INTRODUCER: u8 = b'#';

const VRML1_PREFIX: &str = "#VRML V1.0 ascii";
const VRML2_PREFIX: &str = "#VRML V2.0 utf8";

/// Callback run when a stream with a given header starts or ends.
pub type HeaderHook = Arc<dyn Fn(&HeaderInfo) + Send + Sync>;

/// Grammar variant of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Dialect {
    /// Native Inventor files.
    #[default]
    Inventor,
    /// VRML 1.0.
    Vrml1,
    /// VRML 2.0 / VRML97.
    Vrml2,
}

impl Dialect {
    /// Dialect implied by a header line.
    pub fn from_header(line: &str) -> Self {
        if line.starts_with(VRML1_PREFIX) {
            Dialect::Vrml1
        } else if line.starts_with(VRML2_PREFIX) {
            Dialect::Vrml2
        } else {
            Dialect::Inventor
        }
    }
}

/// Format version, e.g. 2.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u8,
    pub minor: u8,
}

impl FormatVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Version as a decimal number, e.g. `2.1`.
    pub fn as_f32(&self) -> f32 {
        self.major as f32 + self.minor as f32 / 10.0
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// One registered header.
#[derive(Clone)]
pub struct HeaderEntry {
    /// Header text as registered.
    pub text: String,
    /// Binary encoding follows the header.
    pub binary: bool,
    /// Version reported for this header.
    pub version: FormatVersion,
    pre: Option<HeaderHook>,
    post: Option<HeaderHook>,
}

impl HeaderEntry {
    /// Hook run after this header was matched.
    pub fn pre_hook(&self) -> Option<HeaderHook> {
        self.pre.clone()
    }

    /// Hook run when a stream with this header is closed.
    pub fn post_hook(&self) -> Option<HeaderHook> {
        self.post.clone()
    }
}

impl fmt::Debug for HeaderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderEntry")
            .field("text", &self.text)
            .field("binary", &self.binary)
            .field("version", &self.version)
            .field("pre", &self.pre.is_some())
            .field("post", &self.post.is_some())
            .finish()
    }
}

fn trim_blanks(s: &str) -> &str {
    s.trim_end_matches([' ', '\t'])
}

/// Registry of known header lines.
#[derive(Debug, Clone, Default)]
pub struct HeaderRegistry {
    entries: IndexMap<String, HeaderEntry>,
}

impl HeaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the standard Inventor and VRML headers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let v = FormatVersion::new;
        let defaults: [(&str, bool, FormatVersion); 12] = [
            ("#Inventor V2.1 ascii   ", false, v(2, 1)),
            ("#Inventor V2.1 binary  ", true, v(2, 1)),
            ("#VRML V2.0 utf8", false, v(2, 1)),
            ("#Inventor V2.4 ascii", false, v(2, 4)),
            ("#Inventor V2.4 binary", true, v(2, 4)),
            ("#Inventor V2.5 ascii", false, v(2, 5)),
            ("#Inventor V2.5 binary", true, v(2, 5)),
            ("#Inventor V2.0 ascii", false, v(2, 0)),
            ("#Inventor V2.0 binary", true, v(2, 0)),
            ("#Inventor V1.0 ascii", false, v(1, 0)),
            ("#Inventor V1.0 binary", true, v(1, 0)),
            ("#VRML V1.0 ascii   ", false, v(2, 1)),
        ];
        for (text, binary, version) in defaults {
            // Built-in entries always satisfy the registration rules.
            let _ = registry.register(text, binary, version, None, None);
        }
        registry
    }

    /// Register a header. Re-registering the same text replaces the entry.
    pub fn register(
        &mut self,
        text: &str,
        binary: bool,
        version: FormatVersion,
        pre: Option<HeaderHook>,
        post: Option<HeaderHook>,
    ) -> Result<()> {
        if !text.as_bytes().starts_with(&[HEADER_INTRODUCER]) {
            return Err(IoError::InvalidHeader(format!(
                "header must start with '#': {:?}",
                text
            )));
        }
        if text.len() > MAX_HEADER_LEN {
            return Err(IoError::InvalidHeader(format!(
                "header longer than {} characters: {:?}",
                MAX_HEADER_LEN, text
            )));
        }
        let key = trim_blanks(text).to_string();
        self.entries.insert(
            key,
            HeaderEntry {
                text: text.to_string(),
                binary,
                version,
                pre,
                post,
            },
        );
        Ok(())
    }

    /// Find the entry matching a header line.
    pub fn find(&self, line: &str) -> Option<&HeaderEntry> {
        let line = trim_blanks(line);
        if line.is_empty() {
            return None;
        }
        self.entries
            .get(line)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(key, _)| line.starts_with(key.as_str()))
                    .map(|(_, entry)| entry)
            })
    }

    /// Whether `line` is a known header.
    pub fn is_valid_header(&self, line: &str) -> bool {
        self.find(line).is_some()
    }

    /// Whether `line` announces the binary encoding.
    pub fn is_binary(&self, line: &str) -> bool {
        self.find(line).map_or(false, |e| e.binary)
    }

    /// Version announced by `line`.
    pub fn version(&self, line: &str) -> Option<FormatVersion> {
        self.find(line).map(|e| e.version)
    }

    /// Hook run after `line` was matched.
    pub fn pre_hook(&self, line: &str) -> Option<HeaderHook> {
        self.find(line).and_then(HeaderEntry::pre_hook)
    }

    /// Hook run when a stream with header `line` ends.
    pub fn post_hook(&self, line: &str) -> Option<HeaderHook> {
        self.find(line).and_then(HeaderEntry::post_hook)
    }

    /// Registered header texts, in registration order.
    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.text.as_str())
    }

    /// Number of registered headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no headers are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of header negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderStatus {
    /// The stream does not start with a header line.
    Missing,
    /// The header matched a registered entry.
    Matched,
    /// A `#` line was found but matched nothing; it was pushed back.
    Unrecognized,
    /// The stream was empty.
    Empty,
}

/// Result of header negotiation for one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderInfo {
    pub status: HeaderStatus,
    /// The header line without its terminator; empty when missing.
    pub text: String,
    /// Version of a matched header.
    pub version: Option<FormatVersion>,
    /// Binary encoding is in effect.
    pub binary: bool,
    pub dialect: Dialect,
}

impl HeaderInfo {
    /// Whether the stream is in a known format: a matched header, or none
    /// at all.
    pub fn ok(&self) -> bool {
        matches!(self.status, HeaderStatus::Matched | HeaderStatus::Missing)
    }

    fn assumed(status: HeaderStatus, text: String, binary: bool) -> Self {
        Self {
            status,
            text,
            version: None,
            binary,
            dialect: Dialect::Inventor,
        }
    }
}

/// Read and match the first line of `reader`.
///
/// Without a header, or with an unrecognized one, the stream keeps
/// `assume_binary` as its mode and every byte read here is pushed back.
pub fn detect_header(
    reader: &mut BufferedReader,
    registry: &HeaderRegistry,
    assume_binary: bool,
) -> HeaderInfo {
    let first = match reader.get() {
        Some(c) => c,
        None => return HeaderInfo::assumed(HeaderStatus::Empty, String::new(), assume_binary),
    };
    if first != HEADER_INTRODUCER {
        reader.put_back(first);
        return HeaderInfo::assumed(HeaderStatus::Missing, String::new(), assume_binary);
    }

    let mut line = vec![first];
    let mut terminator: Vec<u8> = Vec::with_capacity(2);
    while let Some(c) = reader.get() {
        match c {
            b'\n' => {
                terminator.push(c);
                break;
            }
            b'\r' => {
                terminator.push(c);
                match reader.get() {
                    Some(b'\n') => terminator.push(b'\n'),
                    Some(other) => reader.put_back(other),
                    None => {}
                }
                break;
            }
            _ => line.push(c),
        }
    }
    let text = String::from_utf8_lossy(&line).into_owned();

    match registry.find(&text) {
        Some(entry) => {
            log::debug!("matched header {:?} (version {})", text, entry.version);
            HeaderInfo {
                status: HeaderStatus::Matched,
                version: Some(entry.version),
                binary: entry.binary,
                dialect: Dialect::from_header(&text),
                text,
            }
        }
        None => {
            log::debug!("unrecognized header {:?}", text);
            reader.put_back_bytes(&terminator);
            reader.put_back_bytes(&line);
            HeaderInfo::assumed(HeaderStatus::Unrecognized, text, assume_binary)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reader(data: &[u8]) -> BufferedReader {
        BufferedReader::with_block_size(Box::new(MemorySource::new(data.to_vec())), 8)
    }

    #[test]
    fn test_default_headers() {
        let registry = HeaderRegistry::with_defaults();
        assert!(registry.is_valid_header("#Inventor V2.1 ascii"));
        assert!(registry.is_valid_header("#Inventor V2.1 ascii   "));
        assert!(registry.is_binary("#Inventor V2.1 binary"));
        assert!(!registry.is_binary("#VRML V2.0 utf8"));
        assert_eq!(registry.version("#Inventor V1.0 binary"), Some(FormatVersion::new(1, 0)));
        assert_eq!(registry.version("#VRML V1.0 ascii"), Some(FormatVersion::new(2, 1)));
        assert!(!registry.is_valid_header("#Inventor V3.0 ascii"));
        assert!(!registry.is_valid_header(""));
    }

    #[test]
    fn test_prefix_match() {
        let registry = HeaderRegistry::with_defaults();
        assert!(registry.is_valid_header("#VRML V2.0 utf8 CosmoWorlds V1.0"));
    }

    #[test]
    fn test_register_rules() {
        let mut registry = HeaderRegistry::new();
        let version = FormatVersion::new(2, 1);
        assert!(registry.register("Inventor", false, version, None, None).is_err());
        let long = format!("#{}", "x".repeat(MAX_HEADER_LEN));
        assert!(registry.register(&long, false, version, None, None).is_err());
        registry.register("#Custom V1", true, FormatVersion::new(1, 0), None, None).unwrap();
        registry.register("#Custom V1  ", false, FormatVersion::new(1, 5), None, None).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_binary("#Custom V1"));
        assert_eq!(registry.headers().collect::<Vec<_>>(), vec!["#Custom V1  "]);
    }

    #[test]
    fn test_detect_matched() {
        let registry = HeaderRegistry::with_defaults();
        let mut r = reader(b"#Inventor V2.1 ascii\n\n3.5\n");
        let info = detect_header(&mut r, &registry, false);
        assert!(info.ok());
        assert_eq!(info.status, HeaderStatus::Matched);
        assert_eq!(info.version, Some(FormatVersion::new(2, 1)));
        assert!(!info.binary);
        assert_eq!(info.dialect, Dialect::Inventor);
        assert_eq!(r.get(), Some(b'\n'));
    }

    #[test]
    fn test_detect_vrml_dialects() {
        let registry = HeaderRegistry::with_defaults();
        let info = detect_header(&mut reader(b"#VRML V2.0 utf8\r\nShape {}"), &registry, false);
        assert_eq!(info.dialect, Dialect::Vrml2);
        let info = detect_header(&mut reader(b"#VRML V1.0 ascii\rSeparator {}"), &registry, false);
        assert_eq!(info.dialect, Dialect::Vrml1);
    }

    #[test]
    fn test_detect_unrecognized_pushes_back() {
        let registry = HeaderRegistry::with_defaults();
        let mut r = reader(b"#XYZ format 9\r\nrest");
        let info = detect_header(&mut r, &registry, false);
        assert!(!info.ok());
        assert_eq!(info.status, HeaderStatus::Unrecognized);
        assert_eq!(info.text, "#XYZ format 9");
        assert_eq!(r.line(), 1);
        let mut all = Vec::new();
        while let Some(c) = r.get() {
            all.push(c);
        }
        assert_eq!(all, b"#XYZ format 9\r\nrest");
    }

    #[test]
    fn test_detect_missing_and_empty() {
        let registry = HeaderRegistry::with_defaults();
        let mut r = reader(b"Separator {}");
        let info = detect_header(&mut r, &registry, true);
        assert!(info.ok());
        assert_eq!(info.status, HeaderStatus::Missing);
        assert!(info.binary);
        assert_eq!(r.get(), Some(b'S'));

        let info = detect_header(&mut reader(b""), &registry, false);
        assert_eq!(info.status, HeaderStatus::Empty);
        assert!(!info.ok());
    }

    #[test]
    fn test_hooks_are_kept() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let hook: HeaderHook = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut registry = HeaderRegistry::with_defaults();
        registry
            .register("#MyFormat V1.0", false, FormatVersion::new(1, 0), Some(hook), None)
            .unwrap();
        let info = detect_header(&mut reader(b"#MyFormat V1.0\n"), &registry, false);
        let pre = registry.pre_hook(&info.text).unwrap();
        pre(&info);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.post_hook(&info.text).is_none());
    }
}
