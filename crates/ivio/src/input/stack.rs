//! Stack of open streams.
//!
//! The innermost stream is the last element. A stream that reaches the end
//! of its data is popped automatically only while an outer stream remains.

use super::header::{detect_header, Dialect, HeaderHook, HeaderInfo, HeaderRegistry};
use super::reader::BufferedReader;
use crate::refs::RouteLedger;
use crate::source::StdinSource;
use indexmap::IndexMap;
use ivio_core::ObjectHandle;
use std::path::PathBuf;

/// Name reported for standard input.
pub const STDIN_NAME: &str = "<stdin>";

/// Name reported for memory buffers.
pub const MEMORY_NAME: &str = "<memory>";

/// Where a stream's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOrigin {
    Stdin,
    Memory,
    File(PathBuf),
    /// A reader supplied by the caller, with a display name.
    External(String),
}

impl StreamOrigin {
    pub fn display_name(&self) -> String {
        match self {
            StreamOrigin::Stdin => STDIN_NAME.to_string(),
            StreamOrigin::Memory => MEMORY_NAME.to_string(),
            StreamOrigin::File(path) => path.display().to_string(),
            StreamOrigin::External(name) => name.clone(),
        }
    }
}

/// One open stream with its negotiated format and pending links.
pub struct Stream {
    /// `None` until standard input is first read.
    reader: Option<BufferedReader>,
    origin: StreamOrigin,
    /// Opened by the session rather than handed in by the caller.
    owned: bool,
    header: Option<HeaderInfo>,
    pre_hook: Option<HeaderHook>,
    post_hook: Option<HeaderHook>,
    pub(crate) routes: RouteLedger,
    protos: IndexMap<String, ObjectHandle>,
    /// Directory searched first for files this stream names.
    include_dir: Option<PathBuf>,
}

impl Stream {
    pub fn new(reader: BufferedReader, origin: StreamOrigin, owned: bool) -> Self {
        Self::with_reader(Some(reader), origin, owned)
    }

    /// Standard input, attached on first read.
    pub fn stdin() -> Self {
        Self::with_reader(None, StreamOrigin::Stdin, false)
    }

    fn with_reader(reader: Option<BufferedReader>, origin: StreamOrigin, owned: bool) -> Self {
        Self {
            reader,
            origin,
            owned,
            header: None,
            pre_hook: None,
            post_hook: None,
            routes: RouteLedger::new(),
            protos: IndexMap::new(),
            include_dir: None,
        }
    }

    pub fn with_include_dir(mut self, dir: PathBuf) -> Self {
        self.include_dir = Some(dir);
        self
    }

    pub fn origin(&self) -> &StreamOrigin {
        &self.origin
    }

    pub fn name(&self) -> String {
        self.origin.display_name()
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    pub fn is_stdin(&self) -> bool {
        self.origin == StreamOrigin::Stdin
    }

    /// Standard input that was never read from.
    pub fn is_untouched_stdin(&self) -> bool {
        self.is_stdin() && self.reader.is_none()
    }

    pub fn include_dir(&self) -> Option<&PathBuf> {
        self.include_dir.as_ref()
    }

    pub fn reader(&mut self) -> &mut BufferedReader {
        self.reader
            .get_or_insert_with(|| BufferedReader::new(Box::new(StdinSource)))
    }

    /// Line number, or 1 before any byte was read.
    pub fn line(&self) -> usize {
        self.reader.as_ref().map_or(1, BufferedReader::line)
    }

    pub fn bytes_consumed(&self) -> u64 {
        self.reader.as_ref().map_or(0, BufferedReader::bytes_consumed)
    }

    pub fn is_eof(&self) -> bool {
        self.reader.as_ref().map_or(false, BufferedReader::is_eof)
    }

    /// Negotiated header, if negotiation already ran.
    pub fn header(&self) -> Option<&HeaderInfo> {
        self.header.as_ref()
    }

    /// Run header negotiation once; later calls return the cached result.
    /// Returns the pre-hook to fire when this call matched a header.
    pub fn negotiate(
        &mut self,
        registry: &HeaderRegistry,
        assume_binary: bool,
    ) -> Option<HeaderHook> {
        if self.header.is_some() {
            return None;
        }
        let info = detect_header(self.reader(), registry, assume_binary);
        if let Some(entry) = registry.find(&info.text).filter(|_| info.ok()) {
            self.pre_hook = entry.pre_hook();
            self.post_hook = entry.post_hook();
        }
        self.header = Some(info);
        self.pre_hook.clone()
    }

    /// Binary mode; `false` until negotiated.
    pub fn is_binary(&self) -> bool {
        self.header.as_ref().map_or(false, |h| h.binary)
    }

    /// Dialect; Inventor until negotiated.
    pub fn dialect(&self) -> Dialect {
        self.header.as_ref().map_or(Dialect::Inventor, |h| h.dialect)
    }

    pub(crate) fn take_post_hook(&mut self) -> Option<HeaderHook> {
        self.post_hook.take()
    }

    /// Register a template definition by name.
    pub fn add_proto(&mut self, name: impl Into<String>, handle: ObjectHandle) {
        self.protos.insert(name.into(), handle);
    }

    pub fn find_proto(&self, name: &str) -> Option<ObjectHandle> {
        self.protos.get(name).copied()
    }
}

/// Open streams, innermost last. Never empty.
pub struct StreamStack {
    streams: Vec<Stream>,
}

impl StreamStack {
    pub fn new(base: Stream) -> Self {
        Self { streams: vec![base] }
    }

    pub fn push(&mut self, stream: Stream) {
        log::debug!("pushing stream {}", stream.name());
        self.streams.push(stream);
    }

    /// Remove the innermost stream. The last stream is never removed.
    pub fn pop(&mut self) -> Option<Stream> {
        if self.streams.len() > 1 {
            self.streams.pop()
        } else {
            None
        }
    }

    /// Replace every stream with `base`, returning the old ones innermost
    /// first.
    pub fn reset(&mut self, base: Stream) -> Vec<Stream> {
        let mut old = std::mem::replace(&mut self.streams, vec![base]);
        old.reverse();
        old
    }

    pub fn top(&self) -> &Stream {
        // The stack always holds its base stream.
        &self.streams[self.streams.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut Stream {
        let last = self.streams.len() - 1;
        &mut self.streams[last]
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Always false; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Streams from innermost to outermost.
    pub fn iter(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter().rev()
    }
}
