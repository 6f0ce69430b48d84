//! Input session.
//!
//! [`Input`] is the read API a graph builder talks to. It owns a stack of
//! streams, negotiates each stream's header on first use, decodes
//! primitives in the stream's encoding and keeps the name dictionary,
//! template scopes and pending routes of the session.
//!
//! Reads return `None` or `false` when no value is available. Whether that
//! ends the parse is up to the caller; parse problems worth telling the
//! user about go to the session's [`DiagnosticSink`].

use super::header::{Dialect, FormatVersion, HeaderInfo, HeaderStatus};
use super::reader::BufferedReader;
use super::stack::{Stream, StreamOrigin, StreamStack};
use crate::codec::ascii::{self, StringScan};
use crate::codec::binary::{self, BinaryString};
use crate::codec::NameRules;
use crate::context::GlobalContext;
use crate::error::{IoError, Result};
use crate::options::{ReadOptions, TemplateLookup};
use crate::refs::{Dictionary, IsReference, Route, ScopeLookup, ScopeStack, TemplateScope};
use crate::search::{self, find_in};
use crate::source::{self, ByteSource};
use ivio_core::{
    Connector, Diagnostic, DiagnosticSink, LogSink, ObjectHandle, ObjectKind, RejectingConnector,
    Severity,
};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of looking for an `IS` clause after a field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsClause {
    /// No `IS` keyword follows; nothing was consumed.
    Absent,
    /// The field is bound to the named interface field.
    Recorded(String),
    /// `IS` was not followed by an interface name.
    Malformed,
}

/// Read session over a stack of streams.
pub struct Input {
    context: Arc<GlobalContext>,
    options: ReadOptions,
    stack: StreamStack,
    dictionary: Dictionary,
    scopes: ScopeStack,
    connector: Box<dyn Connector + Send>,
    diagnostics: Box<dyn DiagnosticSink>,
}

/// Session dictionary, then the process-wide one when enabled.
fn session_lookup(
    dictionary: &Dictionary,
    context: &GlobalContext,
    use_global: bool,
    name: &str,
    kind: Option<ObjectKind>,
) -> Option<ObjectHandle> {
    dictionary
        .lookup(name)
        .or_else(|| use_global.then(|| context.dictionary().lookup(name, kind)).flatten())
}

fn diagnostic_for(stream: &Stream, severity: Severity, message: String) -> Diagnostic {
    let diagnostic = Diagnostic::new(severity, message, stream.name(), stream.line());
    if stream.is_binary() {
        diagnostic.with_offset(stream.bytes_consumed())
    } else {
        diagnostic
    }
}

impl Input {
    /// Session reading standard input until another source is set.
    pub fn new(context: Arc<GlobalContext>) -> Self {
        let options = context.read_options();
        Self::with_options(context, options)
    }

    pub fn with_options(context: Arc<GlobalContext>, options: ReadOptions) -> Self {
        Self {
            context,
            options,
            stack: StreamStack::new(Stream::stdin()),
            dictionary: Dictionary::new(),
            scopes: ScopeStack::new(),
            connector: Box::new(RejectingConnector),
            diagnostics: Box::new(LogSink),
        }
    }

    /// New session that starts with a copy of `other`'s names.
    pub fn with_references_from(other: &Input) -> Self {
        let mut input = Self::with_options(Arc::clone(&other.context), other.options.clone());
        input.dictionary = other.dictionary.clone();
        input
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn context(&self) -> &Arc<GlobalContext> {
        &self.context
    }

    /// Collaborator used to wire routes.
    pub fn set_connector(&mut self, connector: impl Connector + Send + 'static) {
        self.connector = Box::new(connector);
    }

    /// Receiver for parse diagnostics. Defaults to the `log` facade.
    pub fn set_diagnostics(&mut self, sink: impl DiagnosticSink + 'static) {
        self.diagnostics = Box::new(sink);
    }

    // Opening and closing

    fn make_reader(&self, source: Box<dyn ByteSource>) -> Result<BufferedReader> {
        if self.options.prefetch {
            Ok(BufferedReader::with_prefetch(source, self.options.block_size)?)
        } else {
            Ok(BufferedReader::with_block_size(source, self.options.block_size))
        }
    }

    fn open_stream(&self, path: &Path) -> Result<Stream> {
        let (source, method) = source::open_file(path)?;
        log::debug!("opening {} ({} envelope)", path.display(), method.name());
        let reader = self.make_reader(source)?;
        let stream = Stream::new(reader, StreamOrigin::File(path.to_path_buf()), true);
        let dir = search::path_name(path);
        Ok(if dir.as_os_str().is_empty() {
            stream
        } else {
            stream.with_include_dir(dir)
        })
    }

    /// Find `name` in the directories of open files, then the search path.
    fn locate(&self, name: &Path) -> Option<PathBuf> {
        let search_path = self.context.search_path();
        let dirs: Vec<PathBuf> = self
            .stack
            .iter()
            .filter_map(|s| s.include_dir().cloned())
            .chain(search_path.directories().iter().cloned())
            .collect();
        find_in(name, dirs.iter().map(PathBuf::as_path))
    }

    fn not_found(&mut self, name: &Path) -> IoError {
        self.report(
            Severity::Error,
            format!("Couldn't open file \"{}\" for reading.", name.display()),
        );
        IoError::NotFound(name.display().to_string())
    }

    /// Close every stream and read from `name` instead.
    ///
    /// Returns `Ok(false)` when the file does not exist and
    /// `ok_if_not_found` is set; the session is left untouched then.
    pub fn open_file(&mut self, name: impl AsRef<Path>, ok_if_not_found: bool) -> Result<bool> {
        let name = name.as_ref();
        let Some(path) = self.locate(name) else {
            if ok_if_not_found {
                return Ok(false);
            }
            return Err(self.not_found(name));
        };
        let stream = self.open_stream(&path)?;
        self.replace_streams(stream);
        Ok(true)
    }

    /// Open `name` on top of the current stream. Reading continues in the
    /// outer stream once it is exhausted.
    pub fn push_file(&mut self, name: impl AsRef<Path>) -> Result<()> {
        let name = name.as_ref();
        let path = match self.locate(name) {
            Some(path) => path,
            None => return Err(self.not_found(name)),
        };
        let stream = self.open_stream(&path)?;
        if self.stack.len() == 1 && self.stack.top().is_untouched_stdin() {
            self.stack.reset(stream);
        } else {
            self.stack.push(stream);
        }
        Ok(())
    }

    /// Close every stream and read from `data`. Compressed buffers are
    /// detected by their magic bytes.
    pub fn set_buffer(&mut self, data: Vec<u8>) -> Result<()> {
        let (source, method) = source::memory_source(data)?;
        log::debug!("reading memory buffer ({} envelope)", method.name());
        let reader = self.make_reader(source)?;
        self.replace_streams(Stream::new(reader, StreamOrigin::Memory, true));
        Ok(())
    }

    /// Read from the concatenation of `lines`.
    pub fn set_string_array<S: AsRef<str>>(&mut self, lines: &[S]) -> Result<()> {
        let mut data = String::new();
        for line in lines {
            data.push_str(line.as_ref());
        }
        self.set_buffer(data.into_bytes())
    }

    /// Close every stream and read from a caller-supplied reader.
    pub fn set_reader<R>(&mut self, reader: R, name: impl Into<String>) -> Result<()>
    where
        R: Read + Send + 'static,
    {
        let (source, _) = source::sniffed_source(reader)?;
        let reader = self.make_reader(source)?;
        self.replace_streams(Stream::new(reader, StreamOrigin::External(name.into()), false));
        Ok(())
    }

    fn replace_streams(&mut self, stream: Stream) {
        self.close_file();
        self.stack.reset(stream);
    }

    /// Close every stream and fall back to standard input. Pending routes
    /// are resolved and post hooks fire as each stream is closed.
    pub fn close_file(&mut self) {
        for stream in self.stack.reset(Stream::stdin()) {
            self.finish_stream(stream);
        }
    }

    /// Close the innermost stream. The outermost stream is never popped.
    pub fn pop_file(&mut self) -> bool {
        match self.stack.pop() {
            Some(stream) => {
                self.finish_stream(stream);
                true
            }
            None => {
                log::warn!("pop_file called with a single stream open");
                false
            }
        }
    }

    fn finish_stream(&mut self, mut stream: Stream) {
        self.report_read_error(&mut stream);
        let failures = {
            let dictionary = &self.dictionary;
            let context = &self.context;
            let use_global = self.options.search_global_dictionary;
            stream.routes.resolve_all(
                |name| session_lookup(dictionary, context, use_global, name, None),
                self.connector.as_mut(),
            )
        };
        for failure in failures {
            let diagnostic = diagnostic_for(&stream, Severity::Error, failure.message());
            self.diagnostics.report(diagnostic);
        }
        if let (Some(hook), Some(info)) = (stream.take_post_hook(), stream.header()) {
            hook(info);
        }
        if stream.is_owned() {
            log::debug!("closing {}", stream.name());
        }
    }

    // Header state

    fn negotiate_top(&mut self) {
        let assume_binary = self.options.headerless_binary;
        let hook = {
            let registry = self.context.headers();
            self.stack.top_mut().negotiate(&registry, assume_binary)
        };
        if let Some(hook) = hook {
            if let Some(info) = self.stack.top().header() {
                hook(info);
            }
        }
    }

    /// Report an I/O error that cut `stream` short, once.
    fn report_read_error(&mut self, stream: &mut Stream) {
        if let Some(e) = stream.reader().take_error() {
            let message = format!("Couldn't read from {}: {}", stream.name(), e);
            self.diagnostics.report(diagnostic_for(stream, Severity::Error, message));
        }
    }

    fn check_read_error(&mut self) {
        if let Some(e) = self.stack.top_mut().reader().take_error() {
            let message = format!("Couldn't read from {}: {}", self.stack.top().name(), e);
            self.report(Severity::Error, message);
        }
    }

    /// `value`, reporting a pending read error when it is missing.
    fn checked<T>(&mut self, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.check_read_error();
        }
        value
    }

    /// Innermost stream that still has data, negotiated. Exhausted inner
    /// streams are closed on the way.
    fn active(&mut self) -> &mut Stream {
        loop {
            self.negotiate_top();
            let exhausted = self.stack.len() > 1 && !self.stack.top_mut().reader().has_data();
            self.check_read_error();
            if exhausted {
                if let Some(stream) = self.stack.pop() {
                    self.finish_stream(stream);
                }
                continue;
            }
            return self.stack.top_mut();
        }
    }

    /// Header of the current stream.
    pub fn header(&mut self) -> HeaderInfo {
        self.negotiate_top();
        self.stack.top().header().cloned().unwrap_or_else(|| HeaderInfo {
            status: HeaderStatus::Empty,
            text: String::new(),
            version: None,
            binary: false,
            dialect: Dialect::Inventor,
        })
    }

    /// Whether the current stream starts with a registered header.
    pub fn is_valid_file(&mut self) -> bool {
        self.header().status == HeaderStatus::Matched
    }

    /// Same check as [`is_valid_file`](Self::is_valid_file), for buffers.
    pub fn is_valid_buffer(&mut self) -> bool {
        self.is_valid_file()
    }

    pub fn is_binary(&mut self) -> bool {
        self.negotiate_top();
        self.stack.top().is_binary()
    }

    /// Version of the current stream's header, if it matched one.
    pub fn version(&mut self) -> Option<FormatVersion> {
        self.header().version
    }

    pub fn dialect(&mut self) -> Dialect {
        self.negotiate_top();
        self.stack.top().dialect()
    }

    pub fn is_file_vrml1(&mut self) -> bool {
        self.dialect() == Dialect::Vrml1
    }

    pub fn is_file_vrml2(&mut self) -> bool {
        self.dialect() == Dialect::Vrml2
    }

    // Position

    /// `<stdin>`, `<memory>` or the path of the current stream.
    pub fn current_file_name(&self) -> String {
        self.stack.top().name()
    }

    /// Full path of the current stream, when it is a file.
    pub fn current_file_path(&self) -> Option<&Path> {
        match self.stack.top().origin() {
            StreamOrigin::File(path) => Some(path),
            _ => None,
        }
    }

    /// Number of open streams.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn line(&self) -> usize {
        self.stack.top().line()
    }

    /// Bytes consumed from the current stream, net of push-back.
    pub fn num_bytes_read(&self) -> u64 {
        self.stack.top().bytes_consumed()
    }

    /// Whether the current stream hit its end.
    pub fn eof(&self) -> bool {
        self.stack.top().is_eof()
    }

    /// Position description for messages, e.g. `Occurred at line   3 in a.iv`.
    pub fn location(&self) -> String {
        diagnostic_for(self.stack.top(), Severity::Info, String::new()).location()
    }

    /// Report a problem at the current position.
    pub fn report(&mut self, severity: Severity, message: impl Into<String>) {
        let diagnostic = diagnostic_for(self.stack.top(), severity, message.into());
        self.diagnostics.report(diagnostic);
    }

    // Characters

    /// Next byte, crossing into outer streams as inner ones run out.
    pub fn get(&mut self) -> Option<u8> {
        loop {
            let c = self.active().reader().get();
            if c.is_some() {
                return c;
            }
            self.check_read_error();
            if self.stack.len() == 1 {
                return None;
            }
        }
    }

    /// Return `c` to the current stream.
    pub fn put_back(&mut self, c: u8) {
        self.stack.top_mut().reader().put_back(c);
    }

    /// Return `s` to the current stream; it is read again in order.
    pub fn put_back_str(&mut self, s: &str) {
        self.stack.top_mut().reader().put_back_bytes(s.as_bytes());
    }

    /// Skip whitespace and comments. False at the end of all data. Binary
    /// streams have nothing to skip.
    pub fn skip_whitespace(&mut self) -> bool {
        loop {
            let stream = self.active();
            if stream.is_binary() {
                return true;
            }
            if stream.reader().skip_whitespace(true) {
                return true;
            }
            self.check_read_error();
            if self.stack.len() == 1 {
                return false;
            }
        }
    }

    /// Next byte, optionally skipping whitespace first.
    pub fn read_char(&mut self, skip_whitespace: bool) -> Option<u8> {
        if skip_whitespace && !self.skip_whitespace() {
            return None;
        }
        self.get()
    }

    // Strings and names

    /// Read a string: quoted or bare in ASCII, length-prefixed in binary.
    pub fn read_string(&mut self) -> Option<String> {
        if self.active().is_binary() {
            return match binary::read_string(self.stack.top_mut().reader()) {
                BinaryString::Value(bytes) => Some(ascii::into_string(bytes)),
                BinaryString::EndMarker => None,
                BinaryString::Truncated => self.checked(None),
                BinaryString::TooLong(len) => {
                    self.report(
                        Severity::Error,
                        format!("String too long ({} characters) -- file probably corrupt.", len),
                    );
                    None
                }
            };
        }
        if !self.skip_whitespace() {
            return None;
        }
        let dialect = self.stack.top().dialect();
        match ascii::read_string(self.stack.top_mut().reader(), dialect) {
            StringScan::Value(s) => Some(s),
            StringScan::Eof => self.checked(None),
            StringScan::MissingQuote => {
                self.report(Severity::Error, "Missing terminating quote-character (\")");
                self.check_read_error();
                None
            }
        }
    }

    fn name_rules(&self, valid_ident: bool) -> NameRules {
        NameRules::new(self.stack.top().dialect(), valid_ident)
            .with_plus_start(!self.options.strict_vrml2_names)
    }

    /// Read a name. With `valid_ident` the name must be a strict
    /// identifier of the stream's dialect.
    pub fn read_name(&mut self, valid_ident: bool) -> Option<String> {
        if self.active().is_binary() {
            let rules = self.name_rules(valid_ident);
            let name = self.read_string()?;
            return rules.is_valid(name.as_bytes()).then_some(name);
        }
        if !self.skip_whitespace() {
            return None;
        }
        let rules = self.name_rules(valid_ident);
        ascii::read_name(self.stack.top_mut().reader(), &rules)
    }

    // Numbers

    fn read_number<T>(
        &mut self,
        binary: impl FnOnce(&mut BufferedReader) -> Option<T>,
        ascii: impl FnOnce(&mut BufferedReader) -> Option<T>,
    ) -> Option<T> {
        let value = if self.active().is_binary() {
            binary(self.stack.top_mut().reader())
        } else {
            if !self.skip_whitespace() {
                return None;
            }
            ascii(self.stack.top_mut().reader())
        };
        self.checked(value)
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_number(binary::read_i32, |r| ascii::read_integer(r).map(|v| v as i32))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_number(binary::read_u32, |r| ascii::read_unsigned(r).map(|v| v as u32))
    }

    /// 16-bit values occupy a full word in binary streams.
    pub fn read_i16(&mut self) -> Option<i16> {
        self.read_number(
            |r| binary::read_i32(r).map(|v| v as i16),
            |r| ascii::read_integer(r).map(|v| v as i16),
        )
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_number(
            |r| binary::read_u32(r).map(|v| v as u16),
            |r| ascii::read_unsigned(r).map(|v| v as u16),
        )
    }

    /// Byte-sized integers occupy a full word in binary streams.
    pub fn read_i8(&mut self) -> Option<i8> {
        self.read_number(
            |r| binary::read_i32(r).map(|v| v as i8),
            |r| ascii::read_integer(r).map(|v| v as i8),
        )
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_number(
            |r| binary::read_u32(r).map(|v| v as u8),
            |r| ascii::read_unsigned(r).map(|v| v as u8),
        )
    }

    /// Read a `0x`-prefixed value; a plain word in binary streams.
    pub fn read_hex(&mut self) -> Option<u32> {
        self.read_number(binary::read_u32, ascii::read_hex)
    }

    fn non_finite(&mut self, count: usize) {
        self.report(
            Severity::Warning,
            format!("Detected {} non-finite floating point value(s), replaced with zero.", count),
        );
    }

    /// Read a float. NaN and infinity are replaced with zero and reported.
    pub fn read_f32(&mut self) -> Option<f32> {
        let value = self.read_number(binary::read_f32, |r| {
            ascii::read_real_token(r).and_then(|t| t.parse::<f32>().ok())
        })?;
        if value.is_finite() {
            Some(value)
        } else {
            self.non_finite(1);
            Some(0.0)
        }
    }

    /// Read a double. NaN and infinity are replaced with zero and reported.
    pub fn read_f64(&mut self) -> Option<f64> {
        let value = self.read_number(binary::read_f64, |r| {
            ascii::read_real_token(r).and_then(|t| t.parse::<f64>().ok())
        })?;
        if value.is_finite() {
            Some(value)
        } else {
            self.non_finite(1);
            Some(0.0)
        }
    }

    // Binary arrays

    pub fn read_binary_i32s(&mut self, out: &mut [i32]) -> bool {
        let ok = binary::read_i32s(self.active().reader(), out);
        self.checked(ok.then_some(())).is_some()
    }

    pub fn read_binary_f32s(&mut self, out: &mut [f32]) -> bool {
        if !binary::read_f32s(self.active().reader(), out) {
            self.check_read_error();
            return false;
        }
        let bad = out.iter_mut().filter(|v| !v.is_finite()).map(|v| *v = 0.0).count();
        if bad > 0 {
            self.non_finite(bad);
        }
        true
    }

    pub fn read_binary_f64s(&mut self, out: &mut [f64]) -> bool {
        if !binary::read_f64s(self.active().reader(), out) {
            self.check_read_error();
            return false;
        }
        let bad = out.iter_mut().filter(|v| !v.is_finite()).map(|v| *v = 0.0).count();
        if bad > 0 {
            self.non_finite(bad);
        }
        true
    }

    /// Raw bytes, without padding.
    pub fn read_binary_bytes(&mut self, out: &mut [u8]) -> bool {
        let ok = self.active().reader().read_chunk(out);
        self.checked(ok.then_some(())).is_some()
    }

    // References

    /// Bind `name` in the current scope, and in the process-wide
    /// dictionary when `add_to_global` is set.
    pub fn add_reference(&mut self, name: &str, handle: ObjectHandle, add_to_global: bool) {
        match self.scopes.current_mut() {
            Some(scope) => {
                scope.dictionary.define(name, handle);
            }
            None => {
                self.dictionary.define(name, handle);
            }
        }
        if add_to_global {
            self.context.dictionary().define(name, handle);
        }
    }

    /// Resolve `name`: template scopes, the session dictionary, then the
    /// process-wide dictionary restricted to `kind` when enabled.
    pub fn find_reference(&self, name: &str, kind: Option<ObjectKind>) -> Option<ObjectHandle> {
        match self.scopes.lookup(name, self.options.template_lookup) {
            ScopeLookup::Found(handle) => Some(handle),
            ScopeLookup::Blocked => None,
            ScopeLookup::Missed => session_lookup(
                &self.dictionary,
                &self.context,
                self.options.search_global_dictionary,
                name,
                kind,
            ),
        }
    }

    /// Remove `name` from the current scope.
    pub fn remove_reference(&mut self, name: &str) -> Option<ObjectHandle> {
        match self.scopes.current_mut() {
            Some(scope) => scope.dictionary.undefine(name),
            None => self.dictionary.undefine(name),
        }
    }

    /// Names bound at session level.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    // Routes and templates

    /// Record a route, resolved when the current template scope or stream
    /// closes.
    pub fn add_route(&mut self, from: &str, from_slot: &str, to: &str, to_slot: &str) {
        let route = Route::new(from, from_slot, to, to_slot);
        match self.scopes.current_mut() {
            Some(scope) => scope.ledger.record(route),
            None => self.stack.top_mut().routes.record(route),
        }
    }

    /// Routes waiting in the current scope.
    pub fn pending_routes(&self) -> usize {
        match self.scopes.current() {
            Some(scope) => scope.ledger.len(),
            None => self.stack.top().routes.len(),
        }
    }

    /// Enter the body of template `name`.
    pub fn push_proto(&mut self, name: &str) {
        log::debug!("entering template {}", name);
        self.scopes.push(TemplateScope::new(name));
    }

    /// Leave the innermost template body, resolving its routes.
    pub fn pop_proto(&mut self) -> Option<TemplateScope> {
        let Some(mut scope) = self.scopes.pop() else {
            log::warn!("pop_proto called outside a template");
            return None;
        };
        let failures = {
            let own = &scope.dictionary;
            let scopes = &self.scopes;
            let dictionary = &self.dictionary;
            let context = &self.context;
            let policy = self.options.template_lookup;
            let use_global = self.options.search_global_dictionary;
            scope.ledger.resolve_all(
                |name| {
                    own.lookup(name).or_else(|| match policy {
                        TemplateLookup::Isolated => None,
                        TemplateLookup::FallThrough => match scopes.lookup(name, policy) {
                            ScopeLookup::Found(handle) => Some(handle),
                            ScopeLookup::Blocked => None,
                            ScopeLookup::Missed => {
                                session_lookup(dictionary, context, use_global, name, None)
                            }
                        },
                    })
                },
                self.connector.as_mut(),
            )
        };
        for failure in failures {
            self.report(Severity::Error, failure.message());
        }
        log::debug!("leaving template {}", scope.name());
        Some(scope)
    }

    /// Name of the innermost template being read.
    pub fn current_proto(&self) -> Option<&str> {
        self.scopes.current().map(TemplateScope::name)
    }

    /// Register a template definition with the current stream.
    pub fn add_proto(&mut self, name: &str, handle: ObjectHandle) {
        self.stack.top_mut().add_proto(name, handle);
    }

    /// Find a template definition, innermost stream first.
    pub fn find_proto(&self, name: &str) -> Option<ObjectHandle> {
        self.stack.iter().find_map(|s| s.find_proto(name))
    }

    /// Inside a template body, consume an `IS <interface>` clause following
    /// `field` of `container` and record the binding.
    pub fn check_is_reference(&mut self, container: ObjectHandle, field: &str) -> IsClause {
        if self.scopes.is_empty() {
            return IsClause::Absent;
        }
        let binary = self.is_binary();
        let Some(word) = self.read_name(true) else {
            return IsClause::Absent;
        };
        if word != "IS" {
            self.put_back_word(&word, binary);
            return IsClause::Absent;
        }
        let Some(interface) = self.read_name(true) else {
            self.report(
                Severity::Error,
                format!("Missing interface name after IS for field \"{}\"", field),
            );
            return IsClause::Malformed;
        };
        if let Some(scope) = self.scopes.current_mut() {
            scope.add_is_reference(IsReference {
                container,
                field: field.to_string(),
                interface: interface.clone(),
            });
        }
        IsClause::Recorded(interface)
    }

    /// Return a name read as a token, re-framed for binary streams.
    fn put_back_word(&mut self, word: &str, binary: bool) {
        if binary {
            let mut framed = (word.len() as u32).to_be_bytes().to_vec();
            framed.extend_from_slice(word.as_bytes());
            framed.resize(4 + binary::padded_len(word.len()), 0);
            self.stack.top_mut().reader().put_back_bytes(&framed);
        } else {
            self.put_back_str(word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::header::HeaderHook;
    use ivio_core::CollectingSink;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn input_from(data: &[u8]) -> Input {
        let mut input = Input::new(GlobalContext::shared());
        input.set_buffer(data.to_vec()).unwrap();
        input
    }

    fn with_sink(mut input: Input) -> (Input, CollectingSink) {
        let sink = CollectingSink::new();
        input.set_diagnostics(sink.clone());
        (input, sink)
    }

    fn binary_input(words: &[u8]) -> Input {
        let mut data = b"#Inventor V2.1 binary  \n".to_vec();
        data.extend_from_slice(words);
        input_from(&data)
    }

    #[test]
    fn test_ascii_float_to_eof() {
        let mut input = input_from(b"#Inventor V2.1 ascii\n\n3.5\n");
        assert_eq!(input.read_f32(), Some(3.5));
        assert!(!input.skip_whitespace());
        assert!(input.eof());
        assert_eq!(input.num_bytes_read(), 26);
    }

    #[test]
    fn test_binary_int() {
        let mut input = binary_input(&1i32.to_be_bytes());
        assert!(input.is_binary());
        assert_eq!(input.version(), Some(FormatVersion::new(2, 1)));
        assert_eq!(input.read_i32(), Some(1));
        assert_eq!(input.read_i32(), None);
    }

    #[test]
    fn test_quoted_string() {
        let mut input = input_from(b"#Inventor V2.1 ascii\n\n\"ab\\\"c\"");
        assert_eq!(input.read_string().as_deref(), Some("ab\"c"));
    }

    #[test]
    fn test_missing_quote_reported() {
        let (mut input, sink) = with_sink(input_from(b"#Inventor V2.1 ascii\n\n\"open"));
        assert_eq!(input.read_string(), None);
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("Missing terminating quote"));
        assert_eq!(entries[0].file, "<memory>");
        assert_eq!(entries[0].line, 3);
    }

    #[test]
    fn test_non_finite_replaced() {
        let (mut input, sink) = with_sink(input_from(b"#Inventor V2.1 ascii\n\n1e999 2"));
        assert_eq!(input.read_f32(), Some(0.0));
        assert_eq!(input.read_f32(), Some(2.0));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].severity, Severity::Warning);

        let (mut input, sink) = with_sink(binary_input(&f32::NAN.to_be_bytes()));
        assert_eq!(input.read_f32(), Some(0.0));
        assert!(sink.entries()[0].offset.is_some());
    }

    struct FailingReader {
        data: Option<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.take() {
                Some(data) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    Ok(n)
                }
                None => Err(std::io::Error::new(std::io::ErrorKind::Other, "device went away")),
            }
        }
    }

    #[test]
    fn test_read_error_reported_once() {
        let mut input = Input::new(GlobalContext::shared());
        let reader = FailingReader {
            data: Some(b"#Inventor V2.1 ascii\n\n1 2".to_vec()),
        };
        input.set_reader(reader, "device").unwrap();
        let (mut input, sink) = with_sink(input);
        assert_eq!(input.read_i32(), Some(1));
        assert_eq!(input.read_i32(), Some(2));
        assert_eq!(input.read_i32(), None);
        assert_eq!(input.read_i32(), None);
        assert!(input.eof());
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].severity, Severity::Error);
        assert!(entries[0].message.contains("device went away"));
        assert_eq!(entries[0].file, "device");
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_corrupt_gzip_reported() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut text = String::from("#Inventor V2.1 ascii\n\n");
        for i in 0..20_000 {
            text.push_str(&format!("{} ", i));
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        let mut data = encoder.finish().unwrap();
        let middle = data.len() / 2;
        for byte in &mut data[middle..middle + 64] {
            *byte ^= 0x55;
        }

        let (mut input, sink) = with_sink(input_from(&data));
        while input.get().is_some() {}
        assert!(input.eof());
        let errors: Vec<_> =
            sink.entries().into_iter().filter(|d| d.severity == Severity::Error).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("Couldn't read from <memory>"));
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_gzip_buffer_detected() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"#Inventor V2.1 ascii\n\n42").unwrap();
        let data = encoder.finish().unwrap();
        assert_eq!(&data[..2], &[0x1f, 0x8b]);

        let mut input = input_from(&data);
        assert!(input.is_valid_buffer());
        assert_eq!(input.read_i32(), Some(42));
    }

    #[test]
    fn test_headerless_and_unknown_header() {
        let mut input = input_from(b"7");
        assert!(!input.is_valid_buffer());
        assert_eq!(input.header().status, HeaderStatus::Missing);
        assert_eq!(input.read_i32(), Some(7));

        let mut input = input_from(b"#Foo V9\n8");
        assert_eq!(input.header().status, HeaderStatus::Unrecognized);
        assert!(!input.is_valid_file());
        assert_eq!(input.get(), Some(b'#'));
    }

    #[test]
    fn test_numbers_ascii() {
        let mut input = input_from(b"-12 0x1f 0x10 -3 200 0xBEEF");
        assert_eq!(input.read_i32(), Some(-12));
        assert_eq!(input.read_u32(), Some(31));
        assert_eq!(input.read_u16(), Some(16));
        assert_eq!(input.read_i16(), Some(-3));
        assert_eq!(input.read_u8(), Some(200));
        assert_eq!(input.read_hex(), Some(0xbeef));
        assert_eq!(input.read_i32(), None);
    }

    #[test]
    fn test_binary_small_ints_use_words() {
        let mut words = Vec::new();
        words.extend_from_slice(&(-2i32).to_be_bytes());
        words.extend_from_slice(&7u32.to_be_bytes());
        words.extend_from_slice(&0.5f64.to_be_bytes());
        let mut input = binary_input(&words);
        assert_eq!(input.read_i16(), Some(-2));
        assert_eq!(input.read_u8(), Some(7));
        assert_eq!(input.read_f64(), Some(0.5));
    }

    #[test]
    fn test_binary_strings_and_names() {
        let mut words = 3u32.to_be_bytes().to_vec();
        words.extend_from_slice(b"Cub\0");
        words.extend_from_slice(&3u32.to_be_bytes());
        words.extend_from_slice(b"1ab\0");
        let mut input = binary_input(&words);
        assert_eq!(input.read_name(true).as_deref(), Some("Cub"));
        assert_eq!(input.read_name(true), None);
    }

    #[test]
    fn test_binary_string_too_long() {
        let (mut input, sink) = with_sink(binary_input(&(20_000u32).to_be_bytes()));
        assert_eq!(input.read_string(), None);
        assert!(sink.entries()[0].message.contains("String too long (20000 characters)"));
    }

    #[test]
    fn test_binary_arrays() {
        let mut words = Vec::new();
        for v in [1i32, -1, 5] {
            words.extend_from_slice(&v.to_be_bytes());
        }
        words.extend_from_slice(&f32::INFINITY.to_be_bytes());
        words.extend_from_slice(b"xyz");
        let (mut input, sink) = with_sink(binary_input(&words));
        let mut ints = [0i32; 3];
        assert!(input.read_binary_i32s(&mut ints));
        assert_eq!(ints, [1, -1, 5]);
        let mut floats = [9.0f32; 1];
        assert!(input.read_binary_f32s(&mut floats));
        assert_eq!(floats, [0.0]);
        assert_eq!(sink.len(), 1);
        let mut bytes = [0u8; 3];
        assert!(input.read_binary_bytes(&mut bytes));
        assert_eq!(&bytes, b"xyz");
    }

    #[test]
    fn test_names_per_dialect() {
        let mut input = input_from(b"#VRML V2.0 utf8\nDEF Box-1 Transform");
        assert!(input.is_file_vrml2());
        assert_eq!(input.read_name(true).as_deref(), Some("DEF"));
        assert_eq!(input.read_name(true).as_deref(), Some("Box-1"));

        let mut input = input_from(b"#Inventor V2.1 ascii\n\nBox-1");
        assert_eq!(input.read_name(true).as_deref(), Some("Box"));
        assert_eq!(input.get(), Some(b'-'));
    }

    #[test]
    fn test_comments_and_lines() {
        let mut input = input_from(b"#Inventor V2.1 ascii\n\n# comment\r\n  # another\rword");
        assert_eq!(input.read_string().as_deref(), Some("word"));
        assert_eq!(input.line(), 5);
        assert_eq!(input.location(), "Occurred at line   5 in <memory>");
    }

    #[test]
    fn test_string_array() {
        let mut input = Input::new(GlobalContext::shared());
        input
            .set_string_array(&["#Inventor V2.1 ascii\n\n", "Separator ", "{ }"])
            .unwrap();
        assert!(input.is_valid_buffer());
        assert_eq!(input.read_name(true).as_deref(), Some("Separator"));
        assert_eq!(input.read_char(true), Some(b'{'));
    }

    #[test]
    fn test_references_and_copy() {
        let ctx = GlobalContext::shared();
        let mut first = Input::new(Arc::clone(&ctx));
        first.add_reference("Wheel", ObjectHandle::node(1), false);
        let second = Input::with_references_from(&first);
        assert_eq!(second.find_reference("Wheel", None), Some(ObjectHandle::node(1)));
        assert_eq!(first.remove_reference("Wheel"), Some(ObjectHandle::node(1)));
        assert_eq!(first.find_reference("Wheel", None), None);
        assert_eq!(second.find_reference("Wheel", None), Some(ObjectHandle::node(1)));
    }

    #[test]
    fn test_global_fallback() {
        let ctx = GlobalContext::shared();
        let mut writer = Input::new(Arc::clone(&ctx));
        writer.add_reference("Shared", ObjectHandle::node(5), true);

        let isolated = Input::new(Arc::clone(&ctx));
        assert_eq!(isolated.find_reference("Shared", None), None);

        let options = ReadOptions::new().with_global_dictionary(true);
        let fallback = Input::with_options(Arc::clone(&ctx), options);
        assert_eq!(
            fallback.find_reference("Shared", Some(ObjectKind::Node)),
            Some(ObjectHandle::node(5))
        );
        assert_eq!(fallback.find_reference("Shared", Some(ObjectKind::Engine)), None);
    }

    #[test]
    fn test_routes_resolved_on_close() {
        let links = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&links);
        let (mut input, sink) = with_sink(input_from(b"#VRML V2.0 utf8\n"));
        input.set_connector(move |from: ObjectHandle, fs: &str, to: ObjectHandle, ts: &str| {
            seen.lock().unwrap().push(format!("{}.{}->{}.{}", from.id(), fs, to.id(), ts));
            true
        });
        input.add_route("T", "fraction_changed", "P", "set_fraction");
        input.add_route("T", "fraction_changed", "Missing", "set_fraction");
        assert_eq!(input.pending_routes(), 2);
        input.add_reference("T", ObjectHandle::node(1), false);
        input.add_reference("P", ObjectHandle::node(2), false);
        input.close_file();

        assert_eq!(*links.lock().unwrap(), vec!["1.fraction_changed->2.set_fraction".to_string()]);
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("Missing"));
    }

    #[test]
    fn test_template_scope_isolation() {
        let (mut input, sink) = with_sink(input_from(b"#VRML V2.0 utf8\n"));
        input.add_reference("Outer", ObjectHandle::node(1), false);
        input.push_proto("Door");
        assert_eq!(input.current_proto(), Some("Door"));
        input.add_reference("Inner", ObjectHandle::node(2), false);
        assert_eq!(input.find_reference("Outer", None), None);
        assert_eq!(input.find_reference("Inner", None), Some(ObjectHandle::node(2)));
        input.add_route("Inner", "a", "Outer", "b");
        let scope = input.pop_proto().unwrap();
        assert_eq!(scope.dictionary.len(), 1);
        assert_eq!(input.find_reference("Inner", None), None);
        assert_eq!(sink.len(), 1);
        assert!(input.pop_proto().is_none());
    }

    #[test]
    fn test_template_fall_through() {
        let options = ReadOptions::new().with_template_lookup(TemplateLookup::FallThrough);
        let mut input = Input::with_options(GlobalContext::shared(), options);
        input.add_reference("Outer", ObjectHandle::node(1), false);
        input.push_proto("Door");
        assert_eq!(input.find_reference("Outer", None), Some(ObjectHandle::node(1)));
    }

    #[test]
    fn test_is_reference() {
        let mut input = input_from(b"#VRML V2.0 utf8\nIS position translation 1 0 0");
        assert_eq!(
            input.check_is_reference(ObjectHandle::node(1), "translation"),
            IsClause::Absent
        );
        input.push_proto("Door");
        let clause = input.check_is_reference(ObjectHandle::node(1), "translation");
        assert_eq!(clause, IsClause::Recorded("position".into()));
        assert_eq!(input.check_is_reference(ObjectHandle::node(1), "scale"), IsClause::Absent);
        assert_eq!(input.read_name(true).as_deref(), Some("translation"));
        let scope = input.pop_proto().unwrap();
        assert_eq!(scope.is_references()[0].interface, "position");
    }

    #[test]
    fn test_protos_by_stream() {
        let mut input = input_from(b"#VRML V2.0 utf8\n");
        let proto = ObjectHandle::new(7, ObjectKind::Proto);
        input.add_proto("Door", proto);
        assert_eq!(input.find_proto("Door"), Some(proto));
        assert_eq!(input.find_proto("Window"), None);
    }

    #[test]
    fn test_push_file_and_pop_on_eof() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("inner.iv");
        fs::write(&inner, b"#Inventor V2.1 ascii\n\n2\n").unwrap();

        let mut input = input_from(b"#Inventor V2.1 ascii\n\n1 3");
        assert_eq!(input.read_i32(), Some(1));
        input.push_file(&inner).unwrap();
        assert_eq!(input.depth(), 2);
        assert_eq!(input.current_file_name(), inner.display().to_string());
        assert_eq!(input.read_i32(), Some(2));
        assert_eq!(input.read_i32(), Some(3));
        assert_eq!(input.depth(), 1);
        assert_eq!(input.current_file_name(), "<memory>");
    }

    #[test]
    fn test_push_file_replaces_unused_stdin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.iv");
        fs::write(&path, b"#Inventor V2.1 ascii\n\n5").unwrap();
        let mut input = Input::new(GlobalContext::shared());
        assert_eq!(input.current_file_name(), "<stdin>");
        input.push_file(&path).unwrap();
        assert_eq!(input.depth(), 1);
        assert_eq!(input.read_i32(), Some(5));
        assert_eq!(input.current_file_path(), Some(path.as_path()));
    }

    #[test]
    fn test_open_file_via_search_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("found.iv"), b"#Inventor V2.1 ascii\n\n9").unwrap();
        let ctx = GlobalContext::shared();
        ctx.search_path_mut().add_directory_first(dir.path());

        let mut input = Input::new(Arc::clone(&ctx));
        assert!(input.open_file("found.iv", false).unwrap());
        assert!(input.is_valid_file());
        assert_eq!(input.read_i32(), Some(9));

        assert!(!input.open_file("absent.iv", true).unwrap());
        let (mut input, sink) = with_sink(Input::new(ctx));
        assert!(matches!(input.open_file("absent.iv", false), Err(IoError::NotFound(_))));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_post_hook_fires_on_close() {
        let ctx = GlobalContext::shared();
        let pre = Arc::new(AtomicUsize::new(0));
        let post = Arc::new(AtomicUsize::new(0));
        let (pre_count, post_count) = (Arc::clone(&pre), Arc::clone(&post));
        let pre_hook: HeaderHook = Arc::new(move |_: &HeaderInfo| {
            pre_count.fetch_add(1, Ordering::SeqCst);
        });
        let post_hook: HeaderHook = Arc::new(move |_: &HeaderInfo| {
            post_count.fetch_add(1, Ordering::SeqCst);
        });
        let version = FormatVersion::new(1, 0);
        ctx.register_header("#Hooked V1.0", false, version, Some(pre_hook), Some(post_hook))
            .unwrap();
        let mut input = Input::new(ctx);
        input.set_buffer(b"#Hooked V1.0\n1".to_vec()).unwrap();
        assert_eq!(input.read_i32(), Some(1));
        assert_eq!(pre.load(Ordering::SeqCst), 1);
        assert_eq!(post.load(Ordering::SeqCst), 0);
        input.close_file();
        assert_eq!(post.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_prefetch_session() {
        let options = ReadOptions::new().with_prefetch(true).with_block_size(3);
        let mut input = Input::with_options(GlobalContext::shared(), options);
        input.set_buffer(b"#Inventor V2.1 ascii\n\n10 20 30".to_vec()).unwrap();
        let values: Vec<i32> = std::iter::from_fn(|| input.read_i32()).collect();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[test]
    fn test_put_back_str() {
        let mut input = input_from(b"#Inventor V2.1 ascii\n\nTail");
        assert_eq!(input.read_name(false).as_deref(), Some("Tail"));
        input.put_back_str("Head ");
        assert_eq!(input.read_name(false).as_deref(), Some("Head"));
    }
}
