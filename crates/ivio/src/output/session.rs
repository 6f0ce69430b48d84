//! Output session.
//!
//! [`Output`] writes primitives in ASCII or binary form to a memory
//! buffer, a file, standard output or a caller-supplied writer. The file
//! header goes out just before the first payload byte. In binary mode
//! every value except raw characters and byte arrays is zero-padded to the
//! next word boundary, measured from the start of the output.
//!
//! A failed write disables the session. The failure is logged once and
//! [`Output::finish`] returns [`IoError::WriteDisabled`].

use super::writeref::{DefScopes, Emission, WriteRefCounter};
use crate::codec::binary::padding_for;
use crate::codec::format::{format_f32, format_f64, quote};
use crate::context::GlobalContext;
use crate::error::{IoError, Result};
use crate::input::Dialect;
use crate::options::WriteOptions;
use crate::source::{compressed_sink, ByteSink, CompressionMethod, MemorySink, WriterSink};
use ivio_core::ObjectHandle;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

const ASCII_HEADER: &str = "#Inventor V2.1 ascii";
const BINARY_HEADER: &str = "#Inventor V2.1 binary";
const INDENT: &str = "  ";

/// Which pass of a graph write is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStage {
    /// Counting references; nothing is written.
    #[default]
    CountRefs,
    /// Writing the graph.
    Write,
}

/// What happens to a template's unwritten routes when it is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtoPolicy {
    #[default]
    Discard,
    /// Hand them to the enclosing level.
    MergeIntoParent,
}

/// A route between two objects waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRoute {
    pub from: ObjectHandle,
    pub from_slot: String,
    pub to: ObjectHandle,
    pub to_slot: String,
}

enum Target {
    Memory(MemorySink),
    Sink(Box<dyn ByteSink>),
}

/// Write session.
pub struct Output {
    context: Arc<GlobalContext>,
    options: WriteOptions,
    target: Target,
    written: u64,
    wrote_header: bool,
    disabled: bool,
    indent_level: usize,
    stage: WriteStage,
    defs: DefScopes,
    routes: Vec<Vec<ObjectRoute>>,
    protos: Vec<String>,
    counter: WriteRefCounter,
}

impl Output {
    /// Session writing to memory with options seeded from `context`.
    pub fn new(context: Arc<GlobalContext>) -> Self {
        let options = context.write_options();
        Self::with_options(context, options)
    }

    pub fn with_options(context: Arc<GlobalContext>, options: WriteOptions) -> Self {
        let counter = WriteRefCounter::from_options(&options);
        let mut output = Self {
            context,
            options,
            target: Target::Memory(MemorySink::new()),
            written: 0,
            wrote_header: false,
            disabled: false,
            indent_level: 0,
            stage: WriteStage::default(),
            defs: DefScopes::new(),
            routes: vec![Vec::new()],
            protos: Vec::new(),
            counter,
        };
        output.update_name_policy();
        output
    }

    /// New session sharing `other`'s write counts and claimed DEF names.
    pub fn with_references_from(other: &Output) -> Self {
        let mut output = Self::with_options(Arc::clone(&other.context), other.options.clone());
        output.counter = other.counter.clone();
        output.defs = other.defs.clone();
        output
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    pub fn context(&self) -> &Arc<GlobalContext> {
        &self.context
    }

    // Targets

    fn replace_target(&mut self, target: Target) -> Result<()> {
        let result = self.finish_target();
        self.target = target;
        self.written = 0;
        self.wrote_header = false;
        self.disabled = false;
        result
    }

    fn finish_target(&mut self) -> Result<()> {
        match &mut self.target {
            Target::Memory(_) => Ok(()),
            Target::Sink(sink) => sink.finish().map_err(IoError::from),
        }
    }

    /// Write to a fresh memory buffer.
    pub fn set_buffer(&mut self) -> Result<()> {
        self.replace_target(Target::Memory(MemorySink::new()))
    }

    /// Bytes written so far in memory mode; empty for other targets.
    pub fn buffer(&self) -> &[u8] {
        match &self.target {
            Target::Memory(sink) => sink.bytes(),
            Target::Sink(_) => &[],
        }
    }

    /// Start the memory buffer over, header included.
    pub fn reset_buffer(&mut self) {
        if let Target::Memory(sink) = &mut self.target {
            sink.clear();
            self.written = 0;
            self.wrote_header = false;
        }
    }

    pub fn is_to_buffer(&self) -> bool {
        matches!(self.target, Target::Memory(_))
    }

    /// Create `path` and write to it, compressed if configured.
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let sink = compressed_sink(file, self.options.compression, self.options.compression_level)?;
        log::debug!(
            "writing {} ({} envelope)",
            path.display(),
            self.options.compression.name()
        );
        self.replace_target(Target::Sink(sink))
    }

    /// Write to a caller-supplied writer, compressed if configured.
    pub fn set_writer<W>(&mut self, writer: W) -> Result<()>
    where
        W: Write + Send + 'static,
    {
        let sink =
            compressed_sink(writer, self.options.compression, self.options.compression_level)?;
        self.replace_target(Target::Sink(sink))
    }

    /// Write uncompressed to standard output.
    pub fn set_stdout(&mut self) -> Result<()> {
        self.replace_target(Target::Sink(Box::new(WriterSink::new(io::stdout()))))
    }

    /// Finish the current target and fall back to a memory buffer.
    pub fn close_file(&mut self) -> Result<()> {
        let disabled = self.disabled;
        let result = self.replace_target(Target::Memory(MemorySink::new()));
        if disabled {
            return Err(IoError::WriteDisabled);
        }
        result
    }

    /// Flush the target. Fails if an earlier write failed.
    pub fn finish(&mut self) -> Result<()> {
        if self.disabled {
            return Err(IoError::WriteDisabled);
        }
        self.finish_target()
    }

    /// Close the target and clear every per-write state.
    pub fn reset(&mut self) -> Result<()> {
        let result = self.close_file();
        self.routes = vec![Vec::new()];
        self.protos.clear();
        self.defs.clear();
        self.disabled = false;
        self.wrote_header = false;
        self.indent_level = 0;
        result
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Bytes written to the current target, header included.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    // Format

    pub fn set_binary(&mut self, binary: bool) {
        self.options.binary = binary;
    }

    pub fn is_binary(&self) -> bool {
        self.options.binary
    }

    pub fn default_ascii_header() -> &'static str {
        ASCII_HEADER
    }

    pub fn default_binary_header() -> &'static str {
        BINARY_HEADER
    }

    /// Use `header` instead of the default header for the mode.
    pub fn set_header_string(&mut self, header: impl Into<String>) {
        self.options.header = Some(header.into());
        self.update_name_policy();
    }

    pub fn reset_header_string(&mut self) {
        self.options.header = None;
        self.update_name_policy();
    }

    /// Header line this session writes.
    pub fn header_string(&self) -> &str {
        match &self.options.header {
            Some(header) => header,
            None if self.options.binary => BINARY_HEADER,
            None => ASCII_HEADER,
        }
    }

    /// VRML output keeps DEF names unmangled.
    fn update_name_policy(&mut self) {
        let vrml = Dialect::from_header(self.header_string()) != Dialect::Inventor;
        self.counter.set_dont_mangle(self.options.dont_mangle_names || vrml);
    }

    /// Significant digits for floats, clamped to 0..=8. Doubles get twice
    /// the requested digits. At 8, the default, every value is written
    /// with the digits it needs to read back exactly.
    pub fn set_float_precision(&mut self, precision: u8) {
        self.options.float_precision = precision.min(8);
    }

    pub fn float_precision(&self) -> u8 {
        self.options.float_precision
    }

    /// Compression for files opened afterwards. Memory buffers are never
    /// compressed. Returns false, and turns compression off, when the
    /// method was not compiled in.
    pub fn set_compression(&mut self, method: CompressionMethod, level: f32) -> bool {
        if method.is_available() {
            self.options.compression = method;
            self.options.compression_level = level.clamp(0.0, 1.0);
            return true;
        }
        log::warn!("requested {} compression, but it is not available", method.name());
        self.options.compression = CompressionMethod::None;
        self.options.compression_level = 0.0;
        false
    }

    pub fn available_compression_methods() -> Vec<CompressionMethod> {
        CompressionMethod::available()
    }

    pub fn set_compact(&mut self, compact: bool) {
        self.options.compact = compact;
    }

    pub fn is_compact(&self) -> bool {
        self.options.compact
    }

    pub fn set_stage(&mut self, stage: WriteStage) {
        self.stage = stage;
    }

    pub fn stage(&self) -> WriteStage {
        self.stage
    }

    // Raw output

    fn emit(&mut self, bytes: &[u8]) {
        if self.disabled {
            return;
        }
        self.check_header();
        self.emit_unchecked(bytes);
    }

    fn emit_unchecked(&mut self, bytes: &[u8]) {
        if self.disabled || bytes.is_empty() {
            return;
        }
        let result = match &mut self.target {
            Target::Memory(sink) => sink.write_buffer(bytes),
            Target::Sink(sink) => sink.write_buffer(bytes),
        };
        match result {
            Ok(()) => self.written += bytes.len() as u64,
            Err(e) => {
                log::warn!("couldn't write to output: {}", e);
                self.disabled = true;
            }
        }
    }

    fn check_header(&mut self) {
        if self.wrote_header {
            return;
        }
        self.wrote_header = true;
        let mut header = self.header_string().to_string();
        if self.options.binary {
            let pad = padding_for(header.len() as u64 + 1);
            header.extend(std::iter::repeat(' ').take(pad));
            header.push('\n');
        } else {
            header.push_str("\n\n");
        }
        self.emit_unchecked(header.as_bytes());
    }

    /// Write `bytes`, then pad the value to whole words in binary mode.
    fn emit_padded(&mut self, bytes: &[u8]) {
        self.emit(bytes);
        if self.options.binary {
            let pad = padding_for(bytes.len() as u64);
            self.emit(&[0u8; 4][..pad]);
        }
    }

    // Primitives

    /// One raw byte, never padded.
    pub fn write_char(&mut self, c: u8) {
        self.emit(&[c]);
    }

    /// Text as is in ASCII; length-prefixed and padded in binary.
    pub fn write_str(&mut self, s: &str) {
        if self.options.binary {
            self.write_u32(s.len() as u32);
        }
        self.emit_padded(s.as_bytes());
    }

    /// A string value: quoted in ASCII, length-prefixed in binary.
    pub fn write_string(&mut self, s: &str) {
        if self.options.binary {
            self.write_str(s);
        } else {
            let dialect = Dialect::from_header(self.header_string());
            self.emit(quote(s, dialect).as_bytes());
        }
    }

    pub fn write_i32(&mut self, value: i32) {
        if self.options.binary {
            self.emit_padded(&value.to_be_bytes());
        } else {
            self.emit(value.to_string().as_bytes());
        }
    }

    /// Hexadecimal in ASCII.
    pub fn write_u32(&mut self, value: u32) {
        if self.options.binary {
            self.emit_padded(&value.to_be_bytes());
        } else {
            self.emit(format!("{:#x}", value).as_bytes());
        }
    }

    /// A full word in binary.
    pub fn write_i16(&mut self, value: i16) {
        if self.options.binary {
            self.write_i32(value as i32);
        } else {
            self.emit(value.to_string().as_bytes());
        }
    }

    /// Hexadecimal in ASCII; a full word in binary.
    pub fn write_u16(&mut self, value: u16) {
        if self.options.binary {
            self.write_u32(value as u32);
        } else {
            self.emit(format!("{:#x}", value).as_bytes());
        }
    }

    pub fn write_f32(&mut self, value: f32) {
        if self.options.binary {
            self.emit_padded(&value.to_be_bytes());
        } else {
            let text = format_f32(value, self.options.float_precision);
            self.emit(text.as_bytes());
        }
    }

    pub fn write_f64(&mut self, value: f64) {
        if self.options.binary {
            self.emit_padded(&value.to_be_bytes());
        } else {
            let text = format_f64(value, self.options.float_precision);
            self.emit(text.as_bytes());
        }
    }

    // Binary arrays

    /// Raw bytes without padding.
    pub fn write_binary_bytes(&mut self, bytes: &[u8]) {
        self.emit(bytes);
    }

    pub fn write_binary_i32s(&mut self, values: &[i32]) {
        for value in values {
            self.emit_padded(&value.to_be_bytes());
        }
    }

    pub fn write_binary_f32s(&mut self, values: &[f32]) {
        for value in values {
            self.emit_padded(&value.to_be_bytes());
        }
    }

    pub fn write_binary_f64s(&mut self, values: &[f64]) {
        for value in values {
            self.emit_padded(&value.to_be_bytes());
        }
    }

    // Indentation

    pub fn increment_indent(&mut self, levels: usize) {
        self.indent_level += levels;
    }

    /// Lower the indentation; stops at zero.
    pub fn decrement_indent(&mut self, levels: usize) {
        if levels > self.indent_level {
            log::debug!("indentation level below zero, clamped");
        }
        self.indent_level = self.indent_level.saturating_sub(levels);
    }

    pub fn indent_level(&self) -> usize {
        self.indent_level
    }

    /// Indent a fresh line. Does nothing in compact and binary output.
    pub fn indent(&mut self) {
        if self.options.binary {
            log::warn!("indent called on binary output");
            return;
        }
        if self.options.compact {
            return;
        }
        let text = INDENT.repeat(self.indent_level);
        self.emit(text.as_bytes());
    }

    // DEF names

    pub fn add_def_node(&mut self, name: &str) {
        self.defs.add(name);
    }

    pub fn lookup_def_node(&self, name: &str) -> bool {
        self.defs.contains(name)
    }

    pub fn remove_def_node(&mut self, name: &str) -> bool {
        self.defs.remove(name)
    }

    // Write references

    pub fn counter(&self) -> &WriteRefCounter {
        &self.counter
    }

    pub fn counter_mut(&mut self) -> &mut WriteRefCounter {
        &mut self.counter
    }

    /// Count a path to `object` during the counting pass.
    pub fn add_write_reference(&mut self, object: ObjectHandle, from_field: bool) {
        debug_assert_eq!(self.stage, WriteStage::CountRefs);
        self.counter.add_write_reference(object, from_field);
    }

    /// How to write `object` now; counts the write.
    pub fn emission(&mut self, object: ObjectHandle, name: &str) -> Emission {
        self.counter.emission(object, name, &mut self.defs)
    }

    /// Name `object` is written under, claiming one on first use.
    pub fn write_name(&mut self, object: ObjectHandle, name: &str) -> String {
        self.counter.write_name(object, name, &mut self.defs)
    }

    // Templates and routes

    /// Enter a template definition: fresh DEF names and routes.
    pub fn push_proto(&mut self, name: impl Into<String>) {
        self.protos.push(name.into());
        self.defs.push();
        self.routes.push(Vec::new());
    }

    pub fn current_proto(&self) -> Option<&str> {
        self.protos.last().map(String::as_str)
    }

    /// Leave the innermost template definition.
    pub fn pop_proto(&mut self, policy: ProtoPolicy) -> Option<String> {
        let Some(name) = self.protos.pop() else {
            log::warn!("pop_proto called outside a template");
            return None;
        };
        self.defs.pop();
        if let Some(pending) = self.routes.pop() {
            match policy {
                ProtoPolicy::Discard if !pending.is_empty() => {
                    log::debug!("dropping {} unwritten route(s) of {}", pending.len(), name);
                }
                ProtoPolicy::Discard => {}
                ProtoPolicy::MergeIntoParent => self.current_routes().extend(pending),
            }
        }
        Some(name)
    }

    fn current_routes(&mut self) -> &mut Vec<ObjectRoute> {
        if self.routes.is_empty() {
            self.routes.push(Vec::new());
        }
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    pub fn add_route(
        &mut self,
        from: ObjectHandle,
        from_slot: &str,
        to: ObjectHandle,
        to_slot: &str,
    ) {
        self.current_routes().push(ObjectRoute {
            from,
            from_slot: from_slot.to_string(),
            to,
            to_slot: to_slot.to_string(),
        });
    }

    pub fn pending_routes(&self) -> usize {
        self.routes.last().map_or(0, Vec::len)
    }

    /// Write the routes of the current level as `ROUTE a.f TO b.g` lines
    /// and count one write for each endpoint. `name_of` gives an object's
    /// own name.
    pub fn resolve_routes<F>(&mut self, mut name_of: F)
    where
        F: FnMut(ObjectHandle) -> String,
    {
        let pending = std::mem::take(self.current_routes());
        for route in pending {
            let from = self.write_name(route.from, &name_of(route.from));
            let to = self.write_name(route.to, &name_of(route.to));
            if self.options.binary {
                self.write_str("ROUTE");
                self.write_str(&format!("{}.{}", from, route.from_slot));
                self.write_str("TO");
                self.write_str(&format!("{}.{}", to, route.to_slot));
            } else {
                self.indent();
                let line =
                    format!("ROUTE {}.{} TO {}.{}\n", from, route.from_slot, to, route.to_slot);
                self.emit(line.as_bytes());
            }
            self.counter.decrement_write_ref(route.from);
            self.counter.decrement_write_ref(route.to);
        }
    }
}
