//! Byte sources and sinks.
//!
//! Every stream reads from a [`ByteSource`] and every output session writes
//! to a [`ByteSink`]. The variant set is small and fixed:
//!
//! | Variant | Source | Sink |
//! |---------|--------|------|
//! | Plain file or caller-supplied handle | [`ReaderSource`] | [`WriterSink`] |
//! | Memory buffer | [`MemorySource`] | [`MemorySink`] |
//! | Standard streams | [`StdinSource`] | [`WriterSink`] over stdout |
//! | gzip file or memory buffer | `GzipSource` | `GzipSink` |
//! | bzip2 file | `Bzip2Source` | `Bzip2Sink` |
//!
//! Compressed envelopes are recognized by their two-byte magic before any
//! header parsing happens.

mod memory;
mod plain;

#[cfg(feature = "bzip2")]
mod bzip;
#[cfg(feature = "gzip")]
mod gzip;

pub use memory::{MemorySink, MemorySource};
pub use plain::{ReaderSource, StdinSource, WriterSink};

#[cfg(feature = "bzip2")]
pub use bzip::{Bzip2Sink, Bzip2Source};
#[cfg(feature = "gzip")]
pub use gzip::{GzipSink, GzipSource};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::path::Path;

/// gzip magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// bzip2 magic bytes.
pub const BZIP2_MAGIC: [u8; 2] = [b'B', b'Z'];

/// Anything bytes can be read from.
pub trait ByteSource: Send {
    /// Read up to `buf.len()` bytes. Zero means the source is exhausted.
    fn read_buffer(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Anything bytes can be written to.
pub trait ByteSink: Send {
    /// Write all of `bytes`.
    fn write_buffer(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Flush and write any trailer. Called once when the session closes.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Compression envelope around a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompressionMethod {
    /// Raw bytes.
    #[default]
    None,
    /// gzip (RFC 1952).
    Gzip,
    /// bzip2.
    Bzip2,
}

impl CompressionMethod {
    /// Identify the envelope from the first bytes of a stream.
    pub fn sniff(prefix: &[u8]) -> Self {
        if prefix.starts_with(&GZIP_MAGIC) {
            Self::Gzip
        } else if prefix.starts_with(&BZIP2_MAGIC) {
            Self::Bzip2
        } else {
            Self::None
        }
    }

    /// Upper-case method name, as accepted by [`CompressionMethod::from_name`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Gzip => "GZIP",
            Self::Bzip2 => "BZIP2",
        }
    }

    /// Parse a method name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NONE" => Some(Self::None),
            "GZIP" => Some(Self::Gzip),
            "BZIP2" => Some(Self::Bzip2),
            _ => None,
        }
    }

    /// Whether support for this method was compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            Self::None => true,
            Self::Gzip => cfg!(feature = "gzip"),
            Self::Bzip2 => cfg!(feature = "bzip2"),
        }
    }

    /// All methods usable in this build.
    pub fn available() -> Vec<Self> {
        [Self::None, Self::Gzip, Self::Bzip2]
            .into_iter()
            .filter(|m| m.is_available())
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        }
    }
}

/// Open a file, detecting a compressed envelope.
pub fn open_file(path: &Path) -> Result<(Box<dyn ByteSource>, CompressionMethod)> {
    let file = File::open(path)?;
    sniffed_source(file)
}

/// Wrap any reader, detecting a compressed envelope.
///
/// The reader is owned by the returned source. Callers that want to keep
/// using their handle afterwards pass a duplicate, e.g. `file.try_clone()`.
pub fn sniffed_source<R>(reader: R) -> Result<(Box<dyn ByteSource>, CompressionMethod)>
where
    R: Read + Send + 'static,
{
    let mut buffered = BufReader::new(reader);
    let method = CompressionMethod::sniff(buffered.fill_buf()?);
    let source: Box<dyn ByteSource> = match method {
        CompressionMethod::None => Box::new(ReaderSource::new(buffered)),
        CompressionMethod::Gzip => gzip_source(buffered)?,
        CompressionMethod::Bzip2 => bzip2_source(buffered)?,
    };
    log::debug!("opened source with {} envelope", method.backend_name());
    Ok((source, method))
}

/// Use an in-memory buffer, detecting a compressed envelope.
pub fn memory_source(data: Vec<u8>) -> Result<(Box<dyn ByteSource>, CompressionMethod)> {
    let method = CompressionMethod::sniff(&data);
    let source: Box<dyn ByteSource> = match method {
        CompressionMethod::None => Box::new(MemorySource::new(data)),
        CompressionMethod::Gzip => gzip_source(Cursor::new(data))?,
        CompressionMethod::Bzip2 => bzip2_source(Cursor::new(data))?,
    };
    Ok((source, method))
}

/// Wrap a writer in the requested compression.
pub fn compressed_sink<W>(
    writer: W,
    method: CompressionMethod,
    level: f32,
) -> Result<Box<dyn ByteSink>>
where
    W: Write + Send + 'static,
{
    match method {
        CompressionMethod::None => Ok(Box::new(WriterSink::new(writer))),
        CompressionMethod::Gzip => gzip_sink(writer, level),
        CompressionMethod::Bzip2 => bzip2_sink(writer, level),
    }
}

#[cfg(feature = "gzip")]
fn gzip_source<R: Read + Send + 'static>(reader: R) -> Result<Box<dyn ByteSource>> {
    Ok(Box::new(GzipSource::new(reader)))
}

#[cfg(not(feature = "gzip"))]
fn gzip_source<R: Read + Send + 'static>(_reader: R) -> Result<Box<dyn ByteSource>> {
    Err(crate::error::IoError::MissingBackend { method: "gzip" })
}

#[cfg(feature = "bzip2")]
fn bzip2_source<R: Read + Send + 'static>(reader: R) -> Result<Box<dyn ByteSource>> {
    Ok(Box::new(Bzip2Source::new(reader)))
}

#[cfg(not(feature = "bzip2"))]
fn bzip2_source<R: Read + Send + 'static>(_reader: R) -> Result<Box<dyn ByteSource>> {
    Err(crate::error::IoError::MissingBackend { method: "bzip2" })
}

#[cfg(feature = "gzip")]
fn gzip_sink<W: Write + Send + 'static>(writer: W, level: f32) -> Result<Box<dyn ByteSink>> {
    Ok(Box::new(GzipSink::new(writer, level)))
}

#[cfg(not(feature = "gzip"))]
fn gzip_sink<W: Write + Send + 'static>(_writer: W, _level: f32) -> Result<Box<dyn ByteSink>> {
    Err(crate::error::IoError::MissingBackend { method: "gzip" })
}

#[cfg(feature = "bzip2")]
fn bzip2_sink<W: Write + Send + 'static>(writer: W, level: f32) -> Result<Box<dyn ByteSink>> {
    Ok(Box::new(Bzip2Sink::new(writer, level)))
}

#[cfg(not(feature = "bzip2"))]
fn bzip2_sink<W: Write + Send + 'static>(_writer: W, _level: f32) -> Result<Box<dyn ByteSink>> {
    Err(crate::error::IoError::MissingBackend { method: "bzip2" })
}

/// Map a 0.0..=1.0 level onto a library's integer range.
pub(crate) fn scale_level(level: f32, min: u32, max: u32) -> u32 {
    let level = level.clamp(0.0, 1.0);
    min + ((max - min) as f32 * level).round() as u32
}
