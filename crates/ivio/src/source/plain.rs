//! Uncompressed file, handle and standard stream endpoints.

use super::{ByteSink, ByteSource};
use std::io::{self, Read, Write};

/// Source over any reader: files, sockets, caller-supplied handles.
#[derive(Debug)]
pub struct ReaderSource<R> {
    inner: R,
}

impl<R: Read + Send> ReaderSource<R> {
    /// Wrap a reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Send> ByteSource for ReaderSource<R> {
    fn read_buffer(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => return other,
            }
        }
    }
}

/// Standard input, locked only for the duration of each read.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinSource;

impl ByteSource for StdinSource {
    fn read_buffer(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::stdin().lock().read(buf)
    }
}

/// Sink over any writer: files, stdout, caller-supplied handles.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    inner: W,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wrap a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write + Send> ByteSink for WriterSink<W> {
    fn write_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
