//! In-memory endpoints.

use super::{ByteSink, ByteSource};
use std::io;

/// Source over an owned byte buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
    pos: usize,
}

impl MemorySource {
    /// Read from `data`.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet handed out.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl ByteSource for MemorySource {
    fn read_buffer(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.remaining());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Growable in-memory sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    data: Vec<u8>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing was written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Forget everything written.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Take the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSink for MemorySink {
    fn write_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.data.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_chunks() {
        let mut source = MemorySource::new(b"abcdef".to_vec());
        let mut buf = [0u8; 4];
        assert_eq!(source.read_buffer(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.read_buffer(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(source.read_buffer(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.write_buffer(b"ab").unwrap();
        sink.write_buffer(b"cd").unwrap();
        assert_eq!(sink.bytes(), b"abcd");
        assert_eq!(sink.len(), 4);
        sink.clear();
        assert!(sink.is_empty());
    }
}
