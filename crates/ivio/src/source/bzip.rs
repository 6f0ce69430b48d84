//! bzip2 envelopes through the bzip2 crate.

use super::{scale_level, ByteSink, ByteSource};
use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::{self, Read, Write};

/// Decompressing source.
pub struct Bzip2Source<R: Read> {
    decoder: MultiBzDecoder<R>,
}

impl<R: Read + Send> Bzip2Source<R> {
    /// Decode bzip2 data from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            decoder: MultiBzDecoder::new(reader),
        }
    }
}

impl<R: Read + Send> ByteSource for Bzip2Source<R> {
    fn read_buffer(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

/// Compressing sink.
pub struct Bzip2Sink<W: Write> {
    encoder: Option<BzEncoder<W>>,
}

impl<W: Write + Send> Bzip2Sink<W> {
    /// Compress into `writer` at a level between 0.0 and 1.0.
    pub fn new(writer: W, level: f32) -> Self {
        let level = Compression::new(scale_level(level, 1, 9));
        Self {
            encoder: Some(BzEncoder::new(writer, level)),
        }
    }
}

impl<W: Write + Send> ByteSink for Bzip2Sink<W> {
    fn write_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.write_all(bytes),
            None => Err(io::Error::new(io::ErrorKind::Other, "bzip2 stream already finished")),
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        match self.encoder.take() {
            Some(encoder) => encoder.finish()?.flush(),
            None => Ok(()),
        }
    }
}
