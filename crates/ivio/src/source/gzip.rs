//! gzip envelopes through flate2.

use super::{scale_level, ByteSink, ByteSource};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Decompressing source; works over files and memory cursors alike.
pub struct GzipSource<R: Read> {
    decoder: MultiGzDecoder<R>,
}

impl<R: Read + Send> GzipSource<R> {
    /// Decode gzip data from `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            decoder: MultiGzDecoder::new(reader),
        }
    }
}

impl<R: Read + Send> ByteSource for GzipSource<R> {
    fn read_buffer(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

/// Compressing sink.
pub struct GzipSink<W: Write> {
    encoder: Option<GzEncoder<W>>,
}

impl<W: Write + Send> GzipSink<W> {
    /// Compress into `writer` at a level between 0.0 and 1.0.
    pub fn new(writer: W, level: f32) -> Self {
        let level = Compression::new(scale_level(level, 0, 9));
        Self {
            encoder: Some(GzEncoder::new(writer, level)),
        }
    }
}

impl<W: Write + Send> ByteSink for GzipSink<W> {
    fn write_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.write_all(bytes),
            None => Err(io::Error::new(io::ErrorKind::Other, "gzip stream already finished")),
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        match self.encoder.take() {
            Some(encoder) => encoder.finish()?.flush(),
            None => Ok(()),
        }
    }
}
