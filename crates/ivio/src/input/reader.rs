//! Buffered reader with push-back and line accounting.
//!
//! Bytes come from three places, in this order: bytes pushed back while the
//! cursor sat at the start of the block, the current read-ahead block, and
//! finally a refill from the source. Pushing back while the cursor is inside
//! the block rewinds the cursor and rewrites the byte in place.
//!
//! Line numbers start at 1. A line ends at `\r`, at `\n`, or at `\r\n`
//! counted once. Every pushed-back byte carries the line increment it was
//! charged with, so `put_back(c)` followed by `get()` always restores the
//! line number.

use super::prefetch::Prefetcher;
use crate::options::DEFAULT_BLOCK_SIZE;
use crate::source::ByteSource;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::io;

/// Number of consumed bytes remembered for line accounting on push-back.
const HISTORY_LEN: usize = 1024;

enum Feed {
    Direct(Box<dyn ByteSource>),
    Prefetch(Prefetcher),
}

/// Whitespace between tokens.
pub fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r')
}

/// Cursor over one byte source.
pub struct BufferedReader {
    feed: Feed,
    block: Vec<u8>,
    cursor: usize,
    block_size: usize,
    /// Bytes pushed back while `cursor == 0`; the top is read first.
    back: SmallVec<[u8; 32]>,
    /// Line increment charged to each pushed-back byte not yet re-read.
    pending: SmallVec<[bool; 32]>,
    /// Recently consumed bytes and whether each ended a line.
    history: VecDeque<(u8, bool)>,
    line: usize,
    eof: bool,
    exhausted: bool,
    total_read: u64,
    error: Option<io::Error>,
}

impl BufferedReader {
    /// Read synchronously from `source`.
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Self::with_block_size(source, DEFAULT_BLOCK_SIZE)
    }

    /// Read synchronously with a custom block size.
    pub fn with_block_size(source: Box<dyn ByteSource>, block_size: usize) -> Self {
        Self::from_feed(Feed::Direct(source), block_size)
    }

    /// Read with a background thread filling the next block.
    pub fn with_prefetch(source: Box<dyn ByteSource>, block_size: usize) -> io::Result<Self> {
        let block_size = block_size.max(1);
        let prefetcher = Prefetcher::spawn(source, block_size)?;
        Ok(Self::from_feed(Feed::Prefetch(prefetcher), block_size))
    }

    fn from_feed(feed: Feed, block_size: usize) -> Self {
        Self {
            feed,
            block: Vec::new(),
            cursor: 0,
            block_size: block_size.max(1),
            back: SmallVec::new(),
            pending: SmallVec::new(),
            history: VecDeque::with_capacity(HISTORY_LEN),
            line: 1,
            eof: false,
            exhausted: false,
            total_read: 0,
            error: None,
        }
    }

    /// Whether reads are served by the background thread.
    pub fn is_prefetching(&self) -> bool {
        matches!(self.feed, Feed::Prefetch(_))
    }

    /// Current line number, starting at 1.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Whether the last read hit the end of the source.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Bytes consumed so far, net of pending push-back.
    pub fn bytes_consumed(&self) -> u64 {
        (self.total_read + self.cursor as u64).saturating_sub(self.back.len() as u64)
    }

    /// Take the I/O error that ended the stream, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Load the next block. Returns false and latches end-of-file when the
    /// source yields nothing.
    fn refill(&mut self) -> bool {
        self.total_read += self.block.len() as u64;
        self.cursor = 0;
        if self.exhausted {
            self.block.clear();
            self.eof = true;
            return false;
        }

        let result = match &mut self.feed {
            Feed::Direct(source) => {
                self.block.resize(self.block_size, 0);
                match source.read_buffer(&mut self.block) {
                    Ok(n) => {
                        self.block.truncate(n);
                        Ok(n)
                    }
                    Err(e) => {
                        self.block.clear();
                        Err(e)
                    }
                }
            }
            Feed::Prefetch(prefetcher) => {
                let drained = std::mem::take(&mut self.block);
                match prefetcher.next_block(drained) {
                    Ok(block) => {
                        self.block = block;
                        Ok(self.block.len())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match result {
            Ok(n) if n > 0 => true,
            Ok(_) => {
                self.exhausted = true;
                self.eof = true;
                false
            }
            Err(e) => {
                log::warn!("read failed: {}", e);
                self.error = Some(e);
                self.exhausted = true;
                self.eof = true;
                false
            }
        }
    }

    /// Whether another byte can be read, refilling if needed.
    pub fn has_data(&mut self) -> bool {
        if !self.back.is_empty() || self.cursor < self.block.len() {
            return true;
        }
        self.refill()
    }

    /// Next byte, or `None` at end of data.
    pub fn get(&mut self) -> Option<u8> {
        let c = if self.cursor == 0 && !self.back.is_empty() {
            self.back.pop()?
        } else {
            if self.cursor >= self.block.len() && !self.refill() {
                return None;
            }
            let c = self.block[self.cursor];
            self.cursor += 1;
            c
        };

        let ends_line = match self.pending.pop() {
            Some(charged) => charged,
            None => {
                let prev = self.history.back().map(|&(b, _)| b);
                c == b'\r' || (c == b'\n' && prev != Some(b'\r'))
            }
        };
        if ends_line {
            self.line += 1;
        }
        self.remember(c, ends_line);
        Some(c)
    }

    fn remember(&mut self, c: u8, ends_line: bool) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back((c, ends_line));
    }

    /// Push one byte back; the next `get` returns it.
    pub fn put_back(&mut self, c: u8) {
        let ends_line = match self.history.pop_back() {
            Some((b, charged)) if b == c => charged,
            _ => {
                let prev = self.history.back().map(|&(b, _)| b);
                c == b'\r' || (c == b'\n' && prev != Some(b'\r'))
            }
        };
        let charged = ends_line && self.line > 1;
        if charged {
            self.line -= 1;
        }
        self.pending.push(charged);

        if self.cursor > 0 {
            self.cursor -= 1;
            self.block[self.cursor] = c;
        } else {
            self.back.push(c);
        }
        self.eof = false;
    }

    /// Push a run of bytes back; the next reads return them in order.
    pub fn put_back_bytes(&mut self, bytes: &[u8]) {
        for &c in bytes.iter().rev() {
            self.put_back(c);
        }
    }

    /// Fill `out` completely, or return false at end of data.
    ///
    /// Used for binary payloads; line accounting is not applied to the
    /// bytes copied straight from the block.
    pub fn read_chunk(&mut self, out: &mut [u8]) -> bool {
        let mut filled = 0;
        while filled < out.len() && !self.pending.is_empty() {
            match self.get() {
                Some(c) => {
                    out[filled] = c;
                    filled += 1;
                }
                None => return false,
            }
        }
        if filled < out.len() {
            self.history.clear();
        }
        while filled < out.len() {
            if self.cursor >= self.block.len() && !self.refill() {
                return false;
            }
            let n = (out.len() - filled).min(self.block.len() - self.cursor);
            out[filled..filled + n].copy_from_slice(&self.block[self.cursor..self.cursor + n]);
            self.cursor += n;
            filled += n;
        }
        true
    }

    /// Skip spaces, tabs and line ends; with `comments`, also `#` through
    /// end of line. Returns false when the end of data was reached.
    pub fn skip_whitespace(&mut self, comments: bool) -> bool {
        loop {
            let c = loop {
                match self.get() {
                    Some(c) if is_space(c) => continue,
                    Some(c) => break c,
                    None => return false,
                }
            };

            if comments && c == b'#' {
                loop {
                    match self.get() {
                        Some(b'\n') => break,
                        Some(b'\r') => {
                            match self.get() {
                                Some(b'\n') => {}
                                Some(other) => self.put_back(other),
                                None => return false,
                            }
                            break;
                        }
                        Some(_) => continue,
                        None => return false,
                    }
                }
            } else {
                self.put_back(c);
                return true;
            }
        }
    }
}
