//! Binary framing: big-endian words, length-prefixed strings and 4-byte
//! alignment.

use crate::input::reader::BufferedReader;

/// Alignment unit of the binary encoding.
pub const WORD_SIZE: usize = 4;

/// Longest string accepted from a binary stream.
pub const MAX_STRING_LEN: u32 = 10 * 1024;

/// String length used by old binary files to mark the end of data.
pub const END_MARKER: u32 = 0xffff_ffff;

/// `len` rounded up to a whole number of words.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD_SIZE) * WORD_SIZE
}

/// Zero bytes needed after `position` to reach the next word boundary.
pub fn padding_for(position: u64) -> usize {
    let rem = (position % WORD_SIZE as u64) as usize;
    if rem == 0 {
        0
    } else {
        WORD_SIZE - rem
    }
}

/// Outcome of reading a length-prefixed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryString {
    Value(Vec<u8>),
    /// The end-of-data length marker, at the end of the stream.
    EndMarker,
    /// A length beyond [`MAX_STRING_LEN`].
    TooLong(u32),
    /// The stream ended inside the string.
    Truncated,
}

/// Read one 4-byte word.
pub fn read_word(reader: &mut BufferedReader) -> Option<[u8; 4]> {
    let mut word = [0u8; 4];
    reader.read_chunk(&mut word).then_some(word)
}

pub fn read_i32(reader: &mut BufferedReader) -> Option<i32> {
    read_word(reader).map(i32::from_be_bytes)
}

pub fn read_u32(reader: &mut BufferedReader) -> Option<u32> {
    read_word(reader).map(u32::from_be_bytes)
}

pub fn read_f32(reader: &mut BufferedReader) -> Option<f32> {
    read_word(reader).map(f32::from_be_bytes)
}

pub fn read_f64(reader: &mut BufferedReader) -> Option<f64> {
    let mut bytes = [0u8; 8];
    reader.read_chunk(&mut bytes).then(|| f64::from_be_bytes(bytes))
}

/// Read a length-prefixed, word-padded string.
pub fn read_string(reader: &mut BufferedReader) -> BinaryString {
    let len = match read_u32(reader) {
        Some(len) => len,
        None => return BinaryString::Truncated,
    };
    if len == 0 {
        return BinaryString::Value(Vec::new());
    }
    if len == END_MARKER {
        match reader.get() {
            Some(c) => reader.put_back(c),
            None => return BinaryString::EndMarker,
        }
    }
    if len > MAX_STRING_LEN {
        return BinaryString::TooLong(len);
    }

    let mut bytes = vec![0u8; padded_len(len as usize)];
    if !reader.read_chunk(&mut bytes) {
        return BinaryString::Truncated;
    }
    bytes.truncate(len as usize);
    BinaryString::Value(bytes)
}

/// Fill `out` with consecutive values of `N` bytes each.
fn read_array<T, const N: usize>(
    reader: &mut BufferedReader,
    out: &mut [T],
    convert: fn([u8; N]) -> T,
) -> bool {
    let mut raw = vec![0u8; out.len() * N];
    if !reader.read_chunk(&mut raw) {
        return false;
    }
    for (slot, chunk) in out.iter_mut().zip(raw.chunks_exact(N)) {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(chunk);
        *slot = convert(bytes);
    }
    true
}

pub fn read_i32s(reader: &mut BufferedReader, out: &mut [i32]) -> bool {
    read_array(reader, out, i32::from_be_bytes)
}

pub fn read_f32s(reader: &mut BufferedReader, out: &mut [f32]) -> bool {
    read_array(reader, out, f32::from_be_bytes)
}

pub fn read_f64s(reader: &mut BufferedReader, out: &mut [f64]) -> bool {
    read_array(reader, out, f64::from_be_bytes)
}
