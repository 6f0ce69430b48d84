//! ASCII token scanning.
//!
//! Scanners read a candidate run of bytes, match the longest valid prefix
//! against the grammar and push the remainder back. A failed match pushes
//! back everything that was read.

use super::grammar;
use super::names::NameRules;
use crate::input::header::Dialect;
use crate::input::reader::{is_space, BufferedReader};

/// Longest candidate run gathered for one numeric token.
const MAX_TOKEN_LEN: usize = 512;

/// Outcome of reading an ASCII string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringScan {
    Value(String),
    /// End of data before any character was read.
    Eof,
    /// End of data inside a quoted string.
    MissingQuote,
}

fn is_integer_char(c: u8) -> bool {
    c.is_ascii_hexdigit() || matches!(c, b'x' | b'+' | b'-')
}

fn is_real_char(c: u8) -> bool {
    c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.' | b'e' | b'E')
}

/// Read a run of bytes satisfying `class`, up to the token limit.
fn gather(reader: &mut BufferedReader, class: fn(u8) -> bool) -> Vec<u8> {
    let mut token = Vec::new();
    while token.len() < MAX_TOKEN_LEN {
        match reader.get() {
            Some(c) if class(c) => token.push(c),
            Some(c) => {
                reader.put_back(c);
                break;
            }
            None => break,
        }
    }
    token
}

/// Match `parser` against the gathered run and push back what it left.
fn recognize<'a, T>(
    reader: &mut BufferedReader,
    run: &'a [u8],
    parser: impl Fn(&'a str) -> nom::IResult<&'a str, &'a str>,
    convert: impl Fn(&str) -> T,
) -> Option<T> {
    // Runs are built from ASCII classes only.
    let text = std::str::from_utf8(run).ok()?;
    match parser(text) {
        Ok((rest, token)) => {
            reader.put_back_bytes(rest.as_bytes());
            Some(convert(token))
        }
        Err(_) => {
            reader.put_back_bytes(run);
            None
        }
    }
}

/// Read a signed integer.
pub fn read_integer(reader: &mut BufferedReader) -> Option<i64> {
    let run = gather(reader, is_integer_char);
    recognize(reader, &run, grammar::integer_token, grammar::integer_value)
}

/// Read an unsigned integer; no sign is accepted.
pub fn read_unsigned(reader: &mut BufferedReader) -> Option<u64> {
    let run = gather(reader, is_integer_char);
    recognize(reader, &run, grammar::unsigned_token, grammar::unsigned_value)
}

/// Read a `0x`-prefixed hexadecimal value.
pub fn read_hex(reader: &mut BufferedReader) -> Option<u32> {
    let run = gather(reader, is_integer_char);
    recognize(reader, &run, grammar::hex_token, |token| {
        token[2..]
            .chars()
            .filter_map(|c| c.to_digit(16))
            .fold(0u32, |acc, d| acc.wrapping_shl(4) | d)
    })
}

/// Read the text of a real literal; conversion is left to the caller.
pub fn read_real_token(reader: &mut BufferedReader) -> Option<String> {
    let run = gather(reader, is_real_char);
    recognize(reader, &run, grammar::real_token, str::to_string)
}

/// Text from raw bytes, replacing invalid UTF-8.
pub(crate) fn into_string(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Read a quoted or unquoted string. Leading whitespace must already be
/// skipped.
///
/// In VRML2 a backslash escapes a quote or a backslash. In Inventor and
/// VRML1 backslashes are literal unless a run of them meets a quote: an
/// odd run escapes the quote, an even run closes the string, and each
/// pair in the run stands for one backslash. A single backslash-quote at
/// the very end of a line keeps the backslash and lets the quote close
/// the string.
pub fn read_string(reader: &mut BufferedReader, dialect: Dialect) -> StringScan {
    let vrml2 = dialect == Dialect::Vrml2;
    let first = match reader.get() {
        Some(c) => c,
        None => return StringScan::Eof,
    };
    let quoted = first == b'"';
    if !quoted {
        reader.put_back(first);
    }

    let mut out = Vec::new();
    loop {
        let c = match reader.get() {
            Some(c) => c,
            None if quoted => return StringScan::MissingQuote,
            None if out.is_empty() => return StringScan::Eof,
            None => break,
        };

        if !quoted {
            if is_space(c) {
                reader.put_back(c);
                break;
            }
            out.push(c);
            continue;
        }

        match c {
            b'"' => break,
            b'\\' if vrml2 => match reader.get() {
                Some(b'"') => out.push(b'"'),
                Some(b'\\') => out.push(b'\\'),
                Some(next) => {
                    reader.put_back(next);
                    out.push(b'\\');
                }
                None => return StringScan::MissingQuote,
            },
            b'\\' => {
                let mut run = 1;
                let next = loop {
                    match reader.get() {
                        Some(b'\\') => run += 1,
                        Some(n) => break n,
                        None => return StringScan::MissingQuote,
                    }
                };
                if next != b'"' {
                    reader.put_back(next);
                    out.extend(std::iter::repeat(b'\\').take(run));
                    continue;
                }
                out.extend(std::iter::repeat(b'\\').take(run / 2));
                if run % 2 == 0 {
                    break;
                }
                match reader.get() {
                    Some(b'\n') => {
                        reader.put_back(b'\n');
                        reader.put_back(b'"');
                        out.push(b'\\');
                    }
                    Some(after) => {
                        reader.put_back(after);
                        out.push(b'"');
                    }
                    None => out.push(b'"'),
                }
            }
            _ => out.push(c),
        }
    }
    StringScan::Value(into_string(out))
}

/// Read a name. Leading whitespace must already be skipped. The byte that
/// ends the name is pushed back; an empty name is `None`.
pub fn read_name(reader: &mut BufferedReader, rules: &NameRules) -> Option<String> {
    let mut out = Vec::new();
    match reader.get() {
        Some(c) if rules.is_start(c) => out.push(c),
        Some(c) => {
            reader.put_back(c);
            return None;
        }
        None => return None,
    }
    while let Some(c) = reader.get() {
        if rules.is_rest(c) {
            out.push(c);
        } else {
            reader.put_back(c);
            break;
        }
    }
    Some(into_string(out))
}
