//! Locale-independent number formatting.
//!
//! Floats follow C's `%.Pg` rules. Exponents are written with their sign
//! and exactly three digits, so output is identical on every platform.

use crate::input::header::Dialect;

/// Digits of a float written with the default precision.
pub const DEFAULT_FLOAT_PRECISION: u8 = 8;

/// Format `value` like C `%.{precision}g`, with a three-digit exponent.
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let precision = precision.max(1);
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:03}", mantissa, sign, exponent.unsigned_abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

/// Drop trailing zeros of the fractional part, and the point if bare.
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Format a float at `precision` significant digits. At the maximum
/// precision the value is written with the fewest digits that read back
/// to the same bits.
pub fn format_f32(value: f32, precision: u8) -> String {
    if precision >= DEFAULT_FLOAT_PRECISION && value.is_finite() {
        let shortest = significant_digits(&format!("{:e}", value));
        return (shortest..=9)
            .map(|digits| format_g(value as f64, digits))
            .find(|text| text.parse::<f32>().map(f32::to_bits) == Ok(value.to_bits()))
            .unwrap_or_else(|| format_g(value as f64, 9));
    }
    format_g(value as f64, precision as usize)
}

/// Format a double at `precision` significant digits. Doubles get twice
/// the float digits; the maximum precision writes the exact round-trip
/// form.
pub fn format_f64(value: f64, precision: u8) -> String {
    if precision >= DEFAULT_FLOAT_PRECISION && value.is_finite() {
        let shortest = significant_digits(&format!("{:e}", value));
        return (shortest..=17)
            .map(|digits| format_g(value, digits))
            .find(|text| text.parse::<f64>().map(f64::to_bits) == Ok(value.to_bits()))
            .unwrap_or_else(|| format_g(value, 17));
    }
    format_g(value, precision as usize * 2)
}

/// Digits in the mantissa of a `{:e}` rendering.
fn significant_digits(scientific: &str) -> usize {
    let mantissa = scientific.split('e').next().unwrap_or(scientific);
    mantissa.bytes().filter(u8::is_ascii_digit).count().max(1)
}

/// Wrap `s` in double quotes so the reader for `dialect` returns it
/// unchanged.
///
/// VRML2 escapes every backslash and quote. Inventor and VRML1 keep
/// backslashes literal unless they run into a quote: a run followed by
/// an embedded quote is written `2n + 1` long, a run that ends the
/// string `2n` long.
pub fn quote(s: &str, dialect: Dialect) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    if dialect == Dialect::Vrml2 {
        for c in s.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
    } else {
        let mut run = 0;
        for c in s.chars() {
            match c {
                '\\' => run += 1,
                '"' => {
                    push_backslashes(&mut out, 2 * run + 1);
                    out.push('"');
                    run = 0;
                }
                _ => {
                    push_backslashes(&mut out, run);
                    out.push(c);
                    run = 0;
                }
            }
        }
        push_backslashes(&mut out, 2 * run);
    }
    out.push('"');
    out
}

fn push_backslashes(out: &mut String, count: usize) {
    out.extend(std::iter::repeat('\\').take(count));
}
