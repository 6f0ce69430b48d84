//! ASCII numeric grammar.
//!
//! Integers: `[+-] ( 0x hexdigits | digits )`. A leading `0` followed by
//! more digits is octal, as with C `strtol` in base 0.
//!
//! Reals: `[+-] ( digits [. digits] | . digits ) [ (e|E) [+-] digits ]`.
//! An exponent marker without digits is an error, not the end of the token.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1, hex_digit0, hex_digit1, one_of},
    combinator::{cut, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};

/// Recognize an unsigned integer literal.
pub fn unsigned_token(input: &str) -> IResult<&str, &str> {
    alt((recognize(pair(tag("0x"), cut(hex_digit1))), digit1))(input)
}

/// Recognize a signed integer literal.
pub fn integer_token(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(one_of("+-")), unsigned_token))(input)
}

/// Recognize a `0x`-prefixed hexadecimal literal; the digits may be empty.
pub fn hex_token(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("0x"), hex_digit0))(input)
}

/// Recognize a real literal.
pub fn real_token(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(preceded(one_of("eE"), cut(pair(opt(one_of("+-")), digit1)))),
    )))(input)
}

fn fold_digits(digits: &str, radix: u32) -> u64 {
    digits
        .chars()
        .map_while(|c| c.to_digit(radix))
        .fold(0u64, |acc, d| acc.saturating_mul(radix as u64).saturating_add(d as u64))
}

/// Magnitude of an unsigned literal accepted by [`unsigned_token`].
pub fn unsigned_value(token: &str) -> u64 {
    if let Some(hex) = token.strip_prefix("0x") {
        fold_digits(hex, 16)
    } else if token.len() > 1 && token.starts_with('0') {
        fold_digits(&token[1..], 8)
    } else {
        fold_digits(token, 10)
    }
}

/// Value of a signed literal accepted by [`integer_token`]. Out-of-range
/// magnitudes saturate.
pub fn integer_value(token: &str) -> i64 {
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };
    let magnitude = unsigned_value(digits).min(i64::MAX as u64) as i64;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_token() {
        assert_eq!(integer_token("42 "), Ok((" ", "42")));
        assert_eq!(integer_token("-7,"), Ok((",", "-7")));
        assert_eq!(integer_token("+0x1fZ"), Ok(("Z", "+0x1f")));
        assert_eq!(integer_token("0777"), Ok(("", "0777")));
        assert!(integer_token("0x").is_err());
        assert!(integer_token("0xg").is_err());
        assert!(integer_token("-").is_err());
        assert!(integer_token("abc").is_err());
    }

    #[test]
    fn test_integer_value() {
        assert_eq!(integer_value("42"), 42);
        assert_eq!(integer_value("-42"), -42);
        assert_eq!(integer_value("0x1F"), 31);
        assert_eq!(integer_value("-0x10"), -16);
        assert_eq!(integer_value("010"), 8);
        assert_eq!(integer_value("089"), 0);
        assert_eq!(integer_value("0"), 0);
        assert_eq!(integer_value("99999999999999999999999"), i64::MAX);
    }

    #[test]
    fn test_unsigned_token() {
        assert_eq!(unsigned_token("0xff"), Ok(("", "0xff")));
        assert!(unsigned_token("-1").is_err());
        assert_eq!(unsigned_value("0xffffffff"), 0xffff_ffff);
    }

    #[test]
    fn test_real_token() {
        assert_eq!(real_token("3.5\n"), Ok(("\n", "3.5")));
        assert_eq!(real_token("-1.25e-3 "), Ok((" ", "-1.25e-3")));
        assert_eq!(real_token(".5"), Ok(("", ".5")));
        assert_eq!(real_token("1."), Ok(("", "1.")));
        assert_eq!(real_token("7E+2x"), Ok(("x", "7E+2")));
        assert_eq!(real_token("12.5.3"), Ok((".3", "12.5")));
        assert!(real_token("1e").is_err());
        assert!(real_token("1e+").is_err());
        assert!(real_token(".").is_err());
        assert!(real_token("-").is_err());
        assert!(real_token("e5").is_err());
    }

    #[test]
    fn test_hex_token() {
        assert_eq!(hex_token("0xA0 "), Ok((" ", "0xA0")));
        assert_eq!(hex_token("0x"), Ok(("", "0x")));
        assert!(hex_token("12").is_err());
    }
}
