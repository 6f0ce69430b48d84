//! Identifier character classes.
//!
//! Each dialect has its own rule for the first character of a name and
//! for the rest. With `valid_ident` off, Inventor names are any run of
//! non-control characters.

use crate::input::header::Dialect;

const VRML1_INVALID: &[u8] = b"\"#'()+,.\\{|}";
const VRML1_IDENT_INVALID: &[u8] = b"\"#&'()+,.[\\]{|}";
const VRML2_START_INVALID: &[u8] = b"\"#'()+,-.[\\]{|}\x7f";
const VRML2_REST_INVALID: &[u8] = b"\"#'(),.[\\]{|}\x7f";

/// Name validation settings for one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameRules {
    pub dialect: Dialect,
    /// Require a strict identifier rather than any printable run.
    pub valid_ident: bool,
    /// Accept `+` as the first character of a VRML2 name.
    pub allow_plus_start: bool,
}

impl NameRules {
    pub fn new(dialect: Dialect, valid_ident: bool) -> Self {
        Self {
            dialect,
            valid_ident,
            allow_plus_start: false,
        }
    }

    pub fn with_plus_start(mut self, allow: bool) -> Self {
        self.allow_plus_start = allow;
        self
    }

    /// Whether `c` may start a name.
    pub fn is_start(&self, c: u8) -> bool {
        match self.dialect {
            Dialect::Inventor => {
                if self.valid_ident {
                    c.is_ascii_alphabetic() || c == b'_'
                } else {
                    c > 0x20
                }
            }
            Dialect::Vrml1 => {
                if c <= 0x20 || c.is_ascii_digit() {
                    return false;
                }
                let invalid = if self.valid_ident { VRML1_IDENT_INVALID } else { VRML1_INVALID };
                !invalid.contains(&c)
            }
            Dialect::Vrml2 => {
                if c <= 0x20 || c.is_ascii_digit() {
                    return false;
                }
                if !self.valid_ident && self.allow_plus_start && c == b'+' {
                    return true;
                }
                !VRML2_START_INVALID.contains(&c)
            }
        }
    }

    /// Whether `c` may continue a name.
    pub fn is_rest(&self, c: u8) -> bool {
        match self.dialect {
            Dialect::Inventor => {
                if self.valid_ident {
                    c.is_ascii_alphanumeric() || c == b'_'
                } else {
                    c > 0x20
                }
            }
            Dialect::Vrml1 => {
                if c <= 0x20 {
                    return false;
                }
                let invalid = if self.valid_ident { VRML1_IDENT_INVALID } else { VRML1_INVALID };
                !invalid.contains(&c)
            }
            Dialect::Vrml2 => c > 0x20 && !VRML2_REST_INVALID.contains(&c),
        }
    }

    /// Validate a complete name. Empty names pass; only reads reject them.
    pub fn is_valid(&self, name: &[u8]) -> bool {
        match name.split_first() {
            None => true,
            Some((&first, rest)) => self.is_start(first) && rest.iter().all(|&c| self.is_rest(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventor_rules() {
        let strict = NameRules::new(Dialect::Inventor, true);
        assert!(strict.is_valid(b"_Cube2"));
        assert!(!strict.is_valid(b"2Cube"));
        assert!(!strict.is_valid(b"Cube+1"));

        let loose = NameRules::new(Dialect::Inventor, false);
        assert!(loose.is_valid(b"2Cube+1.x"));
        assert!(!loose.is_start(b' '));
    }

    #[test]
    fn test_vrml1_rules() {
        let rules = NameRules::new(Dialect::Vrml1, false);
        assert!(rules.is_valid(b"a-b&c[0]"));
        assert!(!rules.is_start(b'1'));
        assert!(rules.is_rest(b'1'));
        assert!(!rules.is_rest(b'.'));

        let ident = NameRules::new(Dialect::Vrml1, true);
        assert!(!ident.is_rest(b'&'));
        assert!(!ident.is_rest(b'['));
    }

    #[test]
    fn test_vrml2_rules() {
        let rules = NameRules::new(Dialect::Vrml2, false);
        assert!(!rules.is_start(b'+'));
        assert!(!rules.is_start(b'-'));
        assert!(rules.is_rest(b'+'));
        assert!(rules.is_rest(b'-'));
        assert!(!rules.is_rest(b'.'));
        assert!(rules.is_valid(b"Box-01+a"));
        assert!(!rules.is_start(0x7f));

        let lenient = rules.with_plus_start(true);
        assert!(lenient.is_start(b'+'));
        let ident = NameRules::new(Dialect::Vrml2, true).with_plus_start(true);
        assert!(!ident.is_start(b'+'));
    }

    #[test]
    fn test_empty_name_is_valid() {
        assert!(NameRules::new(Dialect::Vrml2, true).is_valid(b""));
    }
}
