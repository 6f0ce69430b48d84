//! Read and write options, plus the environment switches that seed them.

use crate::source::CompressionMethod;
use serde::{Deserialize, Serialize};

/// Default size of one read-ahead block.
pub const DEFAULT_BLOCK_SIZE: usize = 128 * 1024;

/// Whether names inside a template body can see the enclosing scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemplateLookup {
    /// Template bodies only see their own names.
    #[default]
    Isolated,
    /// Failed lookups fall through to the enclosing scope.
    FallThrough,
}

/// Process-level switches normally taken from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvSwitches {
    /// `IVIO_SEARCH_GLOBAL_DICT`: consult the process-wide dictionary
    /// when a name is not defined in the session.
    pub search_global_dict: bool,
    /// `IVIO_NOT_STRICT_VRML97`: accept `+` as the first character of a
    /// VRML2 name.
    pub not_strict_vrml97: bool,
    /// `IVIO_DONT_MANGLE_OUTPUT_NAMES`: keep DEF names without instance
    /// suffixes where possible.
    pub dont_mangle_output_names: bool,
}

impl EnvSwitches {
    /// Read the switches from the process environment.
    pub fn from_env() -> Self {
        Self {
            search_global_dict: env_flag("IVIO_SEARCH_GLOBAL_DICT"),
            not_strict_vrml97: env_flag("IVIO_NOT_STRICT_VRML97"),
            dont_mangle_output_names: env_flag("IVIO_DONT_MANGLE_OUTPUT_NAMES"),
        }
    }
}

/// A switch is on when the variable holds a positive integer.
fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map_or(false, |v| v > 0)
}

/// Options for input sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Fill the next read-ahead block on a background thread.
    pub prefetch: bool,
    /// Size of one read-ahead block in bytes.
    pub block_size: usize,
    /// Fall back to the process-wide dictionary on failed lookups.
    pub search_global_dictionary: bool,
    /// Reject `+` as a VRML2 name start character.
    pub strict_vrml2_names: bool,
    /// Name visibility inside template bodies.
    pub template_lookup: TemplateLookup,
    /// Mode assumed for streams without a header line.
    pub headerless_binary: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadOptions {
    /// Create default read options.
    pub fn new() -> Self {
        Self {
            prefetch: false,
            block_size: DEFAULT_BLOCK_SIZE,
            search_global_dictionary: false,
            strict_vrml2_names: true,
            template_lookup: TemplateLookup::Isolated,
            headerless_binary: false,
        }
    }

    /// Default options adjusted by environment switches.
    pub fn from_switches(switches: &EnvSwitches) -> Self {
        Self {
            search_global_dictionary: switches.search_global_dict,
            strict_vrml2_names: !switches.not_strict_vrml97,
            ..Self::new()
        }
    }

    /// Enable background read-ahead.
    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Set the read-ahead block size. Zero is bumped to one byte.
    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size.max(1);
        self
    }

    /// Enable the process-wide dictionary fallback.
    pub fn with_global_dictionary(mut self, enabled: bool) -> Self {
        self.search_global_dictionary = enabled;
        self
    }

    /// Assume binary mode for streams without a header line.
    pub fn with_headerless_binary(mut self, binary: bool) -> Self {
        self.headerless_binary = binary;
        self
    }

    /// Set template name visibility.
    pub fn with_template_lookup(mut self, lookup: TemplateLookup) -> Self {
        self.template_lookup = lookup;
        self
    }
}

/// Options for output sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Write the binary encoding.
    pub binary: bool,
    /// Header line to use instead of the default for the mode.
    pub header: Option<String>,
    /// Significant digits for `f32` values; doubles use twice as many.
    /// The maximum, 8, writes every value so it reads back exactly.
    pub float_precision: u8,
    /// Compression applied to file output.
    pub compression: CompressionMethod,
    /// Compression level between 0.0 and 1.0.
    pub compression_level: f32,
    /// Skip indentation.
    pub compact: bool,
    /// Keep DEF names without instance suffixes where possible.
    pub dont_mangle_names: bool,
    /// Separator between a name and its instance number.
    pub instance_prefix: String,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteOptions {
    /// Create default write options.
    pub fn new() -> Self {
        Self {
            binary: false,
            header: None,
            float_precision: 8,
            compression: CompressionMethod::None,
            compression_level: 0.5,
            compact: false,
            dont_mangle_names: false,
            instance_prefix: "+".to_string(),
        }
    }

    /// Default options adjusted by environment switches.
    pub fn from_switches(switches: &EnvSwitches) -> Self {
        Self {
            dont_mangle_names: switches.dont_mangle_output_names,
            ..Self::new()
        }
    }

    /// Use binary format.
    pub fn binary(mut self) -> Self {
        self.binary = true;
        self
    }

    /// Use a custom header line.
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Set float precision, clamped to 0..=8.
    pub fn with_float_precision(mut self, precision: u8) -> Self {
        self.float_precision = precision.min(8);
        self
    }

    /// Compress file output.
    pub fn compressed(mut self, method: CompressionMethod, level: f32) -> Self {
        self.compression = method;
        self.compression_level = level.clamp(0.0, 1.0);
        self
    }

    /// Skip indentation.
    pub fn compact(mut self) -> Self {
        self.compact = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_defaults() {
        let opts = ReadOptions::default();
        assert_eq!(opts.block_size, 131072);
        assert!(!opts.prefetch);
        assert!(opts.strict_vrml2_names);
        assert_eq!(opts.template_lookup, TemplateLookup::Isolated);
    }

    #[test]
    fn test_switches_feed_options() {
        let switches = EnvSwitches {
            search_global_dict: true,
            not_strict_vrml97: true,
            dont_mangle_output_names: true,
        };
        let read = ReadOptions::from_switches(&switches);
        assert!(read.search_global_dictionary);
        assert!(!read.strict_vrml2_names);
        let write = WriteOptions::from_switches(&switches);
        assert!(write.dont_mangle_names);
    }

    #[test]
    fn test_write_builders_clamp() {
        let opts = WriteOptions::new()
            .with_float_precision(12)
            .compressed(CompressionMethod::Gzip, 3.0);
        assert_eq!(opts.float_precision, 8);
        assert_eq!(opts.compression_level, 1.0);
        assert_eq!(opts.instance_prefix, "+");
    }

    #[test]
    fn test_block_size_floor() {
        assert_eq!(ReadOptions::new().with_block_size(0).block_size, 1);
    }
}
