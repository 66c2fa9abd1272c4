//! Codec and driver configuration.
//!
//! Both structs deserialize from JSON with every field optional:
//!
//! ```
//! use lockwire::config::CodecConfig;
//!
//! let config = CodecConfig::from_json(r#"{ "max_collection_len": 16 }"#).unwrap();
//! assert_eq!(config.max_collection_len, 16);
//! assert_eq!(config.max_array_len, lockwire::config::DEFAULT_MAX_ARRAY_LEN);
//! ```

use serde::Deserialize;

use crate::error::{LockWireError, Result};

/// Default limit on the element count of a decoded collection.
pub const DEFAULT_MAX_COLLECTION_LEN: usize = 1 << 20;

/// Default limit on the length of a decoded byte or boolean array (64 MB).
pub const DEFAULT_MAX_ARRAY_LEN: usize = 64 * 1024 * 1024;

/// Default size of the scratch buffer the stream driver encodes into.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Largest wire unit that is never split across buffers (an i64).
pub const MIN_CHUNK_SIZE: usize = 8;

/// Decode limits applied by [`MessageReader`](crate::codec::MessageReader).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Largest accepted collection length prefix.
    pub max_collection_len: usize,
    /// Largest accepted array length prefix.
    pub max_array_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            max_array_len: DEFAULT_MAX_ARRAY_LEN,
        }
    }
}

impl CodecConfig {
    /// Parse a config from JSON, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Settings for [`MessageStream`](crate::transport::MessageStream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Capacity of each outbound chunk handed to `write_to`.
    pub chunk_size: usize,
    /// Limits used when decoding inbound messages.
    pub codec: CodecConfig,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            codec: CodecConfig::default(),
        }
    }
}

impl StreamConfig {
    /// Parse a config from JSON, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the chunk can hold the largest atomic wire unit.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(LockWireError::ChunkTooSmall(self.chunk_size, MIN_CHUNK_SIZE));
        }
        Ok(())
    }
}
