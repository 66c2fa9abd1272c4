//! Error types for lockwire.

use thiserror::Error;

/// Main error type for all lockwire operations.
///
/// Running out of buffer space is never an error: `write_to`/`read_from`
/// report it by returning `Ok(false)`.
#[derive(Debug, Error)]
pub enum LockWireError {
    /// A message was constructed with arguments that violate its invariants.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// The direct type on the wire does not match the message being read.
    #[error("Unexpected direct type {actual} (expected {expected})")]
    UnexpectedDirectType { expected: u8, actual: u8 },

    /// An enum ordinal with no corresponding value.
    #[error("Invalid ordinal {value} for field '{field}'")]
    InvalidOrdinal { field: &'static str, value: i8 },

    /// A length prefix that is negative or exceeds the configured limit.
    #[error("Invalid length {length} for field '{field}'")]
    InvalidLength { field: &'static str, length: i64 },

    /// A field that must be present was sent as absent.
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),

    /// A decoded length disagrees with the declared key count.
    #[error("Length mismatch for field '{field}': expected {expected}, got {actual}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A nested message announced slots this reader does not know. Their
    /// size is unknown, so the bytes of the enclosing message cannot be found.
    #[error("Nested message type {direct_type} has {remote} fields, only {local} are known")]
    UnknownNestedFields { direct_type: u8, remote: u8, local: u8 },

    /// An array or collection is too long for its i32 length prefix.
    #[error("Length {0} does not fit the wire format")]
    LengthOverflow(usize),

    /// No cache context is registered for the cache id.
    #[error("Unknown cache id: {0}")]
    UnknownCache(i32),

    /// A key type name could not be resolved on the receiving side.
    #[error("Failed to resolve key type: {0}")]
    UnresolvedType(String),

    /// A key was written before `prepare_marshal` produced its bytes.
    #[error("Key has not been marshalled")]
    KeyNotMarshalled,

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// JSON configuration error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error in the stream driver.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection in the middle of a message.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The driver chunk cannot hold the largest atomic wire unit.
    #[error("Chunk size {0} is smaller than the minimum of {1} bytes")]
    ChunkTooSmall(usize, usize),
}

impl LockWireError {
    /// True for errors caused by corrupt or incompatible bytes on the wire.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedDirectType { .. }
                | Self::InvalidOrdinal { .. }
                | Self::InvalidLength { .. }
                | Self::LengthMismatch { .. }
                | Self::MissingField(_)
                | Self::UnknownNestedFields { .. }
        )
    }

    /// True for failures of the marshal/unmarshal hooks.
    pub fn is_marshal_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownCache(_)
                | Self::UnresolvedType(_)
                | Self::KeyNotMarshalled
                | Self::MsgPackEncode(_)
                | Self::MsgPackDecode(_)
        )
    }
}

/// Result type alias using LockWireError.
pub type Result<T> = std::result::Result<T, LockWireError>;
