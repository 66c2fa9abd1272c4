//! Codec module - resumable field encoding and decoding.
//!
//! - [`primitive`] - fixed-width values that are written whole or not at all
//! - [`MessageWriter`] / [`MessageReader`] - per-message cursors that let a
//!   message be spread over any number of buffers
//! - [`MsgPackCodec`] - turns key objects into bytes before they are written
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use lockwire::codec::{MessageReader, MessageWriter};
//! use lockwire::message::CacheVersion;
//! use lockwire::protocol::Message;
//!
//! let version = CacheVersion::new(4, 1001, 2);
//!
//! let mut out = BytesMut::new();
//! assert!(version.write_to(&mut out, &mut MessageWriter::new()).unwrap());
//!
//! let mut decoded = CacheVersion::default();
//! let mut input: &[u8] = &out;
//! assert!(decoded.read_from(&mut input, &mut MessageReader::new()).unwrap());
//! assert_eq!(decoded, version);
//! ```

/// Unwrap a read result or suspend the enclosing `read_from` with `Ok(false)`.
macro_rules! ready {
    ($e:expr) => {
        match $e {
            Some(value) => value,
            None => return Ok(false),
        }
    };
}

pub(crate) use ready;

/// Store a completed read into `target`; `false` if the value is still pending.
#[inline]
pub(crate) fn fill<T>(target: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *target = value;
            true
        }
        None => false,
    }
}

pub mod primitive;

mod msgpack;
mod reader;
mod state;
mod writer;

pub use msgpack::MsgPackCodec;
pub use reader::MessageReader;
pub use writer::MessageWriter;
