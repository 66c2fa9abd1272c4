//! # lockwire
//!
//! Resumable binary codec for distributed lock request messages.
//!
//! A node asking its peers for locks on a set of keys encodes a
//! [`LockRequest`] into whatever buffer space the network layer has free,
//! and the peer decodes it from whatever bytes have arrived so far. Both
//! sides may run out of room in the middle of a message; the call returns
//! `Ok(false)` and the next call continues at the exact byte it stopped at.
//!
//! ## Architecture
//!
//! - **Codec** ([`codec`]): primitive encoding, per-depth progress cursors,
//!   nested messages and collections
//! - **Protocol** ([`protocol`]): the [`Message`] trait, slot tables and
//!   direct types
//! - **Messages** ([`message`]): the lock request and its nested messages
//! - **Marshalling** ([`marshal`]): key objects to bytes and back
//! - **Transport** ([`transport`]): reference async driver over tokio streams
//!
//! ## Example
//!
//! ```
//! use lockwire::codec::{MessageReader, MessageWriter};
//! use lockwire::message::{CacheVersion, KeyCacheObject, KeyValue, LockRequest};
//! use lockwire::marshal::{CacheMessage, CacheSharedContext, TypeRegistry};
//! use lockwire::protocol::{FutureId, Message};
//! use uuid::Uuid;
//!
//! let mut ctx = CacheSharedContext::new();
//! ctx.register_cache(1, "accounts");
//!
//! let mut request = LockRequest::builder(1, Uuid::new_v4(), CacheVersion::new(1, 1, 1), 1)
//!     .future_id(FutureId::random(1))
//!     .build()
//!     .unwrap();
//! request
//!     .add_key(KeyCacheObject::new(KeyValue::Str("alice".into())), false, None)
//!     .unwrap();
//! request.prepare_marshal(&ctx).unwrap();
//!
//! // Encode through a 16-byte window.
//! let mut writer = MessageWriter::new();
//! let mut wire = Vec::new();
//! let mut chunk = [0u8; 16];
//! loop {
//!     let mut window: &mut [u8] = &mut chunk;
//!     let done = request.write_to(&mut window, &mut writer).unwrap();
//!     let filled = 16 - window.len();
//!     wire.extend_from_slice(&chunk[..filled]);
//!     if done {
//!         break;
//!     }
//! }
//!
//! let mut decoded = LockRequest::default();
//! let mut input: &[u8] = &wire;
//! assert!(decoded.read_from(&mut input, &mut MessageReader::new()).unwrap());
//! decoded.finish_unmarshal(&ctx, &TypeRegistry::new()).unwrap();
//! assert_eq!(decoded.keys()[0].value(), Some(&KeyValue::Str("alice".into())));
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod marshal;
pub mod message;
pub mod protocol;
pub mod transport;

pub use codec::{MessageReader, MessageWriter};
pub use error::{LockWireError, Result};
pub use message::LockRequest;
pub use protocol::Message;
