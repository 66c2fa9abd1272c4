//! MsgPack codec using `rmp-serde`.
//!
//! Key objects carry a structured [`KeyValue`](crate::message::KeyValue)
//! until `prepare_marshal` turns them into the bytes that go on the wire.
//! Structs are encoded with `to_vec_named` (struct-as-map) so a reader built
//! with extra or reordered fields still decodes them.
//!
//! # Example
//!
//! ```
//! use lockwire::codec::MsgPackCodec;
//! use lockwire::message::KeyValue;
//!
//! let key = KeyValue::Str("account-17".to_string());
//! let encoded = MsgPackCodec::encode(&key).unwrap();
//! let decoded: KeyValue = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, key);
//! ```

use crate::error::Result;

/// MessagePack codec for key values.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes (struct-as-map format).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
