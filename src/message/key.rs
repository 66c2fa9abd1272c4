//! Cache keys and transaction keys.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::codec::{ready, MessageReader, MessageWriter, MsgPackCodec};
use crate::error::{LockWireError, Result};
use crate::marshal::{CacheContext, TypeResolver};
use crate::protocol::{direct_type, FieldDescriptor, Message, WireKind};

const KEY_FIELDS: [FieldDescriptor; 1] = [FieldDescriptor::new(0, "bytes", WireKind::ByteArray)];

const TX_KEY_FIELDS: [FieldDescriptor; 2] = [
    FieldDescriptor::new(0, "cache_id", WireKind::Int),
    FieldDescriptor::new(1, "key", WireKind::Message),
];

/// Structured key as seen by the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyValue {
    Int(i64),
    Str(String),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    /// User-defined key type; the receiver must know `type_name`.
    Composite {
        type_name: String,
        fields: BTreeMap<String, KeyValue>,
    },
}

impl KeyValue {
    /// Visit every composite type name, nested ones included.
    fn for_each_type<'a>(&'a self, f: &mut dyn FnMut(&'a str) -> Result<()>) -> Result<()> {
        if let KeyValue::Composite { type_name, fields } = self {
            f(type_name)?;
            for value in fields.values() {
                value.for_each_type(f)?;
            }
        }
        Ok(())
    }
}

/// A key to lock: its value on the sending side, its bytes on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyCacheObject {
    value: Option<KeyValue>,
    bytes: Option<Vec<u8>>,
}

impl KeyCacheObject {
    pub fn new(value: KeyValue) -> Self {
        Self {
            value: Some(value),
            bytes: None,
        }
    }

    /// Key that is already in wire form.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            value: None,
            bytes: Some(bytes),
        }
    }

    pub fn value(&self) -> Option<&KeyValue> {
        self.value.as_ref()
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Serialize the value unless bytes are already present.
    pub fn prepare_marshal(&mut self, cctx: &CacheContext) -> Result<()> {
        if self.bytes.is_some() {
            return Ok(());
        }
        let value = self.value.as_ref().ok_or(LockWireError::KeyNotMarshalled)?;
        let bytes = MsgPackCodec::encode(value)?;
        trace!(cache = cctx.name(), len = bytes.len(), "Marshalled key");
        self.bytes = Some(bytes);
        Ok(())
    }

    /// Deserialize the bytes unless the value is already present.
    pub fn finish_unmarshal(&mut self, cctx: &CacheContext, resolver: &dyn TypeResolver) -> Result<()> {
        if self.value.is_some() {
            return Ok(());
        }
        let bytes = self.bytes.as_deref().ok_or(LockWireError::KeyNotMarshalled)?;
        let value: KeyValue = MsgPackCodec::decode(bytes)?;
        value.for_each_type(&mut |name| match resolver.resolve(name) {
            Some(_) => Ok(()),
            None => Err(LockWireError::UnresolvedType(name.to_string())),
        })?;
        trace!(cache = cctx.name(), "Unmarshalled key");
        self.value = Some(value);
        Ok(())
    }
}

impl Message for KeyCacheObject {
    fn direct_type(&self) -> u8 {
        direct_type::KEY_CACHE_OBJECT
    }

    fn fields(&self) -> &'static [FieldDescriptor] {
        &KEY_FIELDS
    }

    fn write_to(&self, buf: &mut dyn BufMut, writer: &mut MessageWriter) -> Result<bool> {
        let bytes = self.bytes.as_deref().ok_or(LockWireError::KeyNotMarshalled)?;
        if !writer.write_header(buf, self.direct_type(), self.fields_count()) {
            return Ok(false);
        }
        if writer.state() == 0 {
            if !writer.write_byte_array(buf, Some(bytes))? {
                return Ok(false);
            }
            writer.increment_state();
        }
        Ok(true)
    }

    fn read_from(&mut self, buf: &mut dyn Buf, reader: &mut MessageReader) -> Result<bool> {
        if !reader.read_header(buf, self.direct_type(), self.fields_count())? {
            return Ok(false);
        }
        if reader.state() == 0 && reader.has_remote_field() {
            if !reader.read_byte_array(buf, &mut self.bytes, "bytes")? {
                return Ok(false);
            }
            reader.increment_state();
        }
        Ok(true)
    }
}

/// Key qualified by the cache it lives in. Used as the group-lock key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxKey {
    cache_id: i32,
    key: KeyCacheObject,
}

impl TxKey {
    pub fn new(cache_id: i32, key: KeyCacheObject) -> Self {
        Self { cache_id, key }
    }

    pub fn cache_id(&self) -> i32 {
        self.cache_id
    }

    pub fn key(&self) -> &KeyCacheObject {
        &self.key
    }

    pub fn prepare_marshal(&mut self, cctx: &CacheContext) -> Result<()> {
        self.key.prepare_marshal(cctx)
    }

    pub fn finish_unmarshal(&mut self, cctx: &CacheContext, resolver: &dyn TypeResolver) -> Result<()> {
        self.key.finish_unmarshal(cctx, resolver)
    }
}

impl Message for TxKey {
    fn direct_type(&self) -> u8 {
        direct_type::TX_KEY
    }

    fn fields(&self) -> &'static [FieldDescriptor] {
        &TX_KEY_FIELDS
    }

    fn write_to(&self, buf: &mut dyn BufMut, writer: &mut MessageWriter) -> Result<bool> {
        if !writer.write_header(buf, self.direct_type(), self.fields_count()) {
            return Ok(false);
        }
        loop {
            let done = match writer.state() {
                0 => writer.write_i32(buf, self.cache_id),
                1 => writer.write_message(buf, Some(&self.key as &dyn Message))?,
                _ => return Ok(true),
            };
            if !done {
                return Ok(false);
            }
            writer.increment_state();
        }
    }

    fn read_from(&mut self, buf: &mut dyn Buf, reader: &mut MessageReader) -> Result<bool> {
        if !reader.read_header(buf, self.direct_type(), self.fields_count())? {
            return Ok(false);
        }
        while reader.has_remote_field() {
            match reader.state() {
                0 => self.cache_id = ready!(reader.read_i32(buf)),
                1 => {
                    if !reader.read_required_message(buf, &mut self.key)? {
                        return Ok(false);
                    }
                }
                _ => break,
            }
            reader.increment_state();
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::TypeRegistry;
    use bytes::BytesMut;

    fn cctx() -> CacheContext {
        CacheContext::new(1, "test")
    }

    fn composite(type_name: &str, inner: Option<KeyValue>) -> KeyValue {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), KeyValue::Int(1));
        if let Some(inner) = inner {
            fields.insert("inner".to_string(), inner);
        }
        KeyValue::Composite {
            type_name: type_name.to_string(),
            fields,
        }
    }

    #[test]
    fn test_write_requires_marshalled_key() {
        let key = KeyCacheObject::new(KeyValue::Int(5));
        let result = key.write_to(&mut BytesMut::new(), &mut MessageWriter::new());
        assert!(matches!(result, Err(LockWireError::KeyNotMarshalled)));
    }

    #[test]
    fn test_marshal_roundtrip() {
        let mut types = TypeRegistry::new();
        types.register("OrderKey");
        types.register("Region");

        let value = composite("OrderKey", Some(composite("Region", None)));
        let mut key = KeyCacheObject::new(value.clone());
        key.prepare_marshal(&cctx()).unwrap();

        let mut received = KeyCacheObject::from_bytes(key.bytes().unwrap().to_vec());
        received.finish_unmarshal(&cctx(), &types).unwrap();
        assert_eq!(received.value(), Some(&value));
        assert_eq!(received, key);
    }

    #[test]
    fn test_unmarshal_unknown_nested_type() {
        let mut types = TypeRegistry::new();
        types.register("OrderKey");

        let mut key = KeyCacheObject::new(composite("OrderKey", Some(composite("Region", None))));
        key.prepare_marshal(&cctx()).unwrap();

        let mut received = KeyCacheObject::from_bytes(key.bytes().unwrap().to_vec());
        let err = received.finish_unmarshal(&cctx(), &types).unwrap_err();
        assert!(matches!(err, LockWireError::UnresolvedType(ref name) if name == "Region"));
        assert_eq!(received.value(), None);
    }

    #[test]
    fn test_hooks_are_idempotent() {
        let mut key = KeyCacheObject::new(KeyValue::Str("a".into()));
        key.prepare_marshal(&cctx()).unwrap();
        let first = key.bytes().unwrap().to_vec();
        key.prepare_marshal(&cctx()).unwrap();
        assert_eq!(key.bytes().unwrap(), &first[..]);

        let types = TypeRegistry::new();
        key.finish_unmarshal(&cctx(), &types).unwrap();
        assert_eq!(key.value(), Some(&KeyValue::Str("a".into())));
    }

    #[test]
    fn test_empty_key_cannot_marshal() {
        let mut key = KeyCacheObject::default();
        assert!(key.prepare_marshal(&cctx()).unwrap_err().is_marshal_error());
    }

    #[test]
    fn test_tx_key_roundtrip_split() {
        let mut sent = TxKey::new(9, KeyCacheObject::new(KeyValue::Bytes(vec![7; 20])));
        sent.prepare_marshal(&cctx()).unwrap();

        let mut encoded = BytesMut::new();
        assert!(sent
            .write_to(&mut encoded, &mut MessageWriter::new())
            .unwrap());

        let mut decoded = TxKey::default();
        let mut reader = MessageReader::new();
        let mut consumed = 0;
        for end in (5..encoded.len()).step_by(5).chain([encoded.len()]) {
            let mut input: &[u8] = &encoded[consumed..end];
            let before = input.len();
            let done = decoded.read_from(&mut input, &mut reader).unwrap();
            consumed += before - input.len();
            if done {
                break;
            }
        }
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded.cache_id(), 9);
        assert_eq!(decoded.key().bytes(), sent.key().bytes());
    }
}
