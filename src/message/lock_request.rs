//! Lock request: a node asking a peer to lock a set of keys.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use lockwire::codec::{MessageReader, MessageWriter};
//! use lockwire::message::{CacheVersion, KeyCacheObject, LockRequest, TxIsolation};
//! use lockwire::protocol::{FutureId, Message};
//! use uuid::Uuid;
//!
//! let mut request = LockRequest::builder(1, Uuid::new_v4(), CacheVersion::new(1, 7, 1), 1)
//!     .future_id(FutureId::random(1))
//!     .in_tx(true)
//!     .isolation(TxIsolation::Serializable)
//!     .build()
//!     .unwrap();
//! request
//!     .add_key(KeyCacheObject::from_bytes(vec![1, 2, 3]), true, None)
//!     .unwrap();
//!
//! let mut out = BytesMut::new();
//! assert!(request.write_to(&mut out, &mut MessageWriter::new()).unwrap());
//!
//! let mut decoded = LockRequest::default();
//! let mut input: &[u8] = &out;
//! assert!(decoded.read_from(&mut input, &mut MessageReader::new()).unwrap());
//! assert_eq!(decoded, request);
//! ```

use bytes::{Buf, BufMut};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::codec::{fill, MessageReader, MessageWriter};
use crate::error::{LockWireError, Result};
use crate::marshal::{CacheMessage, CacheSharedContext, TypeResolver};
use crate::protocol::{direct_type, FieldDescriptor, FutureId, Message, WireKind};

use super::base::{LockMessageBase, BASE_FIELDS_COUNT};
use super::{CacheVersion, KeyCacheObject, LockCandidate, TxIsolation, TxKey};

/// Bits of the request flags byte.
pub mod request_flags {
    /// Bypass the persistent store when loading locked values.
    pub const SKIP_STORE: u8 = 0b0000_0001;

    /// All bits this version understands.
    pub const KNOWN: u8 = SKIP_STORE;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Full slot table of [`LockRequest`]: the base slots, then its own.
pub const LOCK_REQUEST_FIELDS: [FieldDescriptor; 23] = [
    FieldDescriptor::new(0, "cache_id", WireKind::Int),
    FieldDescriptor::new(1, "deployment_info", WireKind::ByteArray),
    FieldDescriptor::new(2, "message_id", WireKind::Long),
    FieldDescriptor::new(3, "candidates_by_index", WireKind::Collection),
    FieldDescriptor::new(4, "committed_versions", WireKind::Collection),
    FieldDescriptor::new(5, "key_count", WireKind::Int),
    FieldDescriptor::new(6, "rolled_back_versions", WireKind::Collection),
    FieldDescriptor::new(7, "lock_version", WireKind::Message),
    FieldDescriptor::new(8, "flags", WireKind::Byte),
    FieldDescriptor::new(9, "future_id", WireKind::FutureId),
    FieldDescriptor::new(10, "group_lock_key", WireKind::Message),
    FieldDescriptor::new(11, "in_tx", WireKind::Bool),
    FieldDescriptor::new(12, "invalidate", WireKind::Bool),
    FieldDescriptor::new(13, "read", WireKind::Bool),
    FieldDescriptor::new(14, "isolation", WireKind::NullableOrdinal),
    FieldDescriptor::new(15, "keys", WireKind::Collection),
    FieldDescriptor::new(16, "near_xid_version", WireKind::Message),
    FieldDescriptor::new(17, "node_id", WireKind::Uuid),
    FieldDescriptor::new(18, "partition_lock", WireKind::Bool),
    FieldDescriptor::new(19, "return_values", WireKind::BoolArray),
    FieldDescriptor::new(20, "thread_id", WireKind::Long),
    FieldDescriptor::new(21, "timeout", WireKind::Long),
    FieldDescriptor::new(22, "tx_size", WireKind::Int),
];

/// Own slots of the request, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestField {
    Flags,
    FutureId,
    GroupLockKey,
    InTx,
    Invalidate,
    Read,
    Isolation,
    Keys,
    NearXidVersion,
    NodeId,
    PartitionLock,
    ReturnValues,
    ThreadId,
    Timeout,
    TxSize,
}

impl RequestField {
    const ORDER: [RequestField; 15] = [
        RequestField::Flags,
        RequestField::FutureId,
        RequestField::GroupLockKey,
        RequestField::InTx,
        RequestField::Invalidate,
        RequestField::Read,
        RequestField::Isolation,
        RequestField::Keys,
        RequestField::NearXidVersion,
        RequestField::NodeId,
        RequestField::PartitionLock,
        RequestField::ReturnValues,
        RequestField::ThreadId,
        RequestField::Timeout,
        RequestField::TxSize,
    ];

    fn at(slot: usize) -> Option<Self> {
        slot.checked_sub(BASE_FIELDS_COUNT)
            .and_then(|i| Self::ORDER.get(i).copied())
    }

    fn slot(self) -> usize {
        BASE_FIELDS_COUNT + self as usize
    }

    fn descriptor(self) -> &'static FieldDescriptor {
        &LOCK_REQUEST_FIELDS[self.slot()]
    }

    fn name(self) -> &'static str {
        self.descriptor().name
    }
}

/// Request to acquire locks on `key_count` keys, optionally inside a
/// transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockRequest {
    base: LockMessageBase,
    node_id: Option<Uuid>,
    near_xid_version: Option<CacheVersion>,
    thread_id: i64,
    future_id: FutureId,
    timeout: i64,
    in_tx: bool,
    invalidate: bool,
    read: bool,
    isolation: Option<TxIsolation>,
    keys: Vec<KeyCacheObject>,
    return_values: Vec<bool>,
    tx_size: i32,
    group_lock_key: Option<TxKey>,
    partition_lock: bool,
    skip_store: bool,
}

impl LockRequest {
    /// Start building a request from `node_id` for `key_count` keys.
    pub fn builder(cache_id: i32, node_id: Uuid, lock_version: CacheVersion, key_count: usize) -> LockRequestBuilder {
        LockRequestBuilder::new(cache_id, node_id, lock_version, key_count)
    }

    /// Append the next key, whether its previous value should be returned,
    /// and the lock candidates already known for it.
    pub fn add_key(&mut self, key: KeyCacheObject, ret_val: bool, candidates: Option<Vec<LockCandidate>>) -> Result<()> {
        let idx = self.keys.len();
        if idx >= self.base.key_count() {
            return Err(LockWireError::Precondition(format!(
                "request already holds all {} keys",
                self.base.key_count()
            )));
        }
        if let Some(candidates) = candidates {
            self.base.set_candidates(idx, candidates)?;
        }
        self.keys.push(key);
        self.return_values.push(ret_val);
        Ok(())
    }

    pub fn base(&self) -> &LockMessageBase {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut LockMessageBase {
        &mut self.base
    }

    pub fn node_id(&self) -> Option<Uuid> {
        self.node_id
    }

    /// Version of the enclosing near transaction, if any.
    pub fn near_xid_version(&self) -> Option<&CacheVersion> {
        self.near_xid_version.as_ref()
    }

    pub fn thread_id(&self) -> i64 {
        self.thread_id
    }

    pub fn future_id(&self) -> FutureId {
        self.future_id
    }

    pub fn in_tx(&self) -> bool {
        self.in_tx
    }

    pub fn is_invalidate(&self) -> bool {
        self.invalidate
    }

    pub fn tx_read(&self) -> bool {
        self.read
    }

    /// Whether the previous value of the key at `idx` should be returned.
    pub fn return_value(&self, idx: usize) -> Option<bool> {
        self.return_values.get(idx).copied()
    }

    pub fn return_flags(&self) -> &[bool] {
        &self.return_values
    }

    pub fn skip_store(&self) -> bool {
        self.skip_store
    }

    /// Set only for in-transaction requests.
    pub fn isolation(&self) -> Option<TxIsolation> {
        self.isolation
    }

    /// Expected number of entries in the transaction.
    pub fn tx_size(&self) -> i32 {
        self.tx_size
    }

    pub fn keys(&self) -> &[KeyCacheObject] {
        &self.keys
    }

    pub fn group_lock(&self) -> bool {
        self.group_lock_key.is_some()
    }

    pub fn group_lock_key(&self) -> Option<&TxKey> {
        self.group_lock_key.as_ref()
    }

    /// Whether the whole partition is locked. Always `false` outside a
    /// group-lock transaction.
    pub fn partition_lock(&self) -> bool {
        self.group_lock() && self.partition_lock
    }

    /// Max lock wait time in milliseconds; `0` waits forever.
    pub fn timeout(&self) -> i64 {
        self.timeout
    }

    fn flags(&self) -> u8 {
        if self.skip_store {
            request_flags::SKIP_STORE
        } else {
            0
        }
    }

    fn set_flags(&mut self, flags: u8) {
        let unknown = flags & !request_flags::KNOWN;
        if unknown != 0 {
            warn!(flags, unknown, "Dropping unknown request flag bits");
        }
        self.skip_store = request_flags::has_flag(flags, request_flags::SKIP_STORE);
    }

    /// Check a slot that has just been read completely.
    fn validate(&mut self, field: RequestField) -> Result<()> {
        if field == RequestField::Isolation {
            match (self.in_tx, self.isolation) {
                (false, Some(level)) => {
                    warn!(?level, "Ignoring isolation of a non-transactional lock request");
                    self.isolation = None;
                }
                (true, None) => return Err(LockWireError::MissingField(field.name())),
                _ => {}
            }
        }
        Ok(())
    }

    /// Check the decoded request as a whole once the reader has run out of
    /// slots. `slots_read` is the number of slots the remote writer sent
    /// that this reader knows.
    fn check_complete(&self, slots_read: usize) -> Result<()> {
        if self.base.key_count() == 0 {
            return Err(LockWireError::MissingField("key_count"));
        }
        if slots_read <= RequestField::FutureId.slot() {
            return Err(LockWireError::MissingField(RequestField::FutureId.name()));
        }
        if self.in_tx && slots_read <= RequestField::Isolation.slot() {
            return Err(LockWireError::MissingField(RequestField::Isolation.name()));
        }
        self.check_len(RequestField::Keys, self.keys.len())?;
        self.check_len(RequestField::ReturnValues, self.return_values.len())
    }

    /// Every key slot must be filled before the request is encoded.
    fn check_keys(&self) -> Result<()> {
        let key_count = self.base.key_count();
        if self.keys.len() != key_count || self.return_values.len() != key_count {
            return Err(LockWireError::Precondition(format!(
                "{} of {} keys added",
                self.keys.len(),
                key_count
            )));
        }
        Ok(())
    }

    fn check_len(&self, field: RequestField, actual: usize) -> Result<()> {
        let expected = self.base.key_count();
        if actual != expected {
            return Err(LockWireError::LengthMismatch {
                field: field.name(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

impl Message for LockRequest {
    fn direct_type(&self) -> u8 {
        direct_type::LOCK_REQUEST
    }

    fn fields(&self) -> &'static [FieldDescriptor] {
        &LOCK_REQUEST_FIELDS
    }

    fn write_to(&self, buf: &mut dyn BufMut, writer: &mut MessageWriter) -> Result<bool> {
        if writer.state() == 0 && !writer.is_header_written() {
            self.check_keys()?;
        }
        if !self
            .base
            .write_fields(buf, writer, self.direct_type(), self.fields_count())?
        {
            return Ok(false);
        }
        while let Some(field) = RequestField::at(writer.state()) {
            let done = match field {
                RequestField::Flags => writer.write_u8(buf, self.flags()),
                RequestField::FutureId => writer.write_future_id(buf, Some(self.future_id)),
                RequestField::GroupLockKey => writer.write_message(
                    buf,
                    self.group_lock_key.as_ref().map(|k| k as &dyn Message),
                )?,
                RequestField::InTx => writer.write_bool(buf, self.in_tx),
                RequestField::Invalidate => writer.write_bool(buf, self.invalidate),
                RequestField::Read => writer.write_bool(buf, self.read),
                RequestField::Isolation => {
                    writer.write_ordinal(buf, self.isolation.map(TxIsolation::ordinal))
                }
                RequestField::Keys => writer.write_collection(buf, &self.keys)?,
                RequestField::NearXidVersion => writer.write_message(
                    buf,
                    self.near_xid_version.as_ref().map(|v| v as &dyn Message),
                )?,
                RequestField::NodeId => writer.write_uuid(buf, self.node_id),
                RequestField::PartitionLock => writer.write_bool(buf, self.partition_lock),
                RequestField::ReturnValues => writer.write_bool_array(buf, &self.return_values)?,
                RequestField::ThreadId => writer.write_i64(buf, self.thread_id),
                RequestField::Timeout => writer.write_i64(buf, self.timeout),
                RequestField::TxSize => writer.write_i32(buf, self.tx_size),
            };
            if !done {
                trace!(field = field.name(), kind = ?field.descriptor().kind, "Write suspended");
                return Ok(false);
            }
            writer.increment_state();
        }
        Ok(true)
    }

    fn read_from(&mut self, buf: &mut dyn Buf, reader: &mut MessageReader) -> Result<bool> {
        let (direct_type, fields_count) = (self.direct_type(), self.fields_count());
        if !self.base.read_fields(buf, reader, direct_type, fields_count)? {
            return Ok(false);
        }
        while reader.has_remote_field() {
            let Some(field) = RequestField::at(reader.state()) else {
                break;
            };
            let done = match field {
                RequestField::Flags => match reader.read_u8(buf) {
                    Some(flags) => {
                        self.set_flags(flags);
                        true
                    }
                    None => false,
                },
                RequestField::FutureId => match reader.read_future_id(buf) {
                    Some(id) => {
                        self.future_id = id.ok_or(LockWireError::MissingField(field.name()))?;
                        true
                    }
                    None => false,
                },
                RequestField::GroupLockKey => reader.read_message(buf, &mut self.group_lock_key)?,
                RequestField::InTx => fill(&mut self.in_tx, reader.read_bool(buf)),
                RequestField::Invalidate => fill(&mut self.invalidate, reader.read_bool(buf)),
                RequestField::Read => fill(&mut self.read, reader.read_bool(buf)),
                RequestField::Isolation => match reader.read_ordinal(buf) {
                    Some(ordinal) => {
                        self.isolation = TxIsolation::from_ordinal(ordinal)?;
                        true
                    }
                    None => false,
                },
                RequestField::Keys => reader.read_collection(buf, &mut self.keys, field.name())?,
                RequestField::NearXidVersion => {
                    reader.read_message(buf, &mut self.near_xid_version)?
                }
                RequestField::NodeId => fill(&mut self.node_id, reader.read_uuid(buf)),
                RequestField::PartitionLock => {
                    fill(&mut self.partition_lock, reader.read_bool(buf))
                }
                RequestField::ReturnValues => {
                    reader.read_bool_array(buf, &mut self.return_values, field.name())?
                }
                RequestField::ThreadId => fill(&mut self.thread_id, reader.read_i64(buf)),
                RequestField::Timeout => fill(&mut self.timeout, reader.read_i64(buf)),
                RequestField::TxSize => fill(&mut self.tx_size, reader.read_i32(buf)),
            };
            if !done {
                trace!(field = field.name(), kind = ?field.descriptor().kind, "Read suspended");
                return Ok(false);
            }
            self.validate(field)?;
            reader.increment_state();
        }
        self.check_complete(reader.state())?;
        Ok(true)
    }
}

impl CacheMessage for LockRequest {
    fn cache_id(&self) -> i32 {
        self.base.cache_id()
    }

    fn prepare_marshal(&mut self, ctx: &CacheSharedContext) -> Result<()> {
        self.check_keys()?;
        let cctx = self.base.prepare_marshal(ctx)?;
        for key in &mut self.keys {
            key.prepare_marshal(cctx)?;
        }
        if let Some(key) = &mut self.group_lock_key {
            key.prepare_marshal(cctx)?;
        }
        Ok(())
    }

    fn finish_unmarshal(&mut self, ctx: &CacheSharedContext, resolver: &dyn TypeResolver) -> Result<()> {
        let cctx = self.base.finish_unmarshal(ctx)?;
        for key in &mut self.keys {
            key.finish_unmarshal(cctx, resolver)?;
        }
        if let Some(key) = &mut self.group_lock_key {
            key.finish_unmarshal(cctx, resolver)?;
        }
        Ok(())
    }
}

/// Builder for [`LockRequest`]. `build` checks the construction invariants.
#[derive(Debug, Clone)]
pub struct LockRequestBuilder {
    cache_id: i32,
    lock_version: CacheVersion,
    key_count: usize,
    message_id: i64,
    future_id: Option<FutureId>,
    request: LockRequest,
}

impl LockRequestBuilder {
    fn new(cache_id: i32, node_id: Uuid, lock_version: CacheVersion, key_count: usize) -> Self {
        Self {
            cache_id,
            lock_version,
            key_count,
            message_id: 0,
            future_id: None,
            request: LockRequest {
                node_id: Some(node_id),
                ..Default::default()
            },
        }
    }

    pub fn future_id(mut self, future_id: FutureId) -> Self {
        self.future_id = Some(future_id);
        self
    }

    pub fn message_id(mut self, message_id: i64) -> Self {
        self.message_id = message_id;
        self
    }

    pub fn near_xid_version(mut self, version: CacheVersion) -> Self {
        self.request.near_xid_version = Some(version);
        self
    }

    pub fn thread_id(mut self, thread_id: i64) -> Self {
        self.request.thread_id = thread_id;
        self
    }

    pub fn timeout(mut self, timeout: i64) -> Self {
        self.request.timeout = timeout;
        self
    }

    pub fn in_tx(mut self, in_tx: bool) -> Self {
        self.request.in_tx = in_tx;
        self
    }

    pub fn isolation(mut self, isolation: TxIsolation) -> Self {
        self.request.isolation = Some(isolation);
        self
    }

    pub fn invalidate(mut self, invalidate: bool) -> Self {
        self.request.invalidate = invalidate;
        self
    }

    pub fn read(mut self, read: bool) -> Self {
        self.request.read = read;
        self
    }

    pub fn tx_size(mut self, tx_size: i32) -> Self {
        self.request.tx_size = tx_size;
        self
    }

    pub fn group_lock_key(mut self, key: TxKey) -> Self {
        self.request.group_lock_key = Some(key);
        self
    }

    pub fn partition_lock(mut self, partition_lock: bool) -> Self {
        self.request.partition_lock = partition_lock;
        self
    }

    pub fn skip_store(mut self, skip_store: bool) -> Self {
        self.request.skip_store = skip_store;
        self
    }

    pub fn build(self) -> Result<LockRequest> {
        let mut request = self.request;
        request.future_id = self.future_id.ok_or_else(|| {
            LockWireError::Precondition("future id is required".into())
        })?;
        match (request.in_tx, request.isolation) {
            (true, None) => {
                return Err(LockWireError::Precondition(
                    "in-transaction request needs an isolation level".into(),
                ))
            }
            (false, Some(_)) => {
                return Err(LockWireError::Precondition(
                    "isolation level set on a non-transactional request".into(),
                ))
            }
            _ => {}
        }
        request.base = LockMessageBase::new(self.cache_id, self.lock_version, self.key_count)?;
        request.base.set_message_id(self.message_id);
        request.keys.reserve(self.key_count);
        request.return_values.reserve(self.key_count);
        Ok(request)
    }
}
