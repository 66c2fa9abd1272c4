//! Slots shared by every distributed-lock message.
//!
//! The base occupies slots 0..[`BASE_FIELDS_COUNT`] of the concrete message
//! and writes the concrete message's header before its first slot, so all
//! lock messages start with an identical prefix.

use bytes::{Buf, BufMut};
use tracing::trace;

use crate::codec::{fill, MessageReader, MessageWriter};
use crate::error::{LockWireError, Result};
use crate::marshal::{CacheContext, CacheSharedContext};
use crate::protocol::{FieldDescriptor, Message, WireKind};

use super::{CacheVersion, CandidateList, LockCandidate};

/// Number of slots owned by the base.
pub const BASE_FIELDS_COUNT: usize = 8;

/// Base slot table. Concrete messages repeat it as the prefix of their own.
pub const BASE_FIELDS: [FieldDescriptor; BASE_FIELDS_COUNT] = [
    FieldDescriptor::new(0, "cache_id", WireKind::Int),
    FieldDescriptor::new(1, "deployment_info", WireKind::ByteArray),
    FieldDescriptor::new(2, "message_id", WireKind::Long),
    FieldDescriptor::new(3, "candidates_by_index", WireKind::Collection),
    FieldDescriptor::new(4, "committed_versions", WireKind::Collection),
    FieldDescriptor::new(5, "key_count", WireKind::Int),
    FieldDescriptor::new(6, "rolled_back_versions", WireKind::Collection),
    FieldDescriptor::new(7, "lock_version", WireKind::Message),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseField {
    CacheId,
    DeploymentInfo,
    MessageId,
    CandidatesByIndex,
    CommittedVersions,
    KeyCount,
    RolledBackVersions,
    LockVersion,
}

impl BaseField {
    const ORDER: [BaseField; BASE_FIELDS_COUNT] = [
        BaseField::CacheId,
        BaseField::DeploymentInfo,
        BaseField::MessageId,
        BaseField::CandidatesByIndex,
        BaseField::CommittedVersions,
        BaseField::KeyCount,
        BaseField::RolledBackVersions,
        BaseField::LockVersion,
    ];

    fn at(slot: usize) -> Option<Self> {
        Self::ORDER.get(slot).copied()
    }

    fn descriptor(self) -> &'static FieldDescriptor {
        &BASE_FIELDS[self as usize]
    }

    fn name(self) -> &'static str {
        self.descriptor().name
    }
}

/// Common part of lock messages: which cache, which lock attempt, how many
/// keys, and the lock candidates known for each key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockMessageBase {
    cache_id: i32,
    deployment_info: Option<Vec<u8>>,
    message_id: i64,
    candidates_by_index: Vec<CandidateList>,
    committed_versions: Vec<CacheVersion>,
    key_count: usize,
    rolled_back_versions: Vec<CacheVersion>,
    lock_version: Option<CacheVersion>,
}

impl LockMessageBase {
    /// Create a base for `key_count` keys. `key_count` must be positive.
    pub fn new(cache_id: i32, lock_version: CacheVersion, key_count: usize) -> Result<Self> {
        if key_count == 0 {
            return Err(LockWireError::Precondition(
                "key count must be greater than zero".into(),
            ));
        }
        if key_count > i32::MAX as usize {
            return Err(LockWireError::Precondition(format!(
                "key count {key_count} does not fit the wire format"
            )));
        }
        Ok(Self {
            cache_id,
            key_count,
            lock_version: Some(lock_version),
            candidates_by_index: vec![CandidateList::default(); key_count],
            ..Default::default()
        })
    }

    pub fn cache_id(&self) -> i32 {
        self.cache_id
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn lock_version(&self) -> Option<&CacheVersion> {
        self.lock_version.as_ref()
    }

    pub fn message_id(&self) -> i64 {
        self.message_id
    }

    pub fn set_message_id(&mut self, message_id: i64) {
        self.message_id = message_id;
    }

    pub fn deployment_info(&self) -> Option<&[u8]> {
        self.deployment_info.as_deref()
    }

    /// Record the lock candidates of the key at `idx`.
    pub fn set_candidates(&mut self, idx: usize, candidates: Vec<LockCandidate>) -> Result<()> {
        let key_count = self.key_count;
        let slot = self.candidates_by_index.get_mut(idx).ok_or_else(|| {
            LockWireError::Precondition(format!(
                "key index {idx} out of range for {key_count} keys"
            ))
        })?;
        *slot = CandidateList::new(candidates);
        Ok(())
    }

    /// Lock candidates of the key at `idx`.
    pub fn candidates(&self, idx: usize) -> Option<&[LockCandidate]> {
        self.candidates_by_index.get(idx).map(CandidateList::candidates)
    }

    /// Versions of transactions completed since the lock attempt started.
    pub fn completed_versions(&mut self, committed: Vec<CacheVersion>, rolled_back: Vec<CacheVersion>) {
        self.committed_versions = committed;
        self.rolled_back_versions = rolled_back;
    }

    pub fn committed_versions(&self) -> &[CacheVersion] {
        &self.committed_versions
    }

    pub fn rolled_back_versions(&self) -> &[CacheVersion] {
        &self.rolled_back_versions
    }

    /// Write the header of the concrete message, then the base slots.
    pub(crate) fn write_fields(
        &self,
        buf: &mut dyn BufMut,
        writer: &mut MessageWriter,
        direct_type: u8,
        fields_count: u8,
    ) -> Result<bool> {
        if !writer.write_header(buf, direct_type, fields_count) {
            trace!(direct_type, "Write suspended before header");
            return Ok(false);
        }
        while let Some(field) = BaseField::at(writer.state()) {
            let done = match field {
                BaseField::CacheId => writer.write_i32(buf, self.cache_id),
                BaseField::DeploymentInfo => {
                    writer.write_byte_array(buf, self.deployment_info.as_deref())?
                }
                BaseField::MessageId => writer.write_i64(buf, self.message_id),
                BaseField::CandidatesByIndex => {
                    writer.write_collection(buf, &self.candidates_by_index)?
                }
                BaseField::CommittedVersions => {
                    writer.write_collection(buf, &self.committed_versions)?
                }
                BaseField::KeyCount => writer.write_i32(buf, self.key_count as i32),
                BaseField::RolledBackVersions => {
                    writer.write_collection(buf, &self.rolled_back_versions)?
                }
                BaseField::LockVersion => writer.write_message(
                    buf,
                    self.lock_version.as_ref().map(|v| v as &dyn Message),
                )?,
            };
            if !done {
                trace!(field = field.name(), kind = ?field.descriptor().kind, "Write suspended");
                return Ok(false);
            }
            writer.increment_state();
        }
        Ok(true)
    }

    /// Read and check the header of the concrete message, then the base slots.
    pub(crate) fn read_fields(
        &mut self,
        buf: &mut dyn Buf,
        reader: &mut MessageReader,
        direct_type: u8,
        fields_count: u8,
    ) -> Result<bool> {
        if !reader.read_header(buf, direct_type, fields_count)? {
            trace!(direct_type, "Read suspended before header");
            return Ok(false);
        }
        while reader.has_remote_field() {
            let Some(field) = BaseField::at(reader.state()) else {
                break;
            };
            let done = match field {
                BaseField::CacheId => fill(&mut self.cache_id, reader.read_i32(buf)),
                BaseField::DeploymentInfo => {
                    reader.read_byte_array(buf, &mut self.deployment_info, field.name())?
                }
                BaseField::MessageId => fill(&mut self.message_id, reader.read_i64(buf)),
                BaseField::CandidatesByIndex => {
                    reader.read_collection(buf, &mut self.candidates_by_index, field.name())?
                }
                BaseField::CommittedVersions => {
                    reader.read_collection(buf, &mut self.committed_versions, field.name())?
                }
                BaseField::KeyCount => match reader.read_i32(buf) {
                    Some(count) => {
                        self.key_count = self.check_key_count(count)?;
                        true
                    }
                    None => false,
                },
                BaseField::RolledBackVersions => {
                    reader.read_collection(buf, &mut self.rolled_back_versions, field.name())?
                }
                BaseField::LockVersion => reader.read_message(buf, &mut self.lock_version)?,
            };
            if !done {
                trace!(field = field.name(), kind = ?field.descriptor().kind, "Read suspended");
                return Ok(false);
            }
            reader.increment_state();
        }
        Ok(true)
    }

    fn check_key_count(&self, count: i32) -> Result<usize> {
        if count <= 0 {
            return Err(LockWireError::InvalidLength {
                field: BaseField::KeyCount.name(),
                length: i64::from(count),
            });
        }
        let count = count as usize;
        if self.candidates_by_index.len() != count {
            return Err(LockWireError::LengthMismatch {
                field: BaseField::CandidatesByIndex.name(),
                expected: count,
                actual: self.candidates_by_index.len(),
            });
        }
        Ok(count)
    }

    /// Resolve the cache and attach the node's deployment descriptor.
    pub fn prepare_marshal<'c>(&mut self, ctx: &'c CacheSharedContext) -> Result<&'c CacheContext> {
        let cctx = ctx.cache_context(self.cache_id)?;
        if self.deployment_info.is_none() {
            self.deployment_info = ctx.deployment().map(<[u8]>::to_vec);
        }
        Ok(cctx)
    }

    /// Resolve the cache the received message belongs to.
    pub fn finish_unmarshal<'c>(&mut self, ctx: &'c CacheSharedContext) -> Result<&'c CacheContext> {
        ctx.cache_context(self.cache_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::is_valid_layout;
    use bytes::BytesMut;
    use uuid::Uuid;

    const TEST_TYPE: u8 = 200;

    fn sample() -> LockMessageBase {
        let mut base = LockMessageBase::new(7, CacheVersion::new(1, 100, 2), 2).unwrap();
        base.set_message_id(55);
        base.set_candidates(
            1,
            vec![LockCandidate::new(Uuid::from_u128(3), CacheVersion::new(1, 90, 1), 4, 0)],
        )
        .unwrap();
        base.completed_versions(vec![CacheVersion::new(1, 80, 1)], vec![]);
        base
    }

    fn encode(base: &LockMessageBase) -> BytesMut {
        let mut out = BytesMut::new();
        assert!(base
            .write_fields(&mut out, &mut MessageWriter::new(), TEST_TYPE, BASE_FIELDS_COUNT as u8)
            .unwrap());
        out
    }

    fn decode(bytes: &[u8]) -> Result<LockMessageBase> {
        let mut base = LockMessageBase::default();
        let mut input = bytes;
        let done = base.read_fields(
            &mut input,
            &mut MessageReader::new(),
            TEST_TYPE,
            BASE_FIELDS_COUNT as u8,
        )?;
        assert!(done);
        Ok(base)
    }

    #[test]
    fn test_layout() {
        assert!(is_valid_layout(&BASE_FIELDS));
        for (slot, field) in BaseField::ORDER.iter().enumerate() {
            assert_eq!(*field as usize, slot);
        }
    }

    #[test]
    fn test_slot_kinds() {
        let kind = |field: BaseField| field.descriptor().kind;
        assert_eq!(kind(BaseField::DeploymentInfo), WireKind::ByteArray);
        assert_eq!(kind(BaseField::CandidatesByIndex), WireKind::Collection);
        assert_eq!(kind(BaseField::KeyCount), WireKind::Int);
        assert_eq!(kind(BaseField::LockVersion), WireKind::Message);
    }

    #[test]
    fn test_zero_keys_rejected() {
        let err = LockMessageBase::new(1, CacheVersion::default(), 0).unwrap_err();
        assert!(matches!(err, LockWireError::Precondition(_)));
    }

    #[test]
    fn test_candidates_out_of_range() {
        let mut base = sample();
        assert!(base.set_candidates(2, vec![]).is_err());
        assert_eq!(base.candidates(0), Some(&[][..]));
        assert_eq!(base.candidates(1).map(<[_]>::len), Some(1));
        assert_eq!(base.candidates(2), None);
    }

    #[test]
    fn test_roundtrip() {
        let base = sample();
        let out = encode(&base);
        assert_eq!(&out[..2], &[TEST_TYPE, BASE_FIELDS_COUNT as u8]);
        assert_eq!(decode(&out).unwrap(), base);
    }

    #[test]
    fn test_write_resumes_on_every_boundary() {
        let base = sample();
        let expected = encode(&base);

        let mut writer = MessageWriter::new();
        let mut produced = Vec::new();
        let mut storage = [0u8; 8];
        loop {
            let mut window: &mut [u8] = &mut storage;
            let done = base
                .write_fields(&mut window, &mut writer, TEST_TYPE, BASE_FIELDS_COUNT as u8)
                .unwrap();
            let filled = 8 - window.len();
            produced.extend_from_slice(&storage[..filled]);
            if done {
                break;
            }
        }
        assert_eq!(produced, &expected[..]);
    }

    #[test]
    fn test_decode_rejects_non_positive_key_count() {
        let mut base = sample();
        base.key_count = 0;
        base.candidates_by_index.clear();
        let err = decode(&encode(&base)).unwrap_err();
        assert!(matches!(
            err,
            LockWireError::InvalidLength {
                field: "key_count",
                length: 0
            }
        ));
    }

    #[test]
    fn test_decode_rejects_candidate_count_mismatch() {
        let mut base = sample();
        base.candidates_by_index.pop();
        let err = decode(&encode(&base)).unwrap_err();
        assert!(matches!(
            err,
            LockWireError::LengthMismatch {
                field: "candidates_by_index",
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_prepare_marshal_attaches_deployment() {
        let mut ctx = CacheSharedContext::new().with_deployment(vec![9, 9]);
        ctx.register_cache(7, "accounts");

        let mut base = sample();
        let cctx = base.prepare_marshal(&ctx).unwrap();
        assert_eq!(cctx.name(), "accounts");
        assert_eq!(base.deployment_info(), Some(&[9u8, 9][..]));

        let decoded = decode(&encode(&base)).unwrap();
        assert_eq!(decoded.deployment_info(), Some(&[9u8, 9][..]));
    }

    #[test]
    fn test_prepare_marshal_unknown_cache() {
        let ctx = CacheSharedContext::new();
        let err = sample().prepare_marshal(&ctx).unwrap_err();
        assert!(matches!(err, LockWireError::UnknownCache(7)));
    }
}
