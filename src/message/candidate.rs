//! Lock candidates recorded per key by the requesting node.

use bytes::{Buf, BufMut};
use uuid::Uuid;

use crate::codec::{ready, MessageReader, MessageWriter};
use crate::error::Result;
use crate::protocol::{direct_type, FieldDescriptor, Message, WireKind};

use super::CacheVersion;

const CANDIDATE_FIELDS: [FieldDescriptor; 4] = [
    FieldDescriptor::new(0, "flags", WireKind::Byte),
    FieldDescriptor::new(1, "node_id", WireKind::Uuid),
    FieldDescriptor::new(2, "thread_id", WireKind::Long),
    FieldDescriptor::new(3, "version", WireKind::Message),
];

const LIST_FIELDS: [FieldDescriptor; 1] = [FieldDescriptor::new(0, "candidates", WireKind::Collection)];

/// Candidate state bits.
pub mod candidate_flags {
    /// Candidate was created on the local node.
    pub const LOCAL: u8 = 0b0000_0001;
    /// Candidate currently owns the lock.
    pub const OWNER: u8 = 0b0000_0010;
    /// Candidate is ready to acquire.
    pub const READY: u8 = 0b0000_0100;
    /// Lock is re-entered by the same owner.
    pub const REENTRY: u8 = 0b0000_1000;
    /// Candidate belongs to a transaction.
    pub const TX: u8 = 0b0001_0000;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// One lock candidate: who wants the lock, from which thread, at which
/// version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockCandidate {
    node_id: Option<Uuid>,
    version: Option<CacheVersion>,
    thread_id: i64,
    flags: u8,
}

impl LockCandidate {
    pub fn new(node_id: Uuid, version: CacheVersion, thread_id: i64, flags: u8) -> Self {
        Self {
            node_id: Some(node_id),
            version: Some(version),
            thread_id,
            flags,
        }
    }

    pub fn node_id(&self) -> Option<Uuid> {
        self.node_id
    }

    pub fn version(&self) -> Option<&CacheVersion> {
        self.version.as_ref()
    }

    pub fn thread_id(&self) -> i64 {
        self.thread_id
    }

    pub fn is_owner(&self) -> bool {
        candidate_flags::has_flag(self.flags, candidate_flags::OWNER)
    }

    pub fn is_local(&self) -> bool {
        candidate_flags::has_flag(self.flags, candidate_flags::LOCAL)
    }

    pub fn is_reentry(&self) -> bool {
        candidate_flags::has_flag(self.flags, candidate_flags::REENTRY)
    }
}

impl Message for LockCandidate {
    fn direct_type(&self) -> u8 {
        direct_type::LOCK_CANDIDATE
    }

    fn fields(&self) -> &'static [FieldDescriptor] {
        &CANDIDATE_FIELDS
    }

    fn write_to(&self, buf: &mut dyn BufMut, writer: &mut MessageWriter) -> Result<bool> {
        if !writer.write_header(buf, self.direct_type(), self.fields_count()) {
            return Ok(false);
        }
        loop {
            let done = match writer.state() {
                0 => writer.write_u8(buf, self.flags),
                1 => writer.write_uuid(buf, self.node_id),
                2 => writer.write_i64(buf, self.thread_id),
                3 => writer.write_message(buf, self.version.as_ref().map(|v| v as &dyn Message))?,
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
                0 => self.flags = ready!(reader.read_u8(buf)),
                1 => self.node_id = ready!(reader.read_uuid(buf)),
                2 => self.thread_id = ready!(reader.read_i64(buf)),
                3 => {
                    if !reader.read_message(buf, &mut self.version)? {
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

/// Candidates of a single key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    candidates: Vec<LockCandidate>,
}

impl CandidateList {
    pub fn new(candidates: Vec<LockCandidate>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[LockCandidate] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl Message for CandidateList {
    fn direct_type(&self) -> u8 {
        direct_type::CANDIDATE_LIST
    }

    fn fields(&self) -> &'static [FieldDescriptor] {
        &LIST_FIELDS
    }

    fn write_to(&self, buf: &mut dyn BufMut, writer: &mut MessageWriter) -> Result<bool> {
        if !writer.write_header(buf, self.direct_type(), self.fields_count()) {
            return Ok(false);
        }
        if writer.state() == 0 {
            if !writer.write_collection(buf, &self.candidates)? {
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
            if !reader.read_collection(buf, &mut self.candidates, "candidates")? {
                return Ok(false);
            }
            reader.increment_state();
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LockWireError;
    use bytes::BytesMut;

    fn sample() -> CandidateList {
        CandidateList::new(vec![
            LockCandidate::new(
                Uuid::from_u128(1),
                CacheVersion::new(1, 10, 1),
                100,
                candidate_flags::LOCAL | candidate_flags::OWNER,
            ),
            LockCandidate::new(Uuid::from_u128(2), CacheVersion::new(1, 11, 2), 200, 0),
        ])
    }

    #[test]
    fn test_flags() {
        let list = sample();
        let first = &list.candidates()[0];
        assert!(first.is_owner());
        assert!(first.is_local());
        assert!(!first.is_reentry());
        assert!(!list.candidates()[1].is_owner());
    }

    #[test]
    fn test_list_roundtrip_with_small_windows() {
        let sent = sample();
        let mut writer = MessageWriter::new();
        let mut encoded = Vec::new();
        let mut storage = [0u8; 9];
        loop {
            let mut window: &mut [u8] = &mut storage;
            let done = sent.write_to(&mut window, &mut writer).unwrap();
            let filled = 9 - window.len();
            encoded.extend_from_slice(&storage[..filled]);
            if done {
                break;
            }
        }

        let mut unbounded = BytesMut::new();
        assert!(sent
            .write_to(&mut unbounded, &mut MessageWriter::new())
            .unwrap());
        assert_eq!(&encoded[..], &unbounded[..]);

        let mut decoded = CandidateList::default();
        let mut input: &[u8] = &encoded;
        assert!(decoded.read_from(&mut input, &mut MessageReader::new()).unwrap());
        assert_eq!(decoded, sent);
    }

    #[test]
    fn test_candidate_without_version() {
        let candidate = LockCandidate {
            node_id: None,
            version: None,
            thread_id: 5,
            flags: candidate_flags::TX,
        };
        let mut out = BytesMut::new();
        assert!(candidate.write_to(&mut out, &mut MessageWriter::new()).unwrap());

        let mut decoded = LockCandidate::default();
        let mut input: &[u8] = &out;
        assert!(decoded.read_from(&mut input, &mut MessageReader::new()).unwrap());
        assert_eq!(decoded, candidate);
    }

    #[test]
    fn test_nested_candidate_with_extra_fields() {
        let list = CandidateList::new(vec![LockCandidate::new(
            Uuid::from_u128(1),
            CacheVersion::new(1, 10, 1),
            100,
            0,
        )]);
        let mut out = BytesMut::new();
        assert!(list.write_to(&mut out, &mut MessageWriter::new()).unwrap());
        // [list type, 1, count: 4 bytes, candidate type, candidate fields, ..]
        assert_eq!(out[6], direct_type::LOCK_CANDIDATE);
        out[7] = 5;

        let mut decoded = CandidateList::default();
        let mut input: &[u8] = &out;
        let err = decoded
            .read_from(&mut input, &mut MessageReader::new())
            .unwrap_err();
        assert!(matches!(
            err,
            LockWireError::UnknownNestedFields {
                direct_type: direct_type::LOCK_CANDIDATE,
                remote: 5,
                local: 4
            }
        ));
    }

    #[test]
    fn test_nested_candidate_from_older_writer() {
        let list = CandidateList::new(vec![LockCandidate::new(
            Uuid::from_u128(1),
            CacheVersion::new(1, 10, 1),
            100,
            candidate_flags::READY,
        )]);
        let mut out = BytesMut::new();
        assert!(list.write_to(&mut out, &mut MessageWriter::new()).unwrap());
        // Drop the version slot: header plus three ints and longs, 18 bytes.
        out[7] = 3;
        out.truncate(out.len() - 18);

        let mut decoded = CandidateList::default();
        let mut input: &[u8] = &out;
        assert!(decoded.read_from(&mut input, &mut MessageReader::new()).unwrap());
        let candidate = &decoded.candidates()[0];
        assert_eq!(candidate.thread_id(), 100);
        assert_eq!(candidate.version(), None);
    }
}
