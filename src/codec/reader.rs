//! Resumable message reader.
//!
//! Mirrors [`MessageWriter`](super::MessageWriter): primitive reads return
//! `None` when the buffer holds less than a whole value and leave the buffer
//! untouched, so the caller can append more bytes and call again.
//!
//! # Field counts
//!
//! A header announcing fewer fields than the local type knows leaves the
//! missing slots at their defaults. A header announcing more is accepted
//! only for the top-level message: the reader stops after its own last slot
//! and the unknown trailing bytes stay in the buffer for the caller to
//! discard. Their size is unknown, so a nested message with extra slots is
//! rejected with [`LockWireError::UnknownNestedFields`].

use bytes::Buf;
use tracing::debug;
use uuid::Uuid;

use super::primitive::{
    get_partial, try_get_bool, try_get_i32, try_get_i64, try_get_i8, try_get_pair, try_get_u8,
};
use super::state::StateStack;
use crate::config::CodecConfig;
use crate::error::{LockWireError, Result};
use crate::protocol::{direct_type, FutureId, Message};

/// Read-side cursor for one message and all messages nested in it.
#[derive(Debug, Clone, Default)]
pub struct MessageReader {
    state: StateStack,
    config: CodecConfig,
}

impl MessageReader {
    /// Create a reader with default decode limits.
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    /// Create a reader with custom decode limits.
    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            state: StateStack::new(),
            config,
        }
    }

    /// Decode limits in effect.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Slot the current message is positioned at.
    #[inline]
    pub fn state(&self) -> usize {
        self.state.current().slot
    }

    /// Mark the current slot complete.
    #[inline]
    pub fn increment_state(&mut self) {
        self.state.current_mut().next_slot();
    }

    /// Whether the current message's header has been read.
    #[inline]
    pub fn is_header_read(&self) -> bool {
        self.state.current().header_done
    }

    /// Whether the remote writer sent the current slot at all.
    ///
    /// A peer built with fewer fields announces a smaller count; the slots it
    /// does not know about keep their default values.
    #[inline]
    pub fn has_remote_field(&self) -> bool {
        let state = self.state.current();
        state.slot < state.remote_fields
    }

    /// Forget all progress so the reader can be reused for another message.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Read and check the direct type and field count.
    pub fn read_header(&mut self, buf: &mut dyn Buf, expected_type: u8, local_fields: u8) -> Result<bool> {
        if self.is_header_read() {
            return Ok(true);
        }
        let Some((actual, remote_fields)) = try_get_pair(buf) else {
            return Ok(false);
        };
        if actual != expected_type {
            return Err(LockWireError::UnexpectedDirectType {
                expected: expected_type,
                actual,
            });
        }
        if remote_fields > local_fields && self.state.depth() > 0 {
            return Err(LockWireError::UnknownNestedFields {
                direct_type: actual,
                remote: remote_fields,
                local: local_fields,
            });
        }
        if remote_fields != local_fields {
            debug!(
                direct_type = actual,
                remote_fields, local_fields, "Field count differs from remote writer"
            );
        }
        let state = self.state.current_mut();
        state.remote_fields = remote_fields as usize;
        state.header_done = true;
        Ok(true)
    }

    #[inline]
    pub fn read_u8(&mut self, buf: &mut dyn Buf) -> Option<u8> {
        try_get_u8(buf)
    }

    #[inline]
    pub fn read_bool(&mut self, buf: &mut dyn Buf) -> Option<bool> {
        try_get_bool(buf)
    }

    #[inline]
    pub fn read_i32(&mut self, buf: &mut dyn Buf) -> Option<i32> {
        try_get_i32(buf)
    }

    #[inline]
    pub fn read_i64(&mut self, buf: &mut dyn Buf) -> Option<i64> {
        try_get_i64(buf)
    }

    /// Read a raw enum ordinal byte; `-1` means absent.
    #[inline]
    pub fn read_ordinal(&mut self, buf: &mut dyn Buf) -> Option<i8> {
        try_get_i8(buf)
    }

    /// Read an optional UUID. Outer `None` = need more bytes.
    pub fn read_uuid(&mut self, buf: &mut dyn Buf) -> Option<Option<Uuid>> {
        let parts = self.read_parts::<2>(buf)?;
        Some(parts.map(|[msb, lsb]| Uuid::from_u64_pair(msb as u64, lsb as u64)))
    }

    /// Read an optional future id. Outer `None` = need more bytes.
    pub fn read_future_id(&mut self, buf: &mut dyn Buf) -> Option<Option<FutureId>> {
        let parts = self.read_parts::<3>(buf)?;
        Some(parts.map(|[msb, lsb, local]| FutureId {
            global: Uuid::from_u64_pair(msb as u64, lsb as u64),
            local,
        }))
    }

    fn read_parts<const N: usize>(&mut self, buf: &mut dyn Buf) -> Option<Option<[i64; N]>> {
        loop {
            let state = self.state.current_mut();
            match state.part as usize {
                0 => {
                    if try_get_bool(buf)? {
                        return Some(None);
                    }
                }
                p if p <= N => state.longs[p - 1] = try_get_i64(buf)?,
                _ => {
                    let mut parts = [0i64; N];
                    parts.copy_from_slice(&state.longs[..N]);
                    return Some(Some(parts));
                }
            }
            state.part += 1;
        }
    }

    fn read_len(&mut self, buf: &mut dyn Buf, field: &'static str, max: usize, nullable: bool) -> Result<Option<Option<usize>>> {
        let Some(len) = try_get_i32(buf) else {
            return Ok(None);
        };
        if len == -1 && nullable {
            return Ok(Some(None));
        }
        if len < 0 || len as usize > max {
            return Err(LockWireError::InvalidLength {
                field,
                length: i64::from(len),
            });
        }
        let state = self.state.current_mut();
        state.len = len as usize;
        state.len_done = true;
        Ok(Some(Some(len as usize)))
    }

    /// Read an optional byte array into `target`, possibly over several calls.
    pub fn read_byte_array(&mut self, buf: &mut dyn Buf, target: &mut Option<Vec<u8>>, field: &'static str) -> Result<bool> {
        if !self.state.current().len_done {
            let max = self.config.max_array_len;
            match self.read_len(buf, field, max, true)? {
                None => return Ok(false),
                Some(None) => {
                    *target = None;
                    return Ok(true);
                }
                Some(Some(len)) => *target = Some(Vec::with_capacity(len.min(buf.remaining()))),
            }
        }
        let dst = target.get_or_insert_with(Vec::new);
        let state = self.state.current_mut();
        state.offset += get_partial(buf, dst, state.len - state.offset);
        Ok(state.offset == state.len)
    }

    /// Read a boolean array into `target`, possibly over several calls.
    pub fn read_bool_array(&mut self, buf: &mut dyn Buf, target: &mut Vec<bool>, field: &'static str) -> Result<bool> {
        if !self.state.current().len_done {
            let max = self.config.max_array_len;
            match self.read_len(buf, field, max, false)? {
                None => return Ok(false),
                Some(len) => {
                    target.clear();
                    target.reserve(len.unwrap_or(0).min(buf.remaining()));
                }
            }
        }
        let state = self.state.current_mut();
        while state.offset < state.len {
            let Some(value) = try_get_bool(buf) else {
                return Ok(false);
            };
            target.push(value);
            state.offset += 1;
        }
        Ok(true)
    }

    /// Read an optional nested message of a known type into `target`.
    ///
    /// A partially read child stays in `target` between calls.
    pub fn read_message<M: Message + Default>(&mut self, buf: &mut dyn Buf, target: &mut Option<M>) -> Result<bool> {
        if !self.state.current().len_done {
            if buf.remaining() < 1 {
                return Ok(false);
            }
            if buf.chunk()[0] == direct_type::NULL {
                buf.advance(1);
                *target = None;
                return Ok(true);
            }
            *target = Some(M::default());
            self.state.current_mut().len_done = true;
        }
        let msg = target.get_or_insert_with(M::default);
        self.read_nested(buf, msg)
    }

    /// Read a sequence of messages into `target`, replacing its contents.
    ///
    /// The element being read when the buffer runs out is kept as the last
    /// entry of `target` and continued on the next call.
    pub fn read_collection<M: Message + Default>(&mut self, buf: &mut dyn Buf, target: &mut Vec<M>, field: &'static str) -> Result<bool> {
        if !self.state.current().len_done {
            let max = self.config.max_collection_len;
            match self.read_len(buf, field, max, false)? {
                None => return Ok(false),
                Some(len) => {
                    target.clear();
                    target.reserve(len.unwrap_or(0).min(buf.remaining()));
                }
            }
        }
        loop {
            let state = self.state.current_mut();
            if state.offset == state.len {
                return Ok(true);
            }
            if state.part == 0 {
                target.push(M::default());
                state.part = 1;
            }
            let idx = target.len() - 1;
            if !self.read_nested(buf, &mut target[idx])? {
                return Ok(false);
            }
            let state = self.state.current_mut();
            state.offset += 1;
            state.part = 0;
        }
    }

    /// Read a nested message that is never absent on the wire.
    pub fn read_required_message(&mut self, buf: &mut dyn Buf, msg: &mut dyn Message) -> Result<bool> {
        self.read_nested(buf, msg)
    }

    fn read_nested(&mut self, buf: &mut dyn Buf, msg: &mut dyn Message) -> Result<bool> {
        self.state.push();
        let result = msg.read_from(buf, self);
        self.state.pop(matches!(result, Ok(true)));
        result
    }
}
