//! Resumable message writer.
//!
//! A `MessageWriter` belongs to one outbound message. It remembers which
//! slot (and which part of that slot) was being written when the buffer ran
//! out, so the next `write_to` call continues exactly there.
//!
//! # Example
//!
//! ```ignore
//! let mut writer = MessageWriter::new();
//! let mut chunk = [0u8; 64];
//! loop {
//!     let mut window: &mut [u8] = &mut chunk;
//!     let done = request.write_to(&mut window, &mut writer)?;
//!     let filled = 64 - window.len();
//!     socket.write_all(&chunk[..filled])?;
//!     if done {
//!         break;
//!     }
//! }
//! ```

use bytes::BufMut;
use uuid::Uuid;

use super::primitive::{
    put_partial, try_put_bool, try_put_i32, try_put_i64, try_put_i8, try_put_pair, try_put_u8,
};
use super::state::StateStack;
use crate::error::{LockWireError, Result};
use crate::protocol::{direct_type, FutureId, Message};

/// Write-side cursor for one message and all messages nested in it.
#[derive(Debug, Clone, Default)]
pub struct MessageWriter {
    state: StateStack,
}

impl MessageWriter {
    /// Create a writer positioned before the header.
    pub fn new() -> Self {
        Self {
            state: StateStack::new(),
        }
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

    /// Whether the current message's header has been written.
    #[inline]
    pub fn is_header_written(&self) -> bool {
        self.state.current().header_done
    }

    /// Nesting depth of the message being written (0 = top level).
    #[inline]
    pub fn depth(&self) -> usize {
        self.state.depth()
    }

    /// Forget all progress so the writer can be reused for another message.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Write the direct type and field count, both or neither.
    pub fn write_header(&mut self, buf: &mut dyn BufMut, direct_type: u8, fields_count: u8) -> bool {
        if self.is_header_written() {
            return true;
        }
        if !try_put_pair(buf, direct_type, fields_count) {
            return false;
        }
        self.state.current_mut().header_done = true;
        true
    }

    #[inline]
    pub fn write_u8(&mut self, buf: &mut dyn BufMut, value: u8) -> bool {
        try_put_u8(buf, value)
    }

    #[inline]
    pub fn write_bool(&mut self, buf: &mut dyn BufMut, value: bool) -> bool {
        try_put_bool(buf, value)
    }

    #[inline]
    pub fn write_i32(&mut self, buf: &mut dyn BufMut, value: i32) -> bool {
        try_put_i32(buf, value)
    }

    #[inline]
    pub fn write_i64(&mut self, buf: &mut dyn BufMut, value: i64) -> bool {
        try_put_i64(buf, value)
    }

    /// Write an optional enum ordinal; `None` is encoded as `-1`.
    #[inline]
    pub fn write_ordinal(&mut self, buf: &mut dyn BufMut, ordinal: Option<u8>) -> bool {
        try_put_i8(buf, ordinal.map_or(-1, |o| o as i8))
    }

    /// Write an optional UUID as a null flag followed by two longs.
    pub fn write_uuid(&mut self, buf: &mut dyn BufMut, id: Option<Uuid>) -> bool {
        self.write_parts(buf, id.map(|id| {
            let (msb, lsb) = id.as_u64_pair();
            [msb as i64, lsb as i64]
        }))
    }

    /// Write an optional future id as a null flag followed by three longs.
    pub fn write_future_id(&mut self, buf: &mut dyn BufMut, id: Option<FutureId>) -> bool {
        self.write_parts(buf, id.map(|id| {
            let (msb, lsb) = id.global.as_u64_pair();
            [msb as i64, lsb as i64, id.local]
        }))
    }

    /// Each part is atomic; `state.part` counts parts already written.
    fn write_parts<const N: usize>(&mut self, buf: &mut dyn BufMut, parts: Option<[i64; N]>) -> bool {
        let Some(parts) = parts else {
            return try_put_bool(buf, true);
        };
        loop {
            let state = self.state.current_mut();
            let written = match state.part as usize {
                0 => try_put_bool(buf, false),
                p if p <= N => try_put_i64(buf, parts[p - 1]),
                _ => return true,
            };
            if !written {
                return false;
            }
            state.part += 1;
        }
    }

    /// Write an optional byte array: i32 length (-1 = absent), then content.
    ///
    /// The content may be spread over several calls.
    pub fn write_byte_array(&mut self, buf: &mut dyn BufMut, data: Option<&[u8]>) -> Result<bool> {
        let state = self.state.current_mut();
        if !state.len_done {
            let len = match data {
                Some(d) => wire_len(d.len())?,
                None => -1,
            };
            if !try_put_i32(buf, len) {
                return Ok(false);
            }
            state.len_done = true;
        }
        let Some(data) = data else {
            return Ok(true);
        };
        state.offset += put_partial(buf, &data[state.offset..]);
        Ok(state.offset == data.len())
    }

    /// Write a boolean array: i32 length, then one byte per value.
    pub fn write_bool_array(&mut self, buf: &mut dyn BufMut, values: &[bool]) -> Result<bool> {
        let state = self.state.current_mut();
        if !state.len_done {
            if !try_put_i32(buf, wire_len(values.len())?) {
                return Ok(false);
            }
            state.len_done = true;
        }
        while state.offset < values.len() {
            if !try_put_bool(buf, values[state.offset]) {
                return Ok(false);
            }
            state.offset += 1;
        }
        Ok(true)
    }

    /// Write an optional nested message. The child keeps its own cursor one
    /// level deeper, so a suspended child resumes where it stopped.
    pub fn write_message(&mut self, buf: &mut dyn BufMut, msg: Option<&dyn Message>) -> Result<bool> {
        let Some(msg) = msg else {
            return Ok(try_put_u8(buf, direct_type::NULL));
        };
        self.state.push();
        let result = msg.write_to(buf, self);
        self.state.pop(matches!(result, Ok(true)));
        result
    }

    /// Write a sequence of messages: i32 count, then each element.
    ///
    /// Completed elements are never re-emitted on resume.
    pub fn write_collection<M: Message>(&mut self, buf: &mut dyn BufMut, items: &[M]) -> Result<bool> {
        if !self.state.current().len_done {
            if !try_put_i32(buf, wire_len(items.len())?) {
                return Ok(false);
            }
            self.state.current_mut().len_done = true;
        }
        while self.state.current().offset < items.len() {
            let item = &items[self.state.current().offset];
            if !self.write_message(buf, Some(item as &dyn Message))? {
                return Ok(false);
            }
            self.state.current_mut().offset += 1;
        }
        Ok(true)
    }
}

/// Length prefix for an array or collection of `len` entries.
fn wire_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| LockWireError::LengthOverflow(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_header_written_once() {
        let mut writer = MessageWriter::new();
        let mut out = BytesMut::new();
        assert!(writer.write_header(&mut out, 21, 23));
        assert!(writer.write_header(&mut out, 21, 23));
        assert_eq!(&out[..], &[21, 23]);
        assert!(writer.is_header_written());
    }

    #[test]
    fn test_header_needs_two_bytes() {
        let mut writer = MessageWriter::new();
        let mut storage = [0u8; 1];
        let mut window: &mut [u8] = &mut storage;
        assert!(!writer.write_header(&mut window, 21, 23));
        assert_eq!(window.len(), 1);
        assert!(!writer.is_header_written());
    }

    #[test]
    fn test_ordinal_absent_is_minus_one() {
        let mut writer = MessageWriter::new();
        let mut out = BytesMut::new();
        assert!(writer.write_ordinal(&mut out, None));
        assert!(writer.write_ordinal(&mut out, Some(2)));
        assert_eq!(&out[..], &[0xFF, 2]);
    }

    #[test]
    fn test_uuid_resumes_between_parts() {
        let id = Uuid::from_u128(0x0011_2233_4455_6677_8899_AABB_CCDD_EEFF);
        let mut writer = MessageWriter::new();
        let mut produced = Vec::new();

        // 1 byte: only the null flag fits
        let mut storage = [0u8; 12];
        let mut window: &mut [u8] = &mut storage[..1];
        assert!(!writer.write_uuid(&mut window, Some(id)));
        produced.extend_from_slice(&storage[..1]);

        // 12 bytes: msb fits, lsb does not
        let mut window: &mut [u8] = &mut storage[..12];
        assert!(!writer.write_uuid(&mut window, Some(id)));
        let filled = 12 - window.len();
        assert_eq!(filled, 8);
        produced.extend_from_slice(&storage[..filled]);

        let mut out = BytesMut::new();
        assert!(writer.write_uuid(&mut out, Some(id)));
        produced.extend_from_slice(&out);

        let mut expected = vec![0u8];
        expected.extend_from_slice(&id.as_u128().to_be_bytes());
        assert_eq!(produced, expected);
    }

    #[test]
    fn test_absent_uuid_is_single_flag() {
        let mut writer = MessageWriter::new();
        let mut out = BytesMut::new();
        assert!(writer.write_uuid(&mut out, None));
        assert_eq!(&out[..], &[1]);
    }

    #[test]
    fn test_byte_array_partial_content() {
        let mut writer = MessageWriter::new();
        let data = b"hello world";
        let mut produced = Vec::new();

        let mut storage = [0u8; 6];
        loop {
            let mut window: &mut [u8] = &mut storage;
            let done = writer.write_byte_array(&mut window, Some(data)).unwrap();
            let filled = 6 - window.len();
            produced.extend_from_slice(&storage[..filled]);
            if done {
                break;
            }
        }

        let mut expected = (data.len() as i32).to_be_bytes().to_vec();
        expected.extend_from_slice(data);
        assert_eq!(produced, expected);
    }

    #[test]
    fn test_absent_byte_array() {
        let mut writer = MessageWriter::new();
        let mut out = BytesMut::new();
        assert!(writer.write_byte_array(&mut out, None).unwrap());
        assert_eq!(&out[..], &(-1i32).to_be_bytes());
    }

    #[test]
    fn test_bool_array_resume() {
        let mut writer = MessageWriter::new();
        let values = [true, false, true];

        let mut storage = [0u8; 5];
        let mut window: &mut [u8] = &mut storage;
        assert!(!writer.write_bool_array(&mut window, &values).unwrap());
        assert!(window.is_empty());

        let mut out = BytesMut::new();
        assert!(writer.write_bool_array(&mut out, &values).unwrap());
        assert_eq!(&storage, &[0, 0, 0, 3, 1]);
        assert_eq!(&out[..], &[0, 1]);
    }

    #[test]
    fn test_wire_len_bounds() {
        assert_eq!(wire_len(0).unwrap(), 0);
        assert_eq!(wire_len(i32::MAX as usize).unwrap(), i32::MAX);
        let too_long = i32::MAX as usize + 1;
        assert!(matches!(
            wire_len(too_long),
            Err(LockWireError::LengthOverflow(len)) if len == too_long
        ));
    }

    #[test]
    fn test_absent_nested_message_marker() {
        let mut writer = MessageWriter::new();
        let mut out = BytesMut::new();
        assert!(writer.write_message(&mut out, None).unwrap());
        assert_eq!(&out[..], &[direct_type::NULL]);
        assert_eq!(writer.depth(), 0);
    }
}
