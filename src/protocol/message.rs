//! The `Message` trait and slot descriptors.

use bytes::{Buf, BufMut};

use crate::codec::{MessageReader, MessageWriter};
use crate::error::Result;

/// Wire representation of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    Byte,
    Bool,
    Int,
    Long,
    /// Nullable enum ordinal, `-1` = absent.
    NullableOrdinal,
    /// Nullable UUID.
    Uuid,
    /// Nullable UUID plus a local i64 id.
    FutureId,
    ByteArray,
    BoolArray,
    /// Nullable nested message.
    Message,
    /// Length-prefixed sequence of messages.
    Collection,
}

/// One entry of a message's slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Position on the wire.
    pub slot: u8,
    /// Field name (diagnostics only, never encoded).
    pub name: &'static str,
    /// How the field is encoded.
    pub kind: WireKind,
}

impl FieldDescriptor {
    pub const fn new(slot: u8, name: &'static str, kind: WireKind) -> Self {
        Self { slot, name, kind }
    }
}

/// A structured message that can be written and read resumably.
///
/// `write_to` and `read_from` return `Ok(true)` once the whole message has
/// been processed and `Ok(false)` when the buffer ran out; the caller then
/// supplies more room/bytes and calls again with the same writer/reader.
/// `Err` is only returned for corrupt input or unmarshalled data.
pub trait Message {
    /// Stable id of the concrete type.
    fn direct_type(&self) -> u8;

    /// Full slot table of the concrete type, base slots first.
    fn fields(&self) -> &'static [FieldDescriptor];

    /// Number of slots, announced in the header.
    fn fields_count(&self) -> u8 {
        self.fields().len() as u8
    }

    /// Encode as much of the message as fits into `buf`.
    fn write_to(&self, buf: &mut dyn BufMut, writer: &mut MessageWriter) -> Result<bool>;

    /// Decode as much of the message as `buf` holds.
    fn read_from(&mut self, buf: &mut dyn Buf, reader: &mut MessageReader) -> Result<bool>;
}
