//! Lock and transaction version stamp.

use bytes::{Buf, BufMut};

use crate::codec::{ready, MessageReader, MessageWriter};
use crate::error::Result;
use crate::protocol::{direct_type, FieldDescriptor, Message, WireKind};

const FIELDS: [FieldDescriptor; 3] = [
    FieldDescriptor::new(0, "topology_version", WireKind::Int),
    FieldDescriptor::new(1, "order", WireKind::Long),
    FieldDescriptor::new(2, "node_order", WireKind::Int),
];

/// Monotonic version identifying a lock attempt or transaction.
///
/// Versions order by topology version first, then by order, then by the
/// issuing node's order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheVersion {
    topology_version: i32,
    order: i64,
    node_order: i32,
}

impl CacheVersion {
    pub fn new(topology_version: i32, order: i64, node_order: i32) -> Self {
        Self {
            topology_version,
            order,
            node_order,
        }
    }

    pub fn topology_version(&self) -> i32 {
        self.topology_version
    }

    pub fn order(&self) -> i64 {
        self.order
    }

    pub fn node_order(&self) -> i32 {
        self.node_order
    }
}

impl Message for CacheVersion {
    fn direct_type(&self) -> u8 {
        direct_type::CACHE_VERSION
    }

    fn fields(&self) -> &'static [FieldDescriptor] {
        &FIELDS
    }

    fn write_to(&self, buf: &mut dyn BufMut, writer: &mut MessageWriter) -> Result<bool> {
        if !writer.write_header(buf, self.direct_type(), self.fields_count()) {
            return Ok(false);
        }
        loop {
            let done = match writer.state() {
                0 => writer.write_i32(buf, self.topology_version),
                1 => writer.write_i64(buf, self.order),
                2 => writer.write_i32(buf, self.node_order),
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
                0 => self.topology_version = ready!(reader.read_i32(buf)),
                1 => self.order = ready!(reader.read_i64(buf)),
                2 => self.node_order = ready!(reader.read_i32(buf)),
                _ => break,
            }
            reader.increment_state();
        }
        Ok(true)
    }
}
