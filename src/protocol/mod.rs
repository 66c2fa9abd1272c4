//! Protocol module - the message trait, slot tables and direct types.
//!
//! Wire layout of every message:
//!
//! ```text
//! ┌─────────────┬──────────────┬────────────────────┬────────────────────┐
//! │ Direct type │ Fields count │ Base slots         │ Own slots          │
//! │ 1 byte      │ 1 byte       │ ascending order    │ ascending order    │
//! └─────────────┴──────────────┴────────────────────┴────────────────────┘
//! ```
//!
//! Slot order is the permanent wire contract. A type may only append new
//! slots after its highest existing slot.

mod ids;
mod message;

pub use ids::FutureId;
pub use message::{FieldDescriptor, Message, WireKind};

/// Stable direct-type ids used by the receiving dispatcher.
pub mod direct_type {
    /// Lock request.
    pub const LOCK_REQUEST: u8 = 21;
    /// Cache version (lock/transaction version stamp).
    pub const CACHE_VERSION: u8 = 86;
    /// Cache key object.
    pub const KEY_CACHE_OBJECT: u8 = 90;
    /// Transaction key (cache id + key).
    pub const TX_KEY: u8 = 94;
    /// Single lock candidate.
    pub const LOCK_CANDIDATE: u8 = 97;
    /// Lock candidates of one key.
    pub const CANDIDATE_LIST: u8 = 98;

    /// Marker written in place of an absent nested message.
    pub const NULL: u8 = 0xFF;
}

/// Check that a slot table is dense and strictly ascending from 0.
pub fn is_valid_layout(fields: &[FieldDescriptor]) -> bool {
    fields
        .iter()
        .enumerate()
        .all(|(i, f)| f.slot as usize == i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_validation() {
        const GOOD: [FieldDescriptor; 2] = [
            FieldDescriptor::new(0, "a", WireKind::Int),
            FieldDescriptor::new(1, "b", WireKind::Long),
        ];
        const GAP: [FieldDescriptor; 2] = [
            FieldDescriptor::new(0, "a", WireKind::Int),
            FieldDescriptor::new(2, "b", WireKind::Long),
        ];
        assert!(is_valid_layout(&GOOD));
        assert!(!is_valid_layout(&GAP));
    }

    #[test]
    fn test_null_marker_is_not_a_direct_type() {
        for ty in [
            direct_type::LOCK_REQUEST,
            direct_type::CACHE_VERSION,
            direct_type::KEY_CACHE_OBJECT,
            direct_type::TX_KEY,
            direct_type::LOCK_CANDIDATE,
            direct_type::CANDIDATE_LIST,
        ] {
            assert_ne!(ty, direct_type::NULL);
        }
    }
}
