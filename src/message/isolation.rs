//! Transaction isolation level carried by in-transaction lock requests.

use crate::error::{LockWireError, Result};

/// Isolation level, encoded on the wire by ordinal (`-1` = absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxIsolation {
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl TxIsolation {
    const VALUES: [TxIsolation; 3] = [
        TxIsolation::ReadCommitted,
        TxIsolation::RepeatableRead,
        TxIsolation::Serializable,
    ];

    /// Wire ordinal.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Map a wire ordinal back to a level. `-1` is absent; any other value
    /// without a level is a decode error.
    pub fn from_ordinal(ordinal: i8) -> Result<Option<Self>> {
        if ordinal == -1 {
            return Ok(None);
        }
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::VALUES.get(i).copied())
            .map(Some)
            .ok_or(LockWireError::InvalidOrdinal {
                field: "isolation",
                value: ordinal,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals() {
        for level in TxIsolation::VALUES {
            assert_eq!(
                TxIsolation::from_ordinal(level.ordinal() as i8).unwrap(),
                Some(level)
            );
        }
        assert_eq!(TxIsolation::RepeatableRead.ordinal(), 1);
    }

    #[test]
    fn test_absent() {
        assert_eq!(TxIsolation::from_ordinal(-1).unwrap(), None);
    }

    #[test]
    fn test_invalid_ordinal() {
        for bad in [3i8, 100, -2] {
            let err = TxIsolation::from_ordinal(bad).unwrap_err();
            assert!(err.is_decode_error());
        }
    }
}
