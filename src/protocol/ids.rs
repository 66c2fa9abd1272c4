//! Identifier types that travel as composite primitives.

use std::fmt;

use uuid::Uuid;

/// Cluster-unique id of a lock future: a node-scoped UUID plus a local
/// sequence number. Correlates a request with its response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FutureId {
    /// Id of the generating node session.
    pub global: Uuid,
    /// Monotonic local counter.
    pub local: i64,
}

impl FutureId {
    pub fn new(global: Uuid, local: i64) -> Self {
        Self { global, local }
    }

    /// Fresh id with a random global part.
    pub fn random(local: i64) -> Self {
        Self::new(Uuid::new_v4(), local)
    }
}

impl fmt::Display for FutureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.global, self.local)
    }
}
