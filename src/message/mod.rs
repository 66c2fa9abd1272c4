//! Message module - the lock request and the messages nested in it.
//!
//! - [`LockRequest`] - a node asking for locks on a set of keys
//! - [`LockMessageBase`] - header slots shared by all distributed-lock messages
//! - [`CacheVersion`], [`KeyCacheObject`], [`TxKey`], [`LockCandidate`],
//!   [`CandidateList`] - nested messages

mod base;
mod candidate;
mod isolation;
mod key;
mod lock_request;
mod version;

pub use base::{LockMessageBase, BASE_FIELDS, BASE_FIELDS_COUNT};
pub use candidate::{candidate_flags, CandidateList, LockCandidate};
pub use isolation::TxIsolation;
pub use key::{KeyCacheObject, KeyValue, TxKey};
pub use lock_request::{request_flags, LockRequest, LockRequestBuilder, LOCK_REQUEST_FIELDS};
pub use version::CacheVersion;
