//! Transport module - drives the codec over an async byte stream.
//!
//! Connection setup stays with the caller; [`MessageStream`] only wraps an
//! already connected `AsyncRead + AsyncWrite` and re-invokes
//! `write_to`/`read_from` between I/O calls.

mod stream;

pub use stream::MessageStream;
