//! Message stream over any tokio byte stream.
//!
//! # Example
//!
//! ```ignore
//! use lockwire::message::LockRequest;
//! use lockwire::transport::MessageStream;
//!
//! let mut stream = MessageStream::new(tcp_stream);
//! stream.send(&request).await?;
//! let reply: Option<LockRequest> = stream.recv().await?;
//! ```

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::codec::{MessageReader, MessageWriter};
use crate::config::StreamConfig;
use crate::error::{LockWireError, Result};
use crate::protocol::Message;

/// Sends and receives whole messages through fixed-size chunks.
///
/// Outbound messages are encoded into a `chunk_size` scratch buffer which is
/// flushed to the stream each time it fills up, so a message is never held
/// in memory in full. Inbound bytes accumulate in a `BytesMut`; bytes past
/// the end of one message are kept for the next `recv`.
///
/// Both peers must agree on the field count of every message type. A peer
/// announcing extra top-level slots leaves them in the inbound buffer, where
/// the next `recv` reads them as the start of a new message.
pub struct MessageStream<S> {
    stream: S,
    config: StreamConfig,
    chunk: Vec<u8>,
    pending: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> MessageStream<S> {
    /// Wrap a stream with the default configuration.
    pub fn new(stream: S) -> Self {
        let config = StreamConfig::default();
        Self {
            stream,
            chunk: vec![0; config.chunk_size],
            pending: BytesMut::with_capacity(config.chunk_size),
            config,
        }
    }

    /// Wrap a stream with a custom configuration.
    pub fn with_config(stream: S, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            stream,
            chunk: vec![0; config.chunk_size],
            pending: BytesMut::with_capacity(config.chunk_size),
            config,
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwrap the stream. Buffered inbound bytes are discarded.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Encode `msg` chunk by chunk and write it out.
    pub async fn send<M: Message + ?Sized>(&mut self, msg: &M) -> Result<()> {
        let mut writer = MessageWriter::new();
        let capacity = self.chunk.len();
        let mut chunks = 0usize;
        let mut total = 0usize;
        loop {
            let mut window: &mut [u8] = &mut self.chunk;
            let done = msg.write_to(&mut window, &mut writer)?;
            let filled = capacity - window.len();
            self.stream.write_all(&self.chunk[..filled]).await?;
            chunks += 1;
            total += filled;
            if done {
                break;
            }
        }
        self.stream.flush().await?;
        debug!(
            direct_type = msg.direct_type(),
            chunks, bytes = total, "Message sent"
        );
        Ok(())
    }

    /// Receive the next message of type `M`.
    ///
    /// Returns `Ok(None)` if the peer closed the stream between messages and
    /// [`LockWireError::ConnectionClosed`] if it closed in the middle of one.
    pub async fn recv<M: Message + Default>(&mut self) -> Result<Option<M>> {
        let mut msg = M::default();
        let mut reader = MessageReader::with_config(self.config.codec);
        loop {
            let mut input: &[u8] = &self.pending;
            let before = input.len();
            let done = msg.read_from(&mut input, &mut reader)?;
            let consumed = before - input.len();
            self.pending.advance(consumed);
            if done {
                debug!(direct_type = msg.direct_type(), "Message received");
                return Ok(Some(msg));
            }

            self.pending.reserve(self.config.chunk_size);
            if self.stream.read_buf(&mut self.pending).await? == 0 {
                if self.pending.is_empty() && !reader.is_header_read() {
                    return Ok(None);
                }
                return Err(LockWireError::ConnectionClosed);
            }
        }
    }
}
