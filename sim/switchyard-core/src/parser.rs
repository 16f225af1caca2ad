//! Incremental message framing.
//!
//! The [`MessageParser`] turns an arbitrary sequence of byte chunks into
//! complete [`Message`]s. A single message may arrive across many chunks and
//! a single chunk may carry many messages.
//!
//! The reading side drives the parser with three calls:
//!
//! 1. [`read_buffer_ptr`](MessageParser::read_buffer_ptr) hands out writable
//!    space for at least the requested number of bytes.
//! 2. The reader writes bytes into that space.
//! 3. [`on_read`](MessageParser::on_read) records how many bytes were written
//!    and either returns a complete message or reports how many more bytes
//!    are needed before the next framing decision.

use crate::{
    config::ParserConfig,
    message::{FrameError, Message, MessageHeader, HEADER_SIZE},
    Blob,
};
use bytes::BytesMut;

/// The outcome of feeding bytes to a [`MessageParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResult {
    /// The message completed by this read, if any
    pub message: Option<Message>,
    /// How many bytes the reader should ask for next
    pub read_next: usize,
}

/// Accumulates bytes into a growable buffer and cuts complete messages out
/// of it.
///
/// The buffer is only ever replaced by a larger one; it is never compacted
/// in place. Completed messages are split off the front of the buffer
/// without copying and keep the split-off bytes alive for as long as they
/// exist.
#[derive(Debug)]
pub struct MessageParser {
    /// The whole allocation is initialized; `occupied` marks how much of it
    /// holds unconsumed data.
    buffer: BytesMut,
    occupied: usize,
    config: ParserConfig,
}

impl MessageParser {
    /// Creates a parser with an initial buffer of `config.buffer_block_size`
    /// bytes.
    pub fn new(config: ParserConfig) -> Self {
        Self {
            buffer: BytesMut::zeroed(config.buffer_block_size),
            occupied: 0,
            config,
        }
    }

    /// Returns writable space for at least `read_next` bytes past the
    /// unconsumed data.
    ///
    /// If the current buffer is too small, a new one of
    /// `max(read_next + occupied, buffer_block_size)` bytes replaces it and
    /// the unconsumed bytes are copied to its front.
    pub fn read_buffer_ptr(&mut self, read_next: usize) -> &mut [u8] {
        if read_next + self.occupied > self.buffer.len() {
            let size = (read_next + self.occupied).max(self.config.buffer_block_size);
            let mut buffer = BytesMut::zeroed(size);
            buffer[..self.occupied].copy_from_slice(&self.buffer[..self.occupied]);
            tracing::trace!(
                old = self.buffer.len(),
                new = size,
                occupied = self.occupied,
                "grew read buffer"
            );
            self.buffer = buffer;
            assert!(read_next + self.occupied <= self.buffer.len());
        }
        &mut self.buffer[self.occupied..]
    }

    /// The number of bytes that can be written without growing the buffer.
    pub fn read_buffer_capacity(&self) -> usize {
        self.buffer.len() - self.occupied
    }

    /// The number of unconsumed bytes held by the parser.
    pub fn occupied(&self) -> usize {
        self.occupied
    }

    /// Records that `read_length` bytes were written into the space returned
    /// by [`read_buffer_ptr`](Self::read_buffer_ptr).
    ///
    /// # Panics
    ///
    /// Panics if the bytes could not have fit in the buffer. Continuing would
    /// corrupt the buffer state.
    pub fn mark_read(&mut self, read_length: usize) {
        assert!(
            read_length + self.occupied <= self.buffer.len(),
            "marked {} bytes read with only {} bytes of capacity",
            read_length,
            self.read_buffer_capacity()
        );
        self.occupied += read_length;
    }

    /// Records `read_length` newly written bytes and makes the next framing
    /// decision.
    ///
    /// Call again with a `read_length` of zero to drain further messages
    /// that are already buffered. A header declaring an oversized or
    /// malformed body is rejected; the parser is unusable afterwards.
    pub fn on_read(&mut self, read_length: usize) -> Result<ReadResult, FrameError> {
        self.mark_read(read_length);

        if self.occupied < HEADER_SIZE {
            return Ok(ReadResult {
                message: None,
                read_next: HEADER_SIZE - self.occupied,
            });
        }

        let header = MessageHeader::parse(&self.buffer[..HEADER_SIZE], self.config.max_body_length)?;
        let frame_size = HEADER_SIZE + header.body_length as usize;

        if self.occupied < frame_size {
            return Ok(ReadResult {
                message: None,
                read_next: frame_size - self.occupied,
            });
        }

        let frame = Blob::from(self.buffer.split_to(frame_size).freeze());
        self.occupied -= frame_size;
        let message = Message::from_frame(frame, self.config.max_body_length)?;
        Ok(ReadResult {
            message: Some(message),
            read_next: HEADER_SIZE,
        })
    }

    /// Copies `chunk` into the read buffer and returns every message it
    /// completes, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Message>, FrameError> {
        self.read_buffer_ptr(chunk.len())[..chunk.len()].copy_from_slice(chunk);
        let mut messages = vec![];
        let mut read_length = chunk.len();
        while let Some(message) = self.on_read(read_length)?.message {
            messages.push(message);
            read_length = 0;
        }
        Ok(messages)
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}
