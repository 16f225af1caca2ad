//! Units of RPC traffic.
//!
//! A [`Message`] is a fixed-size [`MessageHeader`] followed by one or more
//! body [`Blob`]s. Messages built by the [`MessageParser`](crate::MessageParser)
//! borrow their body straight out of the read buffer; messages built for
//! sending are assembled from whatever blobs the caller supplies.

use crate::{address::Address, rpc_code::RpcCode, Blob};
use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

mod header;
pub use header::{FrameError, MessageHeader, MessageKind, HEADER_SIZE};

mod message_bytes;
pub use message_bytes::MessageBytes;

/// A shared handle to a [`Message`]
pub type MessagePtr = Arc<Message>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a message identifier that no other message in this process has
/// been given.
pub fn next_message_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A header plus the body buffers it describes.
///
/// The source and destination addresses are delivery metadata. They are
/// attached when a message is sent or received and never appear on the wire.
#[derive(Debug, Clone, Default)]
pub struct Message {
    header: MessageHeader,
    buffers: Vec<Blob>,
    /// The address the message was sent from
    pub from: Option<Address>,
    /// The address the message is destined for
    pub to: Option<Address>,
}

impl Message {
    /// Creates a request for `rpc_code` carrying `body`, with a fresh id.
    ///
    /// # Examples
    ///
    /// ```
    /// # use switchyard_core::{Message, RpcCode};
    /// let message = Message::request(RpcCode::from_name("RPC_PING"), "ping");
    /// assert_eq!(message.body_to_vec(), b"ping");
    /// assert_eq!(message.header().body_length, 4);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the body is longer than `u32::MAX` bytes, the most a header
    /// can describe.
    pub fn request(rpc_code: RpcCode, body: impl Into<Blob>) -> Self {
        let body = body.into();
        Self {
            header: MessageHeader {
                id: next_message_id(),
                rpc_code,
                body_length: body_length(body.len()),
                kind: MessageKind::Request,
            },
            buffers: vec![body],
            from: None,
            to: None,
        }
    }

    /// Creates the reply to `request`. The reply shares the request's id and
    /// travels in the opposite direction.
    ///
    /// # Panics
    ///
    /// Panics if the body is longer than `u32::MAX` bytes, the most a header
    /// can describe.
    pub fn reply_to(request: &Message, body: impl Into<Blob>) -> Self {
        let body = body.into();
        Self {
            header: MessageHeader {
                id: request.id(),
                rpc_code: request.rpc_code(),
                body_length: body_length(body.len()),
                kind: MessageKind::Reply,
            },
            buffers: vec![body],
            from: request.to.clone(),
            to: request.from.clone(),
        }
    }

    /// Replaces the message's id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.header.id = id;
        self
    }

    /// Rebuilds a message from a single buffer holding a header followed by
    /// exactly the body it declares. The body is a view into `frame`.
    pub fn from_frame(frame: Blob, max_body_length: u32) -> Result<Self, FrameError> {
        let header = MessageHeader::parse(frame.data(), max_body_length)?;
        let declared = HEADER_SIZE + header.body_length as usize;
        if frame.len() != declared {
            Err(FrameError::LengthMismatch {
                declared,
                actual: frame.len(),
            })?
        }
        Ok(Self {
            header,
            buffers: vec![frame.range(HEADER_SIZE..)],
            from: None,
            to: None,
        })
    }

    /// Adds another buffer to the end of the body.
    ///
    /// # Panics
    ///
    /// Panics if the body is longer than `u32::MAX` bytes, the most a header
    /// can describe.
    pub fn append_body(&mut self, body: impl Into<Blob>) {
        let body = body.into();
        self.header.body_length = body_length(self.body_len() + body.len());
        self.buffers.push(body);
    }

    /// The message header.
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// The message id.
    pub fn id(&self) -> u64 {
        self.header.id
    }

    /// The operation the message invokes.
    pub fn rpc_code(&self) -> RpcCode {
        self.header.rpc_code
    }

    /// Whether the message is a request or a reply.
    pub fn kind(&self) -> MessageKind {
        self.header.kind
    }

    /// The body buffers.
    pub fn buffers(&self) -> &[Blob] {
        &self.buffers
    }

    /// The number of body bytes.
    pub fn body_len(&self) -> usize {
        self.header.body_length as usize
    }

    /// The number of bytes the message occupies on the wire.
    pub fn total_length(&self) -> usize {
        HEADER_SIZE + self.body_len()
    }

    /// Returns an iterator over the bytes of the body.
    pub fn body_bytes(&self) -> MessageBytes {
        MessageBytes::new(&self.buffers)
    }

    /// Collects the body into a single vector.
    pub fn body_to_vec(&self) -> Vec<u8> {
        self.body_bytes().collect()
    }

    /// The buffers to put on the wire: the serialized header followed by the
    /// body buffers.
    pub fn wire_buffers(&self) -> Vec<Blob> {
        let mut buffers = Vec::with_capacity(self.buffers.len() + 1);
        buffers.push(Blob::from(self.header.to_bytes()));
        buffers.extend(self.buffers.iter().cloned());
        buffers
    }

    /// Copies the header and every body buffer into one freshly allocated
    /// buffer. The result never aliases this message's storage.
    pub fn copy_to_wire(&self) -> Blob {
        let mut bytes = Vec::with_capacity(self.total_length());
        bytes.extend_from_slice(&self.header.to_bytes());
        for buffer in self.buffers.iter() {
            bytes.extend_from_slice(buffer.data());
        }
        Blob::new(bytes)
    }
}

fn body_length(len: usize) -> u32 {
    len.try_into()
        .unwrap_or_else(|_| panic!("message body of {len} bytes does not fit a header"))
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} {:?} code {} ({} body bytes)",
            self.id(),
            self.kind(),
            self.rpc_code(),
            self.body_len()
        )
    }
}

/// Messages are equal when their headers and body bytes are equal. Delivery
/// metadata is ignored.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.header == other.header && self.body_bytes().eq(other.body_bytes())
    }
}

impl Eq for Message {}

#[cfg(test)]
mod tests {
    use super::*;

    const ECHO: RpcCode = RpcCode::from_name("RPC_ECHO");

    #[test]
    fn request_ids_are_unique() {
        let a = Message::request(ECHO, "a");
        let b = Message::request(ECHO, "b");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.kind(), MessageKind::Request);
    }

    #[test]
    fn multiple_body_buffers() {
        let mut message = Message::request(ECHO, "Hello");
        message.append_body(", ");
        message.append_body(Blob::from("big world").range(4..));
        assert_eq!(message.buffers().len(), 3);
        assert_eq!(message.body_len(), 12);
        assert_eq!(message.body_to_vec(), b"Hello, world");
        assert_eq!(message.total_length(), HEADER_SIZE + 12);
    }

    #[test]
    fn copy_to_wire_round_trips() {
        let mut message = Message::request(ECHO, "split ").with_id(42);
        message.append_body("body");
        let frame = message.copy_to_wire();
        assert_eq!(frame.len(), message.total_length());
        let rebuilt = Message::from_frame(frame, 1024).unwrap();
        assert_eq!(rebuilt, message);
        assert_eq!(rebuilt.id(), 42);
        assert_eq!(rebuilt.buffers().len(), 1);
    }

    #[test]
    fn copy_does_not_alias() {
        let message = Message::request(ECHO, "no aliasing");
        let frame = message.copy_to_wire();
        let body = &message.buffers()[0];
        let frame_range = frame.data().as_ptr_range();
        assert!(!frame_range.contains(&body.data().as_ptr()));
    }

    #[test]
    fn wire_buffers_concatenate_to_the_copy() {
        let mut message = Message::request(ECHO, "a");
        message.append_body("bc");
        let joined: Vec<u8> = message
            .wire_buffers()
            .iter()
            .flat_map(|blob| blob.data().to_vec())
            .collect();
        assert_eq!(joined, message.copy_to_wire().data());
    }

    #[test]
    fn reply_swaps_addresses() {
        let mut request = Message::request(ECHO, "ping");
        request.from = Some(Address::new("client", 1));
        request.to = Some(Address::new("server", 2));
        let reply = Message::reply_to(&request, "pong");
        assert_eq!(reply.id(), request.id());
        assert_eq!(reply.kind(), MessageKind::Reply);
        assert_eq!(reply.from, request.to);
        assert_eq!(reply.to, request.from);
    }

    #[test]
    #[should_panic(expected = "does not fit a header")]
    fn body_longer_than_a_header_can_describe() {
        let mebibyte = Blob::from(vec![0u8; 1 << 20]);
        let mut message = Message::request(ECHO, "");
        for _ in 0..4096 {
            message.append_body(mebibyte.clone());
        }
    }

    #[test]
    fn frame_length_must_match_header() {
        let frame = Message::request(ECHO, "four").copy_to_wire();
        assert_eq!(
            Message::from_frame(frame.range(..HEADER_SIZE + 2), 1024),
            Err(FrameError::LengthMismatch {
                declared: HEADER_SIZE + 4,
                actual: HEADER_SIZE + 2
            })
        );
    }
}
