//! Client and server sessions.
//!
//! A session is a logical connection between one local
//! [`SimNetwork`](crate::SimNetwork) and one remote address. Sessions come in
//! pairs: the caller sends requests through a [`ClientSession`], and the
//! destination network accepts them on a [`ServerSession`] that it creates
//! on first contact and reuses for every later request from the same peer.
//! Replies travel back through the server session to the client session that
//! opened the pair.
//!
//! Every send copies the message into a freshly allocated buffer, so the
//! sender and the receiver never share storage.

use crate::{
    address::Address,
    message::{FrameError, Message},
};

mod client;
pub use client::ClientSession;

mod server;
pub use server::ServerSession;

mod matcher;
pub use matcher::ClientMatcher;

/// Models putting `message` on the wire between `from` and `to`: the bytes
/// are copied into one new buffer and framed again on the far side.
pub(crate) fn virtual_send(
    message: &Message,
    from: Address,
    to: Address,
    max_body_length: u32,
) -> Result<Message, FrameError> {
    let mut received = Message::from_frame(message.copy_to_wire(), max_body_length)?;
    received.from = Some(from);
    received.to = Some(to);
    Ok(received)
}
