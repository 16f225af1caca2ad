use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use switchyard_core::{
    Address, Message, MessagePtr, NodeContext, RpcCode, RpcHandler, ServerSession,
};

/// An application that bounces a Time To Live (TTL) back and forth with a
/// peer. Each side sends the TTL it received, minus one, as a new request
/// to the peer. Once the TTL reaches 0 the exchange ends.
#[derive(Debug)]
pub struct PingPong {
    /// The address the next TTL is sent to
    peer: Address,
    /// When this side saw a TTL of 0
    finished: Mutex<Option<Duration>>,
}

impl PingPong {
    pub const RPC: RpcCode = RpcCode::from_name("RPC_PING_PONG");

    pub fn new(peer: Address) -> Self {
        Self {
            peer,
            finished: Default::default(),
        }
    }

    pub fn new_shared(peer: Address) -> Arc<Self> {
        Arc::new(Self::new(peer))
    }

    /// The request that starts an exchange of `ttl` more hops.
    pub fn message(ttl: u8) -> Message {
        Message::request(Self::RPC, [ttl])
    }

    /// The virtual time at which this side received the final TTL, if it
    /// did.
    pub fn finished(&self) -> Option<Duration> {
        *self.finished.lock()
    }
}

impl RpcHandler for PingPong {
    fn on_recv_request(&self, context: &NodeContext, session: &Arc<ServerSession>, request: MessagePtr) {
        let Some(ttl) = request.body_bytes().next() else {
            tracing::error!(node = context.node, "The message contained no TTL");
            return;
        };
        if ttl % 2 == 0 {
            tracing::info!("Pong {}", ttl);
        } else {
            tracing::info!("Ping {}", ttl);
        }

        if ttl == 0 {
            tracing::info!("TTL has reached 0, PingPong has successfully completed");
            *self.finished.lock() = Some(context.now);
            return;
        }
        match session.net() {
            Some(net) => net.send(self.peer.clone(), Arc::new(Self::message(ttl - 1))),
            None => tracing::error!(node = context.node, "PingPong lost its network"),
        }
    }
}
