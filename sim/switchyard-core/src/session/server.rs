use super::{virtual_send, ClientSession};
use crate::{
    address::Address,
    logging::message_event,
    message::MessagePtr,
    network::SimNetwork,
    timeline::{NodeContext, TaskKind},
};
use parking_lot::RwLock;
use std::{
    fmt::{self, Debug, Formatter},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

/// The receiving half of a session. A network keeps one per peer address and
/// answers that peer's requests through it.
pub struct ServerSession {
    remote: Address,
    net: Weak<SimNetwork>,
    client: RwLock<Arc<ClientSession>>,
    received: AtomicU64,
}

impl ServerSession {
    pub(crate) fn new(net: Weak<SimNetwork>, remote: Address, client: Arc<ClientSession>) -> Self {
        Self {
            remote,
            net,
            client: RwLock::new(client),
            received: AtomicU64::new(0),
        }
    }

    /// The address of the peer whose requests arrive here.
    pub fn remote(&self) -> &Address {
        &self.remote
    }

    /// The network the session belongs to, if it still exists.
    pub fn net(&self) -> Option<Arc<SimNetwork>> {
        self.net.upgrade()
    }

    /// The client session on the other side that most recently sent a
    /// request here.
    pub fn client(&self) -> Arc<ClientSession> {
        self.client.read().clone()
    }

    /// Records `client` as the peer's current client session.
    pub(crate) fn attach(&self, client: &Arc<ClientSession>) {
        let mut current = self.client.write();
        if !Arc::ptr_eq(&current, client) {
            *current = client.clone();
        }
    }

    /// The client session a reply to request `id` belongs to: the peer's
    /// session still waiting on that id, or else the most recent one.
    fn reply_target(&self, id: u64) -> Arc<ClientSession> {
        let client = self.client();
        client
            .net()
            .and_then(|peer| peer.waiting_session(id))
            .unwrap_or(client)
    }

    /// The number of requests delivered through this session.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Sends a copy of `reply` back to the peer's client session after this
    /// network's simulated delay.
    ///
    /// The reply goes to whichever of the peer's client sessions is waiting
    /// for its id, so a peer that reaches this node through several
    /// addresses gets each reply on the session that asked.
    pub fn send(self: &Arc<Self>, reply: MessagePtr) {
        let Some(net) = self.net.upgrade() else {
            tracing::warn!(message = reply.id(), "server session outlived its network");
            return;
        };
        let from = net.address();
        let received = match virtual_send(
            &reply,
            from.clone(),
            self.remote.clone(),
            net.fabric().config().network.max_body_length,
        ) {
            Ok(received) => received,
            Err(e) => {
                tracing::error!(message = reply.id(), "failed to copy reply: {}", e);
                return;
            }
        };
        let delay = net.delay_for(&from, &self.remote);
        let client = self.reply_target(reply.id());
        message_event(&from, &self.remote, &received, delay);
        if !client.on_recv_reply(Arc::new(received), delay) {
            client.matcher().cancel(reply.id());
            return;
        }

        net.on_send_completed(&reply);
    }

    /// Queues a request for delivery on this session's node after `delay`.
    /// Returns whether it was queued.
    pub(crate) fn on_recv_request(self: &Arc<Self>, message: MessagePtr, delay: Duration) -> bool {
        let Some(net) = self.net.upgrade() else {
            tracing::debug!(message = message.id(), "dropping request for a removed network");
            return false;
        };
        net.fabric().timeline().schedule(
            net.node(),
            delay,
            TaskKind::Request {
                session: self.clone(),
                message,
            },
        )
    }

    pub(crate) fn on_request_delivered(self: &Arc<Self>, context: &NodeContext, message: MessagePtr) {
        self.received.fetch_add(1, Ordering::Relaxed);
        match self.net.upgrade() {
            Some(net) => net.dispatch_request(context, self, message),
            None => tracing::debug!(message = message.id(), "dropping request for a removed network"),
        }
    }
}

impl Debug for ServerSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSession")
            .field("remote", &self.remote)
            .field("received", &self.received())
            .finish()
    }
}
