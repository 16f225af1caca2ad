use super::{virtual_send, ClientMatcher};
use crate::{
    address::Address,
    logging::message_event,
    message::MessagePtr,
    network::SimNetwork,
    timeline::{NodeContext, TaskKind},
};
use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::sync::oneshot;

/// The sending half of a session: requests go out through it and the
/// matching replies come back to it.
pub struct ClientSession {
    remote: Address,
    net: Weak<SimNetwork>,
    matcher: ClientMatcher,
}

impl ClientSession {
    pub(crate) fn new(net: Weak<SimNetwork>, remote: Address) -> Self {
        Self {
            remote,
            net,
            matcher: ClientMatcher::new(),
        }
    }

    /// The address requests are sent to.
    pub fn remote(&self) -> &Address {
        &self.remote
    }

    /// The network the session belongs to, if it still exists.
    pub fn net(&self) -> Option<Arc<SimNetwork>> {
        self.net.upgrade()
    }

    /// Outstanding requests made with [`ClientSession::call`].
    pub fn matcher(&self) -> &ClientMatcher {
        &self.matcher
    }

    /// Sends a copy of `message` to the remote address.
    ///
    /// The channel is the one bound to the message's RPC code. If nothing is
    /// registered at the remote address on that channel the message is
    /// dropped and a warning is logged. A request that cannot be copied or
    /// is refused admission is dropped the same way, and leaves no session
    /// behind at the destination. On success the destination network
    /// gets the copy after its simulated delay, and the local handler hears
    /// about the send immediately.
    pub fn send(self: &Arc<Self>, message: MessagePtr) {
        let Some(net) = self.net.upgrade() else {
            tracing::warn!(message = message.id(), "client session outlived its network");
            self.matcher.cancel(message.id());
            return;
        };
        let fabric = net.fabric();
        let channel = fabric.codes().channel_of(message.rpc_code());

        let Some(remote_net) = fabric.switch().table(channel).lookup(&self.remote) else {
            tracing::warn!(
                "cannot find destination node {} on channel {} in simulator",
                self.remote,
                channel
            );
            self.matcher.cancel(message.id());
            return;
        };

        let from = net.address();
        let received = match virtual_send(
            &message,
            from.clone(),
            self.remote.clone(),
            fabric.config().network.max_body_length,
        ) {
            Ok(received) => received,
            Err(e) => {
                tracing::error!(message = message.id(), "failed to copy request: {}", e);
                self.matcher.cancel(message.id());
                return;
            }
        };
        let delay = remote_net.delay_for(&from, &self.remote);
        let server_session = remote_net.accept_from(from.clone(), self);
        message_event(&from, &self.remote, &received, delay);
        if !server_session.on_recv_request(Arc::new(received), delay) {
            self.matcher.cancel(message.id());
            return;
        }

        net.on_send_completed(&message);
    }

    /// Sends `message` and returns a receiver for its reply.
    ///
    /// The receiver reports a closed channel if the request could not be
    /// delivered or the session was torn down before the reply arrived.
    pub fn call(self: &Arc<Self>, message: MessagePtr) -> oneshot::Receiver<MessagePtr> {
        let reply = self.matcher.register(message.id());
        self.send(message);
        reply
    }

    /// Queues a reply for delivery on this session's node after `delay`.
    /// Returns whether it was queued.
    pub(crate) fn on_recv_reply(self: &Arc<Self>, message: MessagePtr, delay: Duration) -> bool {
        let Some(net) = self.net.upgrade() else {
            tracing::debug!(message = message.id(), "dropping reply for a removed network");
            return false;
        };
        net.fabric().timeline().schedule(
            net.node(),
            delay,
            TaskKind::Reply {
                session: self.clone(),
                message,
            },
        )
    }

    pub(crate) fn on_reply_delivered(self: &Arc<Self>, context: &NodeContext, message: MessagePtr) {
        let Err(message) = self.matcher.complete(message) else {
            return;
        };
        match self.net.upgrade() {
            Some(net) => net.dispatch_reply(context, self, message),
            None => tracing::debug!(message = message.id(), "dropping unmatched reply"),
        }
    }
}

impl Debug for ClientSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSession")
            .field("remote", &self.remote)
            .field("outstanding", &self.matcher.outstanding())
            .finish()
    }
}
