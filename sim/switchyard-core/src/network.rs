//! Simulated network endpoints.
//!
//! A [`SimNetwork`] is one node's attachment to the [`Fabric`]. Starting it
//! binds its address in the switch table of one channel, after which any
//! other network on the same fabric can reach it through a
//! [`ClientSession`]. Incoming requests and unmatched replies are handed to
//! the node's [`RpcHandler`].

use crate::{
    address::{Address, Channel},
    fabric::Fabric,
    logging::{binding_event, node_creation_event},
    message::MessagePtr,
    session::{ClientSession, ServerSession},
    switch::RegisterError,
    timeline::{NodeContext, NodeId},
    FxDashMap,
};
use parking_lot::{Mutex, RwLock};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::{
    fmt::{self, Debug, Formatter},
    sync::{Arc, Weak},
    time::Duration,
};
use thiserror::Error as ThisError;

/// The application side of a node: what runs when traffic arrives.
pub trait RpcHandler: Send + Sync {
    /// Called when a request is delivered. Answer it with
    /// [`ServerSession::send`].
    fn on_recv_request(&self, context: &NodeContext, session: &Arc<ServerSession>, request: MessagePtr);

    /// Called when a reply arrives that no [`ClientSession::call`] is waiting
    /// for.
    fn on_recv_reply(&self, context: &NodeContext, session: &Arc<ClientSession>, reply: MessagePtr) {
        let _ = session;
        tracing::debug!(node = context.node, message = reply.id(), "ignoring reply");
    }

    /// Called once a message has been handed to the simulated network.
    fn on_send_completed(&self, context: &NodeContext, message: &MessagePtr) {
        let _ = (context, message);
    }
}

/// One node's endpoint on the simulated network.
pub struct SimNetwork {
    node: NodeId,
    host: Arc<str>,
    fabric: Arc<Fabric>,
    me: Weak<SimNetwork>,
    address: RwLock<Address>,
    bindings: Mutex<Vec<(Channel, Address)>>,
    rng: Mutex<SmallRng>,
    handler: Option<Arc<dyn RpcHandler>>,
    client_sessions: FxDashMap<Address, Arc<ClientSession>>,
    server_sessions: FxDashMap<Address, Arc<ServerSession>>,
}

impl SimNetwork {
    /// Creates a network for a node named `host`. Until it is started the
    /// network's address is `localhost:1`.
    pub fn new(
        fabric: &Arc<Fabric>,
        host: impl Into<Arc<str>>,
        handler: Option<Arc<dyn RpcHandler>>,
    ) -> Arc<Self> {
        let host = host.into();
        let node = fabric.next_node_id();
        let seed = fabric.config().tools.simulator.seed;
        node_creation_event(node, &host);
        Arc::new_cyclic(|me| Self {
            node,
            host,
            fabric: fabric.clone(),
            me: me.clone(),
            address: RwLock::new(Address::localhost(1)),
            bindings: Default::default(),
            rng: Mutex::new(SmallRng::seed_from_u64(seed.wrapping_add(node))),
            handler,
            client_sessions: Default::default(),
            server_sessions: Default::default(),
        })
    }

    /// Binds this network to `port` on `channel`.
    ///
    /// The primary address is `host:port`. The network also tries to claim
    /// `localhost:port`; if another network already holds that alias the
    /// collision is logged and ignored. A client-only network takes the
    /// address but registers nothing, so it can send but cannot be reached.
    pub fn start(self: &Arc<Self>, channel: Channel, port: u16, client_only: bool) -> Result<(), StartError> {
        let address = Address::new(self.host.clone(), port);
        *self.address.write() = address.clone();
        if client_only {
            return Ok(());
        }

        let table = self.fabric.switch().table(channel);
        table.register(address.clone(), self)?;
        binding_event(self.node, &address, &channel.to_string(), true);
        let mut bindings = self.bindings.lock();
        bindings.push((channel, address));

        let loopback = Address::localhost(port);
        if loopback.host != self.host {
            match table.register(loopback.clone(), self) {
                Ok(()) => bindings.push((channel, loopback)),
                Err(e) => tracing::debug!(node = self.node, "keeping the existing alias: {}", e),
            }
        }
        Ok(())
    }

    /// Releases every address this network registered and tears down its
    /// sessions. Calls still waiting on this network's client sessions
    /// observe a closed channel.
    pub fn stop(self: &Arc<Self>) {
        for (channel, address) in self.bindings.lock().drain(..) {
            if self.fabric.switch().table(channel).unregister(&address, self) {
                binding_event(self.node, &address, &channel.to_string(), false);
            }
        }
        for session in self.client_sessions.iter() {
            session.matcher().clear();
        }
        self.client_sessions.clear();
        self.server_sessions.clear();
    }

    /// The node this network belongs to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The node's host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The address the network was last started on.
    pub fn address(&self) -> Address {
        self.address.read().clone()
    }

    /// The fabric the network is attached to.
    pub fn fabric(&self) -> &Arc<Fabric> {
        &self.fabric
    }

    /// The context callbacks on this node run in, as of now.
    pub fn context(&self) -> NodeContext {
        NodeContext {
            node: self.node,
            now: self.fabric.timeline().now(),
        }
    }

    /// Draws a delay uniformly between the fabric's configured minimum and
    /// maximum.
    pub fn net_delay(&self) -> Duration {
        let simulator = &self.fabric.config().tools.simulator;
        let micros = self.rng.lock().gen_range(
            simulator.min_message_delay_microseconds..=simulator.max_message_delay_microseconds,
        );
        Duration::from_micros(micros.into())
    }

    /// The delay for a message between `from` and `to`. Messages a node sends
    /// to its own address arrive without delay.
    pub fn delay_for(&self, from: &Address, to: &Address) -> Duration {
        if from == to {
            Duration::ZERO
        } else {
            self.net_delay()
        }
    }

    /// Returns the client session to `remote`, creating it on first use.
    pub fn client_session(&self, remote: Address) -> Arc<ClientSession> {
        self.client_sessions
            .entry(remote.clone())
            .or_insert_with(|| Arc::new(ClientSession::new(self.me.clone(), remote)))
            .clone()
    }

    /// Sends `message` to `to`. See [`ClientSession::send`].
    pub fn send(&self, to: Address, message: MessagePtr) {
        self.client_session(to).send(message)
    }

    /// Sends `message` to `to` and returns a receiver for its reply. See
    /// [`ClientSession::call`].
    pub fn call(&self, to: Address, message: MessagePtr) -> tokio::sync::oneshot::Receiver<MessagePtr> {
        self.client_session(to).call(message)
    }

    /// The server session accepted from `remote`, if any.
    pub fn server_session(&self, remote: &Address) -> Option<Arc<ServerSession>> {
        self.server_sessions.get(remote).map(|session| session.clone())
    }

    /// The number of peers this network has accepted sessions from.
    pub fn server_session_count(&self) -> usize {
        self.server_sessions.len()
    }

    /// Returns the server session for `remote`, accepting one on first
    /// contact. The session answers through `client` from now on.
    pub(crate) fn accept_from(&self, remote: Address, client: &Arc<ClientSession>) -> Arc<ServerSession> {
        let session = self
            .server_sessions
            .entry(remote.clone())
            .or_insert_with(|| {
                tracing::debug!(node = self.node, remote = %remote, "accepted server session");
                Arc::new(ServerSession::new(self.me.clone(), remote, client.clone()))
            })
            .clone();
        session.attach(client);
        session
    }

    /// The client session that is waiting for the reply to request `id`.
    pub(crate) fn waiting_session(&self, id: u64) -> Option<Arc<ClientSession>> {
        self.client_sessions
            .iter()
            .find(|session| session.matcher().is_waiting(id))
            .map(|session| session.value().clone())
    }

    pub(crate) fn dispatch_request(&self, context: &NodeContext, session: &Arc<ServerSession>, request: MessagePtr) {
        match &self.handler {
            Some(handler) => handler.on_recv_request(context, session, request),
            None => tracing::warn!(
                node = self.node,
                message = request.id(),
                "no handler for request, dropping"
            ),
        }
    }

    pub(crate) fn dispatch_reply(&self, context: &NodeContext, session: &Arc<ClientSession>, reply: MessagePtr) {
        match &self.handler {
            Some(handler) => handler.on_recv_reply(context, session, reply),
            None => tracing::debug!(node = self.node, message = reply.id(), "dropping unmatched reply"),
        }
    }

    pub(crate) fn on_send_completed(&self, message: &MessagePtr) {
        if let Some(handler) = &self.handler {
            handler.on_send_completed(&self.context(), message);
        }
    }
}

impl Debug for SimNetwork {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimNetwork")
            .field("node", &self.node)
            .field("address", &*self.address.read())
            .field("client_sessions", &self.client_sessions.len())
            .field("server_sessions", &self.server_sessions.len())
            .finish()
    }
}

/// An error that occurs while starting a [`SimNetwork`].
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum StartError {
    #[error(transparent)]
    AddressInUse(#[from] RegisterError),
}
