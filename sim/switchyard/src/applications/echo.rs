use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use switchyard_core::{Message, MessagePtr, NodeContext, RpcHandler, ServerSession};

/// Answers every request with a reply carrying the request's body.
#[derive(Debug, Default)]
pub struct Echo {
    served: AtomicUsize,
}

impl Echo {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// The number of requests answered so far.
    pub fn served(&self) -> usize {
        self.served.load(Ordering::Relaxed)
    }
}

impl RpcHandler for Echo {
    fn on_recv_request(&self, context: &NodeContext, session: &Arc<ServerSession>, request: MessagePtr) {
        tracing::debug!(node = context.node, request = %request, "echoing");
        self.served.fetch_add(1, Ordering::Relaxed);
        session.send(Arc::new(Message::reply_to(&request, request.body_to_vec())));
    }
}
