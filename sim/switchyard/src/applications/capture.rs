use parking_lot::Mutex;
use std::sync::Arc;
use switchyard_core::{MessagePtr, NodeContext, RpcHandler, ServerSession};

/// An application that stores the requests it receives, up to a limit, along
/// with the time each arrived.
#[derive(Debug)]
pub struct Capture {
    received: Mutex<Vec<(NodeContext, MessagePtr)>>,
    capacity: usize,
}

impl Capture {
    /// Creates a capture that keeps the first `capacity` requests.
    pub fn new(capacity: usize) -> Self {
        Self {
            received: Default::default(),
            capacity,
        }
    }

    pub fn new_shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// Gets the first request that was received.
    pub fn message(&self) -> Option<MessagePtr> {
        self.received.lock().first().map(|(_, message)| message.clone())
    }

    /// Gets every request kept so far, with the context it arrived in.
    pub fn messages(&self) -> Vec<(NodeContext, MessagePtr)> {
        self.received.lock().clone()
    }

    pub fn is_full(&self) -> bool {
        self.received.lock().len() >= self.capacity
    }
}

impl RpcHandler for Capture {
    fn on_recv_request(&self, context: &NodeContext, _session: &Arc<ServerSession>, request: MessagePtr) {
        let mut received = self.received.lock();
        if received.len() < self.capacity {
            received.push((*context, request));
        } else {
            tracing::debug!(node = context.node, "capture full, ignoring {}", request);
        }
    }
}
