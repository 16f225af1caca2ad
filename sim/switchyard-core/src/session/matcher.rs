use crate::{message::MessagePtr, FxDashMap};
use tokio::sync::oneshot;

/// Correlates outstanding requests with the replies that answer them, by
/// message id.
#[derive(Debug, Default)]
pub struct ClientMatcher {
    pending: FxDashMap<u64, oneshot::Sender<MessagePtr>>,
}

impl ClientMatcher {
    /// Creates a matcher with nothing outstanding.
    pub fn new() -> Self {
        Default::default()
    }

    /// Starts waiting for the reply to request `id`.
    pub fn register(&self, id: u64) -> oneshot::Receiver<MessagePtr> {
        let (sender, receiver) = oneshot::channel();
        if self.pending.insert(id, sender).is_some() {
            tracing::warn!(id, "replaced an outstanding request with the same id");
        }
        receiver
    }

    /// Hands `reply` to whoever is waiting for it. Gives the reply back if
    /// nobody registered its id.
    pub fn complete(&self, reply: MessagePtr) -> Result<(), MessagePtr> {
        match self.pending.remove(&reply.id()) {
            Some((id, sender)) => {
                if sender.send(reply).is_err() {
                    tracing::debug!(id, "reply arrived after its caller stopped waiting");
                }
                Ok(())
            }
            None => Err(reply),
        }
    }

    /// Stops waiting for request `id`. The waiting caller observes a closed
    /// channel. Returns whether anything was waiting.
    pub fn cancel(&self, id: u64) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Cancels every outstanding request.
    pub fn clear(&self) {
        self.pending.clear();
    }

    /// Whether a caller is waiting for the reply to request `id`.
    pub fn is_waiting(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    /// The number of requests still waiting for a reply.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}
