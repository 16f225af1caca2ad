//! Virtual-time scheduling of deliveries.
//!
//! Nothing in the simulator sleeps. A delivery is given a due time on the
//! [`Timeline`] and runs when the timeline is stepped past it. Deliveries
//! run one at a time, in order of due time and then of scheduling, so a run
//! with a given seed always unfolds the same way.

use crate::{
    admission::{AcceptAll, AdmissionController},
    message::MessagePtr,
    session::{ClientSession, ServerSession},
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
    fmt::{self, Debug, Formatter},
    sync::Arc,
    time::Duration,
};

/// An identifier for a particular node in the simulation.
pub type NodeId = u64;

/// The execution context a callback runs in: which node it runs on and what
/// time it is there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeContext {
    pub node: NodeId,
    pub now: Duration,
}

/// What a task delivers when it runs.
pub enum TaskKind {
    /// A request arriving at a server session
    Request {
        session: Arc<ServerSession>,
        message: MessagePtr,
    },
    /// A reply arriving back at the client session that sent the request
    Reply {
        session: Arc<ClientSession>,
        message: MessagePtr,
    },
}

impl TaskKind {
    /// The message being delivered.
    pub fn message(&self) -> &MessagePtr {
        match self {
            TaskKind::Request { message, .. } | TaskKind::Reply { message, .. } => message,
        }
    }
}

/// A delivery waiting on the timeline.
pub struct Task {
    /// The node the delivery runs on
    pub node: NodeId,
    /// When the delivery runs
    pub due: Duration,
    /// The number of tasks already waiting for the same node
    pub queued_ahead: usize,
    pub kind: TaskKind,
    seq: u64,
}

impl Task {
    fn run(self, now: Duration) {
        let context = NodeContext {
            node: self.node,
            now,
        };
        // Dropping the guard restores the caller's span on every exit path.
        let _span = tracing::debug_span!("node", node = self.node).entered();
        match self.kind {
            TaskKind::Request { session, message } => session.on_request_delivered(&context, message),
            TaskKind::Reply { session, message } => session.on_reply_delivered(&context, message),
        }
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("node", &self.node)
            .field("due", &self.due)
            .field("message", &self.kind.message().id())
            .finish()
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

#[derive(Default)]
struct State {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Task>>,
    queued: FxHashMap<NodeId, usize>,
}

/// A queue of deliveries ordered by virtual time.
pub struct Timeline {
    state: Mutex<State>,
    admission: Box<dyn AdmissionController>,
}

impl Timeline {
    /// Creates an empty timeline that admits every task.
    pub fn new() -> Self {
        Self::with_admission(Box::new(AcceptAll))
    }

    /// Creates an empty timeline that asks `admission` before queueing a
    /// task.
    pub fn with_admission(admission: Box<dyn AdmissionController>) -> Self {
        Self {
            state: Default::default(),
            admission,
        }
    }

    /// The current virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// The number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Queues a delivery to run on `node` after `delay`. Returns whether the
    /// admission controller accepted it.
    ///
    /// The controller is consulted while the queue is locked, so the count
    /// it sees cannot change before the task is pushed. It must not call
    /// back into the timeline.
    pub fn schedule(&self, node: NodeId, delay: Duration, kind: TaskKind) -> bool {
        let mut state = self.state.lock();
        let task = Task {
            node,
            due: state.now + delay,
            queued_ahead: state.queued.get(&node).copied().unwrap_or(0),
            kind,
            seq: state.next_seq,
        };

        if !self.admission.is_task_accepted(&task) {
            drop(state);
            tracing::warn!(
                node,
                message = task.kind.message().id(),
                queued_ahead = task.queued_ahead,
                "admission controller rejected delivery"
            );
            return false;
        }

        state.next_seq += 1;
        *state.queued.entry(node).or_default() += 1;
        state.queue.push(Reverse(task));
        true
    }

    /// Runs the earliest task, advancing the clock to its due time. Returns
    /// false when no task was waiting.
    pub fn step(&self) -> bool {
        self.step_until(None)
    }

    fn step_until(&self, deadline: Option<Duration>) -> bool {
        let (task, now) = {
            let mut state = self.state.lock();
            match state.queue.peek() {
                Some(Reverse(task)) if deadline.map_or(true, |deadline| task.due <= deadline) => {}
                _ => return false,
            }
            let Some(Reverse(task)) = state.queue.pop() else {
                return false;
            };
            state.now = state.now.max(task.due);
            if let Some(count) = state.queued.get_mut(&task.node) {
                *count -= 1;
                if *count == 0 {
                    state.queued.remove(&task.node);
                }
            }
            (task, state.now)
        };
        task.run(now);
        true
    }

    /// Runs tasks until none are left, including tasks scheduled by the
    /// tasks that ran. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.step() {
            ran += 1;
        }
        ran
    }

    /// Runs every task due at or before `deadline`, then advances the clock
    /// to `deadline`. Returns how many ran.
    pub fn run_until(&self, deadline: Duration) -> usize {
        let mut ran = 0;
        while self.step_until(Some(deadline)) {
            ran += 1;
        }
        let mut state = self.state.lock();
        state.now = state.now.max(deadline);
        ran
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Timeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Timeline")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}
