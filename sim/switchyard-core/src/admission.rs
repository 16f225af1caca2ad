//! Admission control for queued deliveries.

use crate::timeline::Task;

/// Decides whether a task may join the delivery queue.
///
/// The [`Timeline`](crate::Timeline) asks before queueing each delivery; a
/// rejected delivery is dropped.
pub trait AdmissionController: Send + Sync {
    fn is_task_accepted(&self, task: &Task) -> bool;
}

/// Admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AdmissionController for AcceptAll {
    fn is_task_accepted(&self, _task: &Task) -> bool {
        true
    }
}

/// Admits a task only while fewer than `capacity` tasks are already waiting
/// for the same node.
#[derive(Debug, Clone, Copy)]
pub struct BoundedQueue {
    capacity: usize,
}

impl BoundedQueue {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl AdmissionController for BoundedQueue {
    fn is_task_accepted(&self, task: &Task) -> bool {
        task.queued_ahead < self.capacity
    }
}

impl<F> AdmissionController for F
where
    F: Fn(&Task) -> bool + Send + Sync,
{
    fn is_task_accepted(&self, task: &Task) -> bool {
        self(task)
    }
}
