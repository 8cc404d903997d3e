/// Priority tier of a queued task, lowest to highest.
///
/// Restoring previously-computed shards from disk always preempts fresh
/// analysis, and boosted files preempt the bulk backlog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueuePriority {
    IndexFile,
    IndexBoostedFile,
    LoadShards,
}

impl QueuePriority {
    pub(crate) const COUNT: usize = 3;

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// OS thread priority a task should run at, honored best-effort.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThreadPriority {
    Low,
    Normal,
}

/// A unit of queued work.
///
/// Tasks are transient: created by producers, consumed exactly once by a
/// worker, never persisted.
pub struct Task {
    action: Box<dyn FnOnce() + Send + 'static>,
    pub(crate) queue_priority: QueuePriority,
    pub(crate) tag: Option<String>,
    pub(crate) thread_priority: ThreadPriority,
}

impl Task {
    /// Background work defaults to the lowest tier and a low thread priority.
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Box::new(action),
            queue_priority: QueuePriority::IndexFile,
            tag: None,
            thread_priority: ThreadPriority::Low,
        }
    }

    pub fn with_priority(mut self, priority: QueuePriority) -> Self {
        self.queue_priority = priority;
        self
    }

    /// Tag used by [`crate::TaskQueue::boost`] to find this task later.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_thread_priority(mut self, priority: ThreadPriority) -> Self {
        self.thread_priority = priority;
        self
    }

    pub fn queue_priority(&self) -> QueuePriority {
        self.queue_priority
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub(crate) fn run(self) {
        (self.action)();
    }
}
