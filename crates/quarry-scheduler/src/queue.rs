use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use quarry_core::panic_payload_to_str;

use crate::pool::ThreadPriorityGuard;
use crate::stats::{QueueStats, StatsReceiver, StatsSender};
use crate::task::{QueuePriority, Task};

struct QueueState {
    pending: [VecDeque<Task>; QueuePriority::COUNT],
    stats: QueueStats,
    stopped: bool,
}

impl QueueState {
    fn pending_is_empty(&self) -> bool {
        self.pending.iter().all(VecDeque::is_empty)
    }

    fn pop_next(&mut self) -> Option<Task> {
        // Highest tier wins; within a tier, whatever order the producer
        // appended (producers shuffle their batches before insertion, so
        // this is deliberately not a fairness guarantee).
        self.pending
            .iter_mut()
            .rev()
            .find_map(|tier| tier.pop_front())
    }
}

/// Shared priority queue drained by the worker pool.
///
/// Producers call [`TaskQueue::append`], workers run [`TaskQueue::work`] in a
/// loop, and anyone may call [`TaskQueue::stop`] to shut the pool down.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    work_available: Condvar,
    drained: Condvar,
    stats: StatsSender,
}

impl TaskQueue {
    pub fn new(stats_capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: Default::default(),
                stats: QueueStats::default(),
                stopped: false,
            }),
            work_available: Condvar::new(),
            drained: Condvar::new(),
            stats: StatsSender::new(stats_capacity),
        }
    }

    /// Enqueue a batch of tasks. Safe to call concurrently with draining
    /// workers; tasks appended after [`TaskQueue::stop`] are dropped.
    pub fn append(&self, tasks: Vec<Task>) {
        if tasks.is_empty() {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.stopped {
                tracing::debug!(
                    target = "quarry.scheduler",
                    dropped = tasks.len(),
                    "queue stopped; dropping appended tasks"
                );
                return;
            }
            for task in tasks {
                state.stats.enqueued += 1;
                let tier = task.queue_priority.index();
                state.pending[tier].push_back(task);
            }
            self.stats.send(state.stats);
        }
        self.work_available.notify_all();
    }

    pub fn push(&self, task: Task) {
        self.append(vec![task]);
    }

    /// Raise every pending task carrying `tag` to `priority`.
    ///
    /// Never lowers a tier, and has no effect on tasks already running.
    pub fn boost(&self, tag: &str, priority: QueuePriority) {
        let mut state = self.state.lock();
        let mut promoted = Vec::new();
        for tier in 0..priority.index() {
            let queue = &mut state.pending[tier];
            let mut i = 0;
            while i < queue.len() {
                if queue[i].tag.as_deref() == Some(tag) {
                    promoted.extend(queue.remove(i));
                } else {
                    i += 1;
                }
            }
        }
        if promoted.is_empty() {
            return;
        }
        tracing::debug!(
            target = "quarry.scheduler",
            tag,
            count = promoted.len(),
            ?priority,
            "boosted pending tasks"
        );
        for mut task in promoted {
            task.queue_priority = priority;
            state.pending[priority.index()].push_back(task);
        }
    }

    /// A worker's run-loop: execute tasks until the queue is stopped.
    ///
    /// When the last running task finishes and nothing is pending, exactly
    /// one worker invokes `on_idle` before going back to sleep.
    pub fn work(&self, on_idle: impl Fn()) {
        loop {
            let task = {
                let mut state = self.state.lock();
                loop {
                    if state.stopped {
                        return;
                    }
                    if let Some(task) = state.pop_next() {
                        state.stats.active += 1;
                        self.stats.send(state.stats);
                        break task;
                    }
                    self.work_available.wait(&mut state);
                }
            };

            {
                let _priority = ThreadPriorityGuard::apply(task.thread_priority);
                if let Err(payload) =
                    std::panic::catch_unwind(AssertUnwindSafe(|| task.run()))
                {
                    tracing::error!(
                        target = "quarry.scheduler",
                        panic = %panic_payload_to_str(&*payload),
                        "task panicked"
                    );
                }
            }

            let (went_idle, drained) = {
                let mut state = self.state.lock();
                state.stats.completed += 1;
                let idle = state.pending_is_empty() && state.stats.active == 1;
                if idle {
                    state.stats.last_idle = state.stats.completed;
                }
                state.stats.active -= 1;
                self.stats.send(state.stats);
                let drained = state.stats.active == 0
                    && (state.stopped || state.pending_is_empty());
                (idle, drained)
            };
            // The idle callback runs before waiters wake so whatever it
            // publishes is visible to anyone returning from
            // `block_until_idle`.
            if went_idle {
                on_idle();
            }
            if drained {
                self.drained.notify_all();
            }
        }
    }

    /// Wake blocked workers and let them exit. In-flight tasks finish;
    /// pending tasks are abandoned. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.work_available.notify_all();
        self.drained.notify_all();
    }

    /// Wait until nothing is pending or running, or until `timeout` expires.
    /// Returns whether the queue actually went idle.
    pub fn block_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !(state.stats.active == 0 && (state.stopped || state.pending_is_empty())) {
            if self.drained.wait_until(&mut state, deadline).timed_out() {
                return false;
            }
        }
        true
    }

    pub fn stats(&self) -> QueueStats {
        self.state.lock().stats
    }

    pub fn subscribe_stats(&self) -> StatsReceiver {
        self.stats.subscribe()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(1024)
    }
}
