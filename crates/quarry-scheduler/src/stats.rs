use tokio::sync::broadcast;

/// Counters describing the queue's progress.
///
/// `last_idle` records the `completed` count at the most recent moment the
/// queue drained completely; consumers use it to distinguish "still busy"
/// from "went idle and picked work back up".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: usize,
    pub active: usize,
    pub completed: usize,
    pub last_idle: usize,
}

pub type StatsReceiver = broadcast::Receiver<QueueStats>;

/// Broadcast side of the queue's progress feed.
///
/// Sending never blocks; lagging receivers lose intermediate snapshots
/// rather than slowing down task execution.
#[derive(Clone)]
pub struct StatsSender {
    tx: broadcast::Sender<QueueStats>,
}

impl StatsSender {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> StatsReceiver {
        self.tx.subscribe()
    }

    pub(crate) fn send(&self, stats: QueueStats) {
        // No receivers is fine; stats are purely observational.
        let _ = self.tx.send(stats);
    }
}
