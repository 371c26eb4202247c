use pingfan_model::ReportEntry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Bounded report buffer shared by every worker and the reporter.
///
/// Producers never block: once `capacity` entries are waiting, further submissions are
/// dropped (the newest entry loses, queued ones are kept). The reader takes the whole
/// content in one step.
#[derive(Debug)]
pub struct ReportQueue {
    capacity: usize,
    state: Mutex<QueueState>,
    ready: Condvar,
    dropped: AtomicU64,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: Vec<ReportEntry>,
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropReason {
    Full,
    Closed,
}

impl DropReason {
    fn as_str(self) -> &'static str {
        match self {
            DropReason::Full => "queue full",
            DropReason::Closed => "queue closed",
        }
    }
}

impl QueueState {
    fn drop_reason(&self, capacity: usize) -> Option<DropReason> {
        if self.closed {
            Some(DropReason::Closed)
        } else if self.entries.len() >= capacity {
            Some(DropReason::Full)
        } else {
            None
        }
    }
}

/// A batch returned by [`ReportQueue::wait_drain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drained {
    pub entries: Vec<ReportEntry>,
    pub closed: bool,
}

impl Default for ReportQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ReportQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState::default()),
            ready: Condvar::new(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries discarded because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn submit(&self, entry: ReportEntry) {
        let mut state = self.lock();
        if let Some(reason) = state.drop_reason(self.capacity) {
            drop(state);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                host = %entry.target,
                reason = reason.as_str(),
                "report queue entry dropped"
            );
            return;
        }
        state.entries.push(entry);
        drop(state);
        self.ready.notify_one();
    }

    /// Takes everything currently queued. Returns immediately, possibly with nothing.
    pub fn drain_all(&self) -> Vec<ReportEntry> {
        std::mem::take(&mut self.lock().entries)
    }

    /// Blocks until at least one entry is queued or the queue is closed, then drains.
    pub fn wait_drain(&self) -> Drained {
        let mut state = self.lock();
        while state.entries.is_empty() && !state.closed {
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Drained {
            entries: std::mem::take(&mut state.entries),
            closed: state.closed,
        }
    }

    /// Stops accepting entries and wakes the reader. Queued entries stay drainable.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    // A panicking producer cannot leave the Vec half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
