use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use event_listener::{Event, EventListener};
use tracing::trace;

const DEFAULT_EVENT_ORDERING: Ordering = Ordering::SeqCst;

/// One-shot signal that stays raised once raised.
///
/// Used as the shutdown handle for dispatchers and per-space workers.
#[derive(Debug)]
pub struct StickySignal {
    flag: AtomicBool,
    event: Event,
}

impl StickySignal {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            flag: AtomicBool::new(false),
            event: Event::new(),
        })
    }

    pub fn is_raised(&self) -> bool {
        self.flag.load(DEFAULT_EVENT_ORDERING)
    }

    pub fn raise(&self) {
        self.flag.store(true, DEFAULT_EVENT_ORDERING);
        self.event.notify(usize::MAX);
    }

    pub async fn listen(&self) {
        if self.is_raised() {
            trace!("signal raised before listen");
            return;
        }

        let listener = self.event.listen();

        // re-check, raise may have happened between the check and the listen
        if self.is_raised() {
            trace!("signal raised while registering");
            return;
        }

        listener.await
    }
}

/// Monotonic change counter with wake-all notification.
///
/// Stores publish a new change number on every mutation; listeners compare
/// against the last value they have seen.
#[derive(Debug)]
pub struct ChangePublisher {
    current: AtomicI64,
    event: Event,
}

impl Default for ChangePublisher {
    fn default() -> Self {
        Self {
            current: AtomicI64::new(0),
            event: Event::new(),
        }
    }
}

impl ChangePublisher {
    pub fn current_change(&self) -> i64 {
        self.current.load(DEFAULT_EVENT_ORDERING)
    }

    /// record one more change and wake every listener
    pub fn bump(&self) {
        self.current.fetch_add(1, DEFAULT_EVENT_ORDERING);
        self.event.notify(usize::MAX);
    }

    pub fn listen(&self) -> EventListener {
        self.event.listen()
    }
}
