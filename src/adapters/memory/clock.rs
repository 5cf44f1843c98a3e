//! Settable clock for tests and local runs.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::ports::Clock;

/// Clock that only moves when told to. Second precision.
#[derive(Debug, Clone)]
pub struct ManualClock {
    secs: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(start.as_unix_secs())),
        }
    }

    pub fn set(&self, to: Timestamp) {
        self.secs.store(to.as_unix_secs(), Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i64) {
        self.secs.fetch_add(days * 86_400, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_secs(self.secs.load(Ordering::SeqCst)).unwrap_or_default()
    }
}
