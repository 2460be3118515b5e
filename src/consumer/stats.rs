//! Statistics for listeners

use std::sync::atomic::{AtomicU64, Ordering};

/// Live listener counters
#[derive(Debug, Default)]
pub struct ListenerCounters {
    /// Messages decoded and handed to the handler
    pub delivered: AtomicU64,
    /// Messages that failed to decode
    pub malformed: AtomicU64,
    /// Handler invocations that panicked
    pub handler_failures: AtomicU64,
    /// Connection losses observed while polling
    pub connection_losses: AtomicU64,
}

impl ListenerCounters {
    pub fn snapshot(&self) -> ListenerStats {
        ListenerStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            connection_losses: self.connection_losses.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of listener counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    pub delivered: u64,
    pub malformed: u64,
    pub handler_failures: u64,
    pub connection_losses: u64,
}

impl ListenerStats {
    /// Records taken off the subscription, whatever their outcome
    pub fn received(&self) -> u64 {
        self.delivered + self.malformed + self.handler_failures
    }
}
