//! Topic statistics tracking

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Per-topic broker statistics
#[derive(Debug, Default)]
pub struct TopicStats {
    /// Total records appended
    pub records_appended: AtomicU64,
    /// Total records handed to subscriptions
    pub records_fetched: AtomicU64,
    /// Records rejected for exceeding the maximum record size
    pub records_rejected: AtomicU64,
    /// Total appended value bytes
    pub bytes_appended: AtomicU64,
    /// Number of subscribed consumer groups
    pub active_groups: AtomicU32,
    /// Number of open subscriptions across all groups
    pub active_subscriptions: AtomicU32,
}

impl TopicStats {
    /// Record an append of `value_size` bytes
    pub fn record_appended(&self, value_size: usize) -> u64 {
        self.bytes_appended
            .fetch_add(value_size as u64, Ordering::Relaxed);
        self.records_appended.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Increment fetched record count
    pub fn record_fetched(&self) {
        self.records_fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment rejected record count
    pub fn record_rejected(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Average appended value size in bytes
    pub fn avg_record_size(&self) -> u64 {
        let appended = self.records_appended.load(Ordering::Relaxed);
        if appended == 0 {
            return 0;
        }
        self.bytes_appended.load(Ordering::Relaxed) / appended
    }

    /// Add a subscription
    pub fn add_subscription(&self) -> u32 {
        self.active_subscriptions.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Remove a subscription
    pub fn remove_subscription(&self) -> u32 {
        let previous = self
            .active_subscriptions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        previous.saturating_sub(1)
    }
}
