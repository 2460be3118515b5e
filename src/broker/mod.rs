//! Broker client contract and the in-process broker
//!
//! The producer and consumer cores only talk to a broker through
//! [`BrokerClient`] and [`Subscription`]. Implementations synchronize
//! internally, so one `Arc<dyn BrokerClient>` is shared by every task of a
//! process without extra locking.
//!
//! [`InMemoryBroker`] implements the contract inside the process: topics
//! with partitions, keyed routing, per-group positions and partition
//! assignment. It stands in for a networked broker in demos and tests.

pub mod group;
pub mod memory;
pub mod partition_log;
pub mod partitioner;

pub use group::{GroupState, OffsetReset};
pub use memory::{BrokerConfig, BrokerStats, InMemoryBroker};
pub use partition_log::PartitionLog;
pub use partitioner::{murmur2, partition_for_key, select_partition, RoundRobin};

use std::time::Duration;

use crate::{
    error::Result,
    topic::{Acks, ConsumerRecord, OutboundRecord, RecordMetadata, TopicSpec},
};

/// Result of an idempotent topic declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicOutcome {
    /// Topic did not exist and was created
    Created,
    /// Topic already existed with the requested shape
    AlreadyExists,
}

/// Administrative part of the broker contract
pub trait BrokerAdmin: Send + Sync {
    /// Create a topic unless it exists.
    ///
    /// An existing topic with a different shape is left untouched and
    /// reported as `TopicShapeConflict`.
    fn create_topic_if_absent(&self, spec: &TopicSpec) -> Result<TopicOutcome>;

    /// Current shape of a topic
    fn describe_topic(&self, name: &str) -> Option<TopicSpec>;

    /// All known topics, sorted by name
    fn list_topics(&self) -> Vec<TopicSpec>;
}

/// Data path of the broker contract
pub trait BrokerClient: BrokerAdmin {
    /// Transmit a record; returns its position once accepted at `acks`
    fn send(&self, record: OutboundRecord, acks: Acks) -> Result<RecordMetadata>;

    /// Join `group_id` on `topic` and return the member's record stream
    fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn Subscription>>;
}

/// One group member's view of a topic
pub trait Subscription: Send {
    /// Wait up to `timeout` for the next record of an assigned partition
    fn poll(&mut self, timeout: Duration) -> Result<Option<ConsumerRecord>>;

    /// Partitions currently assigned to this member
    fn assignment(&self) -> Vec<u32>;

    /// Broker-assigned member identifier
    fn member_id(&self) -> &str;

    /// Leave the group; the member's partitions move to the others
    fn close(&mut self);
}
