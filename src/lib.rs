//! # rider-pubsub - Topic-based publish/subscribe pipeline
//!
//! Producers and consumers exchange two payload kinds over named,
//! partitioned topics: plain UTF-8 text and `RiderLocation` records.
//! Consumer groups control fan-out: every group sees every message, and the
//! members of one group split the topic's partitions between them.
//!
//! ## Features
//!
//! - **Per-topic codecs**: text, JSON and bincode wire formats
//! - **Idempotent topic declaration**: shape conflicts are reported, never applied
//! - **On-demand and scheduled production**: one publish path for both
//! - **Listeners**: one thread each, isolated from malformed payloads and
//!   handler panics, with reconnect backoff
//! - **In-process broker**: keyed partitioning, group positions and
//!   rebalancing behind the `BrokerClient` contract
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   publish    ┌──────────────────┐   poll    ┌──────────────┐
//! │   Producer   │ ───────────► │   BrokerClient   │ ────────► │ ConsumerCore │
//! │ (now / timer)│   encode     │ topics/partitions│  decode   │  listeners   │
//! └──────────────┘              │  consumer groups │           └──────────────┘
//!        │                      └──────────────────┘                  │
//!        ▼                               ▲                            ▼
//! ┌──────────────┐              ┌──────────────────┐           ┌──────────────┐
//! │CodecRegistry │              │  TopicRegistry   │           │MessageHandler│
//! └──────────────┘              └──────────────────┘           └──────────────┘
//! ```

pub mod broker;
pub mod codec;
pub mod consumer;
pub mod error;
pub mod producer;
pub mod settings;
pub mod topic;
pub mod topic_registry;

// Main API re-exports
pub use broker::{BrokerAdmin, BrokerClient, BrokerConfig, InMemoryBroker, Subscription, TopicOutcome};
pub use codec::{CodecRegistry, Payload, PayloadCodec, PayloadKind, RiderLocation, SerializationFormat};
pub use consumer::{
    ConsumerConfig, ConsumerCore, ListenerHandle, ListenerSpec, ListenerState, ListenerStats,
    MessageHandler, RetryPolicy,
};
pub use error::{PubSubError, Result};
pub use producer::{
    Emission, EmissionSource, Producer, ProducerConfig, RiderLocationGenerator, ScheduledEmission,
};
pub use settings::PipelineSettings;
pub use topic::{Acks, ConsumerRecord, Headers, OutboundRecord, RecordMetadata, TopicSpec};
pub use topic_registry::TopicRegistry;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration constants
pub mod config {
    /// Broker address used when none is configured
    pub const DEFAULT_BOOTSTRAP_SERVER: &str = "localhost:9092";

    /// Partition count of auto-created topics
    pub const DEFAULT_PARTITIONS: u32 = 1;

    pub const DEFAULT_REPLICATION_FACTOR: u16 = 1;

    /// Largest accepted encoded value (1MB)
    pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

    /// Longest single listener wait for a record
    pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;

    /// Scheduled emission cadence
    pub const DEFAULT_EMISSION_INTERVAL_MS: u64 = 1000;

    pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 100;
    pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5000;
    pub const DEFAULT_RETRY_MAX_RETRIES: u32 = 10;

    /// Text topic of the reference pipeline
    pub const TEXT_TOPIC: &str = "my-topic";
    /// Rider location topic of the reference pipeline
    pub const RIDER_TOPIC: &str = "my-topic-new";
    /// Topic declared with several partitions at startup
    pub const PARTITIONED_TOPIC: &str = "my-new-topic-2";
    pub const PARTITIONED_TOPIC_PARTITIONS: u32 = 3;

    pub const TEXT_GROUP: &str = "my-new-group";
    pub const TEXT_GROUP_2: &str = "my-new-group-2";
    pub const RIDER_GROUP: &str = "my-new-group-rider";
}
