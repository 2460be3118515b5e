//! Topic addressing and record envelopes
//!
//! A topic is a named set of ordered partitions. Records carry an optional
//! key, the encoded payload and a header map; the broker answers each append
//! with the record's `RecordMetadata` (topic, partition, offset).

pub mod config;
pub mod header;
pub mod message;
pub mod stats;


// Re-export main types for convenience
pub use config::{validate_topic_name, Acks, TopicSpec, MAX_TOPIC_NAME_LENGTH};
pub use header::{
    HeaderValue, Headers, CONTENT_TYPE_HEADER, MESSAGE_KEY_HEADER, PAYLOAD_KIND_HEADER,
};
pub use message::{now_millis, ConsumerRecord, OutboundRecord, RecordMetadata};
pub use stats::TopicStats;
