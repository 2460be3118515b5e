//! Record envelopes exchanged with the broker

use std::time::{SystemTime, UNIX_EPOCH};

use super::header::Headers;

/// Milliseconds since the UNIX epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Record handed to the broker for transmission
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRecord {
    /// Destination topic
    pub topic: String,
    /// Optional routing key; equal keys land on the same partition
    pub key: Option<String>,
    /// Encoded payload
    pub value: Vec<u8>,
    /// Metadata headers
    pub headers: Headers,
}

impl OutboundRecord {
    pub fn new(topic: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            key: None,
            value,
            headers: Headers::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}

/// Position of a stored record, also used as the publish acknowledgment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordMetadata {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    /// Broker append time, milliseconds since epoch
    pub timestamp: u64,
}

/// Record delivered to a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerRecord {
    pub metadata: RecordMetadata,
    pub key: Option<String>,
    pub value: Vec<u8>,
    pub headers: Headers,
}

impl ConsumerRecord {
    pub fn topic(&self) -> &str {
        &self.metadata.topic
    }

    pub fn partition(&self) -> u32 {
        self.metadata.partition
    }

    pub fn offset(&self) -> u64 {
        self.metadata.offset
    }
}
