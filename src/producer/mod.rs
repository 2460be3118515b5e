//! Producer core
//!
//! Turns publish intents into broker transmissions. Two modes share one
//! path:
//!
//! - on-demand: [`Producer::publish_now`], called by an external trigger
//! - scheduled: [`Producer::start_scheduled_emission`], a periodic task that
//!   pulls payloads from an [`EmissionSource`] and publishes them
//!
//! The codec for a topic comes from the shared [`CodecRegistry`]; topics
//! without an assignment use the default codec of the payload's kind.

pub mod generator;
pub mod scheduler;

pub use generator::RiderLocationGenerator;
pub use scheduler::{Emission, EmissionSource, EmissionStats, ScheduledEmission};

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    broker::BrokerClient,
    codec::{default_codec, CodecRegistry, Payload, RiderLocation},
    error::{PubSubError, Result},
    topic::{
        Acks, Headers, OutboundRecord, RecordMetadata, CONTENT_TYPE_HEADER, MESSAGE_KEY_HEADER,
        PAYLOAD_KIND_HEADER,
    },
};

/// Producer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Acknowledgment level requested for every send
    pub acks: Acks,
    /// Copy the record key into the `message-key` header
    pub replicate_key_header: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            acks: Acks::Leader,
            replicate_key_header: true,
        }
    }
}

impl ProducerConfig {
    pub fn with_acks(mut self, acks: Acks) -> Self {
        self.acks = acks;
        self
    }
}

/// Producer counters
#[derive(Debug, Default)]
pub struct ProducerStats {
    pub records_published: AtomicU64,
    pub publish_failures: AtomicU64,
}

impl ProducerStats {
    pub fn published(&self) -> u64 {
        self.records_published.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }
}

/// Cloneable producer handle over a shared broker connection
#[derive(Clone)]
pub struct Producer {
    client: Arc<dyn BrokerClient>,
    codecs: Arc<CodecRegistry>,
    config: ProducerConfig,
    stats: Arc<ProducerStats>,
}

impl Producer {
    pub fn new(
        client: Arc<dyn BrokerClient>,
        codecs: Arc<CodecRegistry>,
        config: ProducerConfig,
    ) -> Self {
        Self {
            client,
            codecs,
            config,
            stats: Arc::new(ProducerStats::default()),
        }
    }

    /// Encode and transmit a payload, returning the broker acknowledgment
    pub fn publish_now(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &Payload,
    ) -> Result<RecordMetadata> {
        self.publish_with_headers(topic, key, payload, Headers::new())
    }

    /// [`publish_now`](Self::publish_now) with caller-supplied headers.
    ///
    /// Caller headers win over the generated `content-type`, `payload-kind`
    /// and `message-key` headers.
    pub fn publish_with_headers(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &Payload,
        headers: Headers,
    ) -> Result<RecordMetadata> {
        let result = self.encode_record(topic, key, payload, headers).and_then(|record| {
            self.client.send(record, self.config.acks)
        });

        match result {
            Ok(metadata) => {
                self.stats.records_published.fetch_add(1, Ordering::Relaxed);
                log::debug!(
                    "Published {} to {}[{}]@{}",
                    payload.kind(),
                    metadata.topic,
                    metadata.partition,
                    metadata.offset
                );
                Ok(metadata)
            }
            Err(err) => {
                self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
                Err(match err {
                    failure @ PubSubError::PublishFailure { .. } => failure,
                    other => PubSubError::publish_failure(topic, other.to_string()),
                })
            }
        }
    }

    fn encode_record(
        &self,
        topic: &str,
        key: Option<&str>,
        payload: &Payload,
        mut headers: Headers,
    ) -> Result<OutboundRecord> {
        let codec = self
            .codecs
            .codec_for_topic(topic)
            .unwrap_or_else(|| default_codec(payload.kind()));
        let value = codec.encode(payload)?;

        let mut generated = Headers::new()
            .with(CONTENT_TYPE_HEADER, codec.content_type())
            .with(PAYLOAD_KIND_HEADER, payload.kind().name());
        if let (Some(key), true) = (key, self.config.replicate_key_header) {
            generated.insert(MESSAGE_KEY_HEADER, key);
        }
        headers.merge_missing(&generated);

        let mut record = OutboundRecord::new(topic, value).with_headers(headers);
        record.key = key.map(str::to_string);
        Ok(record)
    }

    /// Publish a plain text message (the "send1" trigger)
    pub fn send_text(&self, topic: &str, message: &str) -> Result<RecordMetadata> {
        self.publish_now(topic, None, &Payload::Text(message.to_string()))
    }

    /// Publish a rider location and echo its rider id (the "send2" trigger)
    pub fn send_rider_location(&self, topic: &str, location: RiderLocation) -> Result<String> {
        let rider_id = location.rider_id.clone();
        self.publish_now(topic, None, &Payload::RiderLocation(location))?;
        Ok(rider_id)
    }

    /// Start a periodic task publishing `source`'s emissions to `topic`
    /// every `interval`. The first emission happens one interval after
    /// start.
    pub fn start_scheduled_emission<S: EmissionSource>(
        &self,
        topic: &str,
        interval: Duration,
        source: S,
    ) -> Result<ScheduledEmission> {
        crate::topic::validate_topic_name(topic)?;
        if interval.is_zero() {
            return Err(PubSubError::invalid_parameter(
                "interval",
                "Emission interval cannot be zero",
            ));
        }

        ScheduledEmission::spawn(self.clone(), topic.to_string(), interval, source)
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    pub fn stats(&self) -> &ProducerStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        broker::{BrokerConfig, InMemoryBroker, Subscription},
        codec::{PayloadKind, SerializationFormat},
    };

    fn setup() -> (InMemoryBroker, Producer) {
        let broker = InMemoryBroker::new();
        let codecs = Arc::new(CodecRegistry::new());
        codecs
            .assign_format("riders", PayloadKind::RiderLocation, SerializationFormat::Bincode)
            .unwrap();
        let producer = Producer::new(
            Arc::new(broker.clone()),
            codecs,
            ProducerConfig::default(),
        );
        (broker, producer)
    }

    #[test]
    fn test_publish_sets_headers() {
        let (broker, producer) = setup();
        let meta = producer
            .publish_now("my-topic", Some("k1"), &Payload::from("hello"))
            .unwrap();
        assert_eq!(meta.topic, "my-topic");

        let mut sub = broker.subscribe("my-topic", "g").unwrap();
        let record = sub.poll(Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(record.value, b"hello");
        assert_eq!(record.key.as_deref(), Some("k1"));
        assert_eq!(record.headers.get_str(PAYLOAD_KIND_HEADER), Some("text"));
        assert_eq!(record.headers.get_str(MESSAGE_KEY_HEADER), Some("k1"));
        assert!(record
            .headers
            .get_str(CONTENT_TYPE_HEADER)
            .unwrap()
            .starts_with("text/plain"));
    }

    #[test]
    fn test_caller_headers_win() {
        let (broker, producer) = setup();
        producer
            .publish_with_headers(
                "my-topic",
                None,
                &Payload::from("x"),
                Headers::new().with(CONTENT_TYPE_HEADER, "text/csv"),
            )
            .unwrap();
        let mut sub = broker.subscribe("my-topic", "g").unwrap();
        let record = sub.poll(Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(record.headers.get_str(CONTENT_TYPE_HEADER), Some("text/csv"));
        assert!(!record.headers.contains(MESSAGE_KEY_HEADER));
    }

    #[test]
    fn test_topic_codec_is_used() {
        let (broker, producer) = setup();
        let location = RiderLocation::new("rider123", 28.31, 77.34);
        assert_eq!(
            producer.send_rider_location("riders", location).unwrap(),
            "rider123"
        );
        let mut sub = broker.subscribe("riders", "g").unwrap();
        let record = sub.poll(Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(
            record.headers.get_str(CONTENT_TYPE_HEADER),
            Some("application/x-bincode")
        );
    }

    #[test]
    fn test_codec_mismatch_is_publish_failure() {
        let (_broker, producer) = setup();
        let err = producer.send_text("riders", "not a location").unwrap_err();
        assert!(matches!(err, PubSubError::PublishFailure { .. }));
        assert_eq!(producer.stats().failures(), 1);
    }

    #[test]
    fn test_unknown_topic_without_auto_create() {
        let broker =
            InMemoryBroker::connect(BrokerConfig::default().with_auto_create_topics(false))
                .unwrap();
        let producer = Producer::new(
            Arc::new(broker),
            Arc::new(CodecRegistry::new()),
            ProducerConfig::default(),
        );
        let err = producer.send_text("missing", "hello").unwrap_err();
        match err {
            PubSubError::PublishFailure { topic, reason } => {
                assert_eq!(topic, "missing");
                assert!(reason.contains("missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_broker_outage_is_publish_failure() {
        let (broker, producer) = setup();
        broker.set_available(false);
        let err = producer.send_text("my-topic", "hello").unwrap_err();
        assert!(matches!(err, PubSubError::PublishFailure { .. }));
        broker.set_available(true);
        assert!(producer.send_text("my-topic", "hello").is_ok());
        assert_eq!(producer.stats().published(), 1);
    }

    #[test]
    fn test_scheduled_emission_rejects_bad_input() {
        let (_broker, producer) = setup();
        let source = || Emission::new("tick");
        assert!(producer
            .start_scheduled_emission("my-topic", Duration::ZERO, source)
            .is_err());
        assert!(producer
            .start_scheduled_emission("", Duration::from_millis(10), source)
            .is_err());
    }
}
