//! Consumer core
//!
//! Runs registered listeners. Each listener is a `(topic, group, payload
//! kind)` triple bound to a [`MessageHandler`]; it joins the group on the
//! broker, decodes every record it is assigned and invokes the handler.
//! Records that fail to decode are logged and skipped, and a panicking
//! handler is contained to the message that caused it.
//!
//! Listeners with different group ids each receive every record of the
//! topic. Listeners sharing a group id split the topic's partitions.

pub mod handler;
pub mod listener;
pub mod stats;

pub use handler::{LoggingHandler, MessageHandler};
pub use listener::{ListenerHandle, ListenerState};
pub use stats::ListenerStats;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use self::listener::{ListenerShared, ListenerTask};
use crate::{
    broker::BrokerClient,
    codec::{default_codec, CodecRegistry, PayloadKind},
    error::{PubSubError, Result},
    topic::validate_topic_name,
};

/// Reconnect schedule for listeners that lose the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Growth factor per retry
    pub multiplier: f64,
    /// Upper bound for one delay
    pub max_delay_ms: u64,
    /// Consecutive failed attempts tolerated before giving up
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: crate::config::DEFAULT_RETRY_INITIAL_DELAY_MS,
            multiplier: 2.0,
            max_delay_ms: crate::config::DEFAULT_RETRY_MAX_DELAY_MS,
            max_retries: crate::config::DEFAULT_RETRY_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(PubSubError::invalid_parameter(
                "multiplier",
                "Retry multiplier must be a finite number >= 1",
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(PubSubError::invalid_parameter(
                "max_delay_ms",
                "Maximum retry delay cannot be below the initial delay",
            ));
        }
        Ok(())
    }
}

/// Consumer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Longest single wait for a record; bounds stop latency
    pub poll_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: crate::config::DEFAULT_POLL_TIMEOUT_MS,
            retry: RetryPolicy::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_timeout_ms == 0 {
            return Err(PubSubError::invalid_parameter(
                "poll_timeout_ms",
                "Poll timeout cannot be zero",
            ));
        }
        self.retry.validate()
    }
}

/// What a listener consumes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub topic: String,
    pub group_id: String,
    pub kind: PayloadKind,
}

impl ListenerSpec {
    pub fn new(topic: impl Into<String>, group_id: impl Into<String>, kind: PayloadKind) -> Self {
        Self {
            topic: topic.into(),
            group_id: group_id.into(),
            kind,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_topic_name(&self.topic)?;
        if self.group_id.is_empty() {
            return Err(PubSubError::invalid_parameter(
                "group_id",
                "Consumer group id cannot be empty",
            ));
        }
        Ok(())
    }
}

/// Owner of a process's listeners
pub struct ConsumerCore {
    client: Arc<dyn BrokerClient>,
    codecs: Arc<CodecRegistry>,
    config: ConsumerConfig,
    listeners: Mutex<Vec<Arc<ListenerShared>>>,
    next_listener: AtomicUsize,
}

impl ConsumerCore {
    pub fn new(
        client: Arc<dyn BrokerClient>,
        codecs: Arc<CodecRegistry>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            client,
            codecs,
            config,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicUsize::new(1),
        }
    }

    /// Start a listener thread for `spec`.
    ///
    /// Returns once the thread is spawned; the subscription itself happens
    /// on that thread (see [`ListenerHandle::wait_until_active`]).
    pub fn register_listener<H: MessageHandler>(
        &self,
        spec: ListenerSpec,
        handler: H,
    ) -> Result<ListenerHandle> {
        spec.validate()?;
        let codec = match self.codecs.codec_for_topic(&spec.topic) {
            Some(codec) if codec.kind() != spec.kind => {
                return Err(PubSubError::invalid_parameter(
                    "kind",
                    format!(
                        "Topic '{}' carries {} payloads, listener expects {}",
                        spec.topic,
                        codec.kind(),
                        spec.kind
                    ),
                ));
            }
            Some(codec) => codec,
            None => default_codec(spec.kind),
        };

        let name = format!(
            "{}/{}#{}",
            spec.topic,
            spec.group_id,
            self.next_listener.fetch_add(1, Ordering::Relaxed)
        );
        let shared = Arc::new(ListenerShared::new(name.clone(), spec));

        let task = ListenerTask {
            shared: shared.clone(),
            client: self.client.clone(),
            codec: codec.clone(),
            handler,
            config: self.config.clone(),
        };
        let thread = thread::Builder::new()
            .name(format!("listen-{}", name))
            .spawn(move || task.run())
            .map_err(|e| PubSubError::from_io(e, "Failed to spawn listener thread"))?;
        shared.attach_thread(thread);

        log::info!("Registered listener {} ({})", name, codec.name());
        self.listeners.lock().unwrap().push(shared.clone());
        Ok(ListenerHandle::new(shared))
    }

    /// Name and state of every registered listener
    pub fn listener_states(&self) -> Vec<(String, ListenerState)> {
        self.listeners
            .lock()
            .unwrap()
            .iter()
            .map(|l| (l.name().to_string(), l.current_state()))
            .collect()
    }

    /// Stop every listener and return its final counters
    pub fn shutdown(&self) -> Vec<(String, ListenerStats)> {
        let listeners = std::mem::take(&mut *self.listeners.lock().unwrap());
        listeners
            .iter()
            .map(|l| (l.name().to_string(), l.stop()))
            .collect()
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }
}

impl Drop for ConsumerCore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        broker::{BrokerConfig, InMemoryBroker},
        codec::{Payload, RiderLocation, SerializationFormat},
        producer::{Producer, ProducerConfig},
        topic::RecordMetadata,
    };
    use std::{
        sync::mpsc,
        time::{Duration, Instant},
    };

    const WAIT: Duration = Duration::from_secs(5);

    fn setup() -> (InMemoryBroker, Arc<CodecRegistry>, Producer, ConsumerCore) {
        let broker = InMemoryBroker::new();
        let codecs = Arc::new(CodecRegistry::new());
        let producer = Producer::new(
            Arc::new(broker.clone()),
            codecs.clone(),
            ProducerConfig::default(),
        );
        let consumer = ConsumerCore::new(
            Arc::new(broker.clone()),
            codecs.clone(),
            ConsumerConfig::default().with_poll_timeout(Duration::from_millis(20)),
        );
        (broker, codecs, producer, consumer)
    }

    fn channel_handler() -> (
        impl MessageHandler,
        mpsc::Receiver<(Payload, RecordMetadata)>,
    ) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let handler = move |payload: &Payload, metadata: &RecordMetadata| {
            tx.lock()
                .unwrap()
                .send((payload.clone(), metadata.clone()))
                .unwrap();
        };
        (handler, rx)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_retry_delays() {
        let retry = RetryPolicy {
            initial_delay_ms: 10,
            multiplier: 2.0,
            max_delay_ms: 50,
            max_retries: 5,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(10));
        assert_eq!(retry.delay_for(2), Duration::from_millis(20));
        assert_eq!(retry.delay_for(3), Duration::from_millis(40));
        assert_eq!(retry.delay_for(4), Duration::from_millis(50));
        assert_eq!(retry.delay_for(200), Duration::from_millis(50));
    }

    #[test]
    fn test_config_validation() {
        assert!(ConsumerConfig::default().validate().is_ok());
        assert!(ConsumerConfig::default()
            .with_poll_timeout(Duration::ZERO)
            .validate()
            .is_err());
        let retry = RetryPolicy {
            multiplier: 0.5,
            ..RetryPolicy::default()
        };
        assert!(ConsumerConfig::default().with_retry(retry).validate().is_err());
    }

    #[test]
    fn test_delivers_text() {
        let (_broker, _codecs, producer, consumer) = setup();
        let (handler, rx) = channel_handler();
        let handle = consumer
            .register_listener(ListenerSpec::new("my-topic", "g1", PayloadKind::Text), handler)
            .unwrap();
        assert!(handle.wait_until_active(WAIT));
        assert!(handle.member_id().is_some());

        producer.send_text("my-topic", "hello").unwrap();
        let (payload, metadata) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(payload, Payload::from("hello"));
        assert_eq!(metadata.topic, "my-topic");

        let stats = handle.stop();
        assert_eq!(stats.delivered, 1);
        assert_eq!(handle.state(), ListenerState::Stopped);
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let (_broker, _codecs, producer, consumer) = setup();
        let (handler, rx) = channel_handler();
        let handle = consumer
            .register_listener(
                ListenerSpec::new("riders", "g", PayloadKind::RiderLocation),
                handler,
            )
            .unwrap();

        // text bytes on a rider topic
        producer.send_text("riders", "{ not json").unwrap();
        producer
            .send_rider_location("riders", RiderLocation::new("rider123", 1.0, 2.0))
            .unwrap();

        let (payload, _) = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(
            payload.as_rider_location().map(|l| l.rider_id.as_str()),
            Some("rider123")
        );
        let stats = handle.stop();
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn test_handler_panic_is_contained() {
        let (_broker, _codecs, producer, consumer) = setup();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let handle = consumer
            .register_listener(
                ListenerSpec::new("my-topic", "g", PayloadKind::Text),
                move |payload: &Payload, _: &RecordMetadata| {
                    if payload.as_text() == Some("boom") {
                        panic!("handler exploded");
                    }
                    tx.lock().unwrap().send(payload.clone()).unwrap();
                },
            )
            .unwrap();

        producer.send_text("my-topic", "boom").unwrap();
        producer.send_text("my-topic", "after").unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Payload::from("after"));

        let stats = handle.stop();
        assert_eq!(stats.handler_failures, 1);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.received(), 2);
    }

    #[test]
    fn test_kind_mismatch_with_topic_codec() {
        let (_broker, codecs, _producer, consumer) = setup();
        codecs
            .assign_format("riders", PayloadKind::RiderLocation, SerializationFormat::Json)
            .unwrap();
        let err = consumer
            .register_listener(
                ListenerSpec::new("riders", "g", PayloadKind::Text),
                LoggingHandler::new("t"),
            )
            .unwrap_err();
        assert!(matches!(err, PubSubError::InvalidParameter { .. }));
    }

    #[test]
    fn test_rejects_bad_spec() {
        let (_broker, _codecs, _producer, consumer) = setup();
        assert!(consumer
            .register_listener(ListenerSpec::new("", "g", PayloadKind::Text), LoggingHandler::new("t"))
            .is_err());
        assert!(consumer
            .register_listener(
                ListenerSpec::new("my-topic", "", PayloadKind::Text),
                LoggingHandler::new("t")
            )
            .is_err());
    }

    #[test]
    fn test_backoff_and_recovery() {
        let (broker, _codecs, producer, consumer) = setup();
        let (handler, rx) = channel_handler();
        let handle = consumer
            .register_listener(ListenerSpec::new("my-topic", "g", PayloadKind::Text), handler)
            .unwrap();
        assert!(handle.wait_until_active(WAIT));

        broker.set_available(false);
        assert!(handle.wait_for_state(ListenerState::Backoff, WAIT));
        assert!(handle.last_error().is_some());

        broker.set_available(true);
        assert!(handle.wait_until_active(WAIT));
        producer.send_text("my-topic", "back").unwrap();
        assert_eq!(rx.recv_timeout(WAIT).unwrap().0, Payload::from("back"));

        let stats = handle.stop();
        assert!(stats.connection_losses >= 1);
    }

    #[test]
    fn test_fails_after_retry_ceiling() {
        let broker = InMemoryBroker::new();
        broker.set_available(false);
        let consumer = ConsumerCore::new(
            Arc::new(broker.clone()),
            Arc::new(CodecRegistry::new()),
            ConsumerConfig::default().with_retry(RetryPolicy {
                initial_delay_ms: 1,
                multiplier: 1.0,
                max_delay_ms: 1,
                max_retries: 3,
            }),
        );
        let handle = consumer
            .register_listener(
                ListenerSpec::new("my-topic", "g", PayloadKind::Text),
                LoggingHandler::new("t"),
            )
            .unwrap();

        assert!(wait_until(|| handle.state() == ListenerState::Failed));
        assert!(handle.last_error().unwrap().contains("gave up after 3 retries"));
        assert!(!handle.wait_until_active(Duration::from_millis(10)));
    }

    #[test]
    fn test_stop_waits_for_handler() {
        let (_broker, _codecs, producer, consumer) = setup();
        let (started_tx, started_rx) = mpsc::channel();
        let started_tx = Mutex::new(started_tx);
        let finished = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let handler_finished = finished.clone();
        let handle = consumer
            .register_listener(
                ListenerSpec::new("my-topic", "g", PayloadKind::Text),
                move |_: &Payload, _: &RecordMetadata| {
                    started_tx.lock().unwrap().send(()).unwrap();
                    thread::sleep(Duration::from_millis(100));
                    handler_finished.store(true, std::sync::atomic::Ordering::SeqCst);
                },
            )
            .unwrap();

        producer.send_text("my-topic", "slow").unwrap();
        started_rx.recv_timeout(WAIT).unwrap();
        let stats = handle.stop();
        assert!(finished.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn test_shutdown_stops_all() {
        let (broker, _codecs, _producer, consumer) = setup();
        let a = consumer
            .register_listener(
                ListenerSpec::new("my-topic", "a", PayloadKind::Text),
                LoggingHandler::new("a"),
            )
            .unwrap();
        let b = consumer
            .register_listener(
                ListenerSpec::new("my-topic", "b", PayloadKind::Text),
                LoggingHandler::new("b"),
            )
            .unwrap();
        assert!(a.wait_until_active(WAIT));
        assert!(b.wait_until_active(WAIT));
        assert_eq!(broker.list_groups("my-topic"), vec!["a", "b"]);

        let finals = consumer.shutdown();
        assert_eq!(finals.len(), 2);
        assert_eq!(a.state(), ListenerState::Stopped);
        assert_eq!(b.state(), ListenerState::Stopped);
        assert!(consumer.listener_states().is_empty());
    }

    #[test]
    fn test_dropped_handle_stops_listener() {
        let (broker, _codecs, producer, consumer) = setup();
        let (handler, rx) = channel_handler();
        let handle = consumer
            .register_listener(ListenerSpec::new("my-topic", "g", PayloadKind::Text), handler)
            .unwrap();
        assert!(handle.wait_until_active(WAIT));
        drop(handle);

        assert_eq!(consumer.listener_states()[0].1, ListenerState::Stopped);
        let stats = broker.topic_stats("my-topic").unwrap();
        assert_eq!(
            stats
                .active_subscriptions
                .load(std::sync::atomic::Ordering::Relaxed),
            0
        );
        producer.send_text("my-topic", "late").unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_rebalance_on_stop() {
        let broker = InMemoryBroker::connect(BrokerConfig::default().with_default_partitions(2))
            .unwrap();
        let consumer = ConsumerCore::new(
            Arc::new(broker.clone()),
            Arc::new(CodecRegistry::new()),
            ConsumerConfig::default().with_poll_timeout(Duration::from_millis(20)),
        );
        let first = consumer
            .register_listener(
                ListenerSpec::new("shared", "g", PayloadKind::Text),
                LoggingHandler::new("first"),
            )
            .unwrap();
        let second = consumer
            .register_listener(
                ListenerSpec::new("shared", "g", PayloadKind::Text),
                LoggingHandler::new("second"),
            )
            .unwrap();
        assert!(first.wait_until_active(WAIT));
        assert!(second.wait_until_active(WAIT));

        drop(first);
        assert_eq!(second.state(), ListenerState::Active);
        let stats = broker.topic_stats("shared").unwrap();
        assert_eq!(
            stats
                .active_subscriptions
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }
}
