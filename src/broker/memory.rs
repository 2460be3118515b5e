//! In-process broker implementing the client contract

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Condvar, Mutex,
    },
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use super::{
    group::{GroupState, OffsetReset},
    partition_log::PartitionLog,
    partitioner::{select_partition, RoundRobin},
    BrokerAdmin, BrokerClient, Subscription, TopicOutcome,
};
use crate::{
    error::{PubSubError, Result},
    topic::{
        now_millis, Acks, ConsumerRecord, OutboundRecord, RecordMetadata, TopicSpec, TopicStats,
    },
};

/// Broker connection and topic defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker addresses, kept for diagnostics
    pub bootstrap_servers: Vec<String>,
    /// Create unknown topics on first send or subscribe
    pub auto_create_topics: bool,
    /// Partition count for auto-created topics
    pub default_partitions: u32,
    /// Replication factor for auto-created topics
    pub default_replication_factor: u16,
    /// Number of simulated brokers; bounds the replication factor
    pub cluster_size: u16,
    /// Records retained per partition (`None` keeps everything)
    pub retention_records: Option<usize>,
    /// Maximum encoded value size
    pub max_record_bytes: usize,
    /// Start position of a new consumer group
    pub offset_reset: OffsetReset,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: vec![crate::config::DEFAULT_BOOTSTRAP_SERVER.to_string()],
            auto_create_topics: true,
            default_partitions: crate::config::DEFAULT_PARTITIONS,
            default_replication_factor: crate::config::DEFAULT_REPLICATION_FACTOR,
            cluster_size: 1,
            retention_records: None,
            max_record_bytes: crate::config::DEFAULT_MAX_RECORD_BYTES,
            offset_reset: OffsetReset::Earliest,
        }
    }
}

impl BrokerConfig {
    /// Enable or disable topic auto-creation
    pub fn with_auto_create_topics(mut self, enable: bool) -> Self {
        self.auto_create_topics = enable;
        self
    }

    /// Set the default partition count
    pub fn with_default_partitions(mut self, partitions: u32) -> Self {
        self.default_partitions = partitions;
        self
    }

    /// Set per-partition retention
    pub fn with_retention_records(mut self, records: Option<usize>) -> Self {
        self.retention_records = records;
        self
    }

    /// Set new-group start position
    pub fn with_offset_reset(mut self, reset: OffsetReset) -> Self {
        self.offset_reset = reset;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_servers.is_empty() {
            return Err(PubSubError::invalid_parameter(
                "bootstrap_servers",
                "At least one broker address is required",
            ));
        }

        if self.default_partitions == 0 {
            return Err(PubSubError::invalid_parameter(
                "default_partitions",
                "Default partition count cannot be zero",
            ));
        }

        if self.default_replication_factor == 0
            || self.default_replication_factor > self.cluster_size
        {
            return Err(PubSubError::invalid_parameter(
                "default_replication_factor",
                format!(
                    "Replication factor must be between 1 and cluster size {}",
                    self.cluster_size
                ),
            ));
        }

        if self.retention_records == Some(0) {
            return Err(PubSubError::invalid_parameter(
                "retention_records",
                "Retention cannot be zero records",
            ));
        }

        if self.max_record_bytes == 0 {
            return Err(PubSubError::invalid_parameter(
                "max_record_bytes",
                "Max record size cannot be zero",
            ));
        }

        Ok(())
    }
}

/// Aggregated broker statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerStats {
    pub total_topics: usize,
    pub total_partitions: usize,
    pub total_records: u64,
    pub total_groups: usize,
}

#[derive(Debug)]
struct TopicState {
    spec: TopicSpec,
    partitions: Vec<PartitionLog>,
    round_robin: RoundRobin,
    groups: HashMap<String, GroupState>,
    stats: Arc<TopicStats>,
}

impl TopicState {
    fn new(spec: TopicSpec) -> Self {
        let partitions = (0..spec.partitions).map(|_| PartitionLog::new()).collect();
        Self {
            spec,
            partitions,
            round_robin: RoundRobin::new(),
            groups: HashMap::new(),
            stats: Arc::new(TopicStats::default()),
        }
    }

    fn start_positions(&self, reset: OffsetReset) -> Vec<u64> {
        self.partitions
            .iter()
            .map(|plog| match reset {
                OffsetReset::Earliest => plog.log_start_offset(),
                OffsetReset::Latest => plog.high_watermark(),
            })
            .collect()
    }

    /// Hand the next undelivered record of the member's partitions to the
    /// member, starting at `cursor` so partitions are served in turn.
    fn fetch_next(
        &mut self,
        group_id: &str,
        member_id: &str,
        cursor: &mut usize,
    ) -> Option<ConsumerRecord> {
        let TopicState {
            spec,
            partitions,
            groups,
            stats,
            ..
        } = self;
        let group = groups.get_mut(group_id)?;
        let assigned = group.assignment(member_id).to_vec();

        for step in 0..assigned.len() {
            let slot = (*cursor + step) % assigned.len();
            let partition = assigned[slot];
            let plog = &partitions[partition as usize];

            let mut position = group.position(partition);
            if position < plog.log_start_offset() {
                log::warn!(
                    "Group '{}' skipped offsets {}..{} of {}[{}] removed by retention",
                    group_id,
                    position,
                    plog.log_start_offset(),
                    spec.name,
                    partition
                );
                position = plog.log_start_offset();
            }

            if let Some(record) = plog.read(position) {
                group.advance(partition, position + 1);
                *cursor = slot + 1;
                stats.record_fetched();
                return Some(record.clone());
            }
        }

        None
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    topics: HashMap<String, TopicState>,
}

#[derive(Debug)]
struct BrokerInner {
    config: BrokerConfig,
    state: Mutex<BrokerState>,
    /// Signalled on append, rebalance and availability changes
    data_ready: Condvar,
    available: AtomicBool,
    next_member_id: AtomicU64,
}

impl BrokerInner {
    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PubSubError::connection_loss(format!(
                "broker {} unavailable",
                self.config.bootstrap_servers.join(",")
            )))
        }
    }

    fn create_topic(&self, state: &mut BrokerState, spec: &TopicSpec) -> Result<TopicOutcome> {
        spec.validate()?;
        if spec.replication_factor > self.config.cluster_size {
            return Err(PubSubError::invalid_parameter(
                "replication_factor",
                format!(
                    "Replication factor {} larger than cluster size {}",
                    spec.replication_factor, self.config.cluster_size
                ),
            ));
        }

        if let Some(existing) = state.topics.get(&spec.name) {
            if existing.spec.same_shape(spec) {
                return Ok(TopicOutcome::AlreadyExists);
            }
            return Err(PubSubError::topic_shape_conflict(
                &spec.name,
                existing.spec.shape(),
                spec.shape(),
            ));
        }

        state
            .topics
            .insert(spec.name.clone(), TopicState::new(spec.clone()));
        log::info!("Created topic {}", spec);
        Ok(TopicOutcome::Created)
    }

    /// Make sure a topic exists, auto-creating it when allowed
    fn ensure_topic_for_use(&self, state: &mut BrokerState, name: &str) -> Result<()> {
        if state.topics.contains_key(name) {
            return Ok(());
        }

        if !self.config.auto_create_topics {
            return Err(PubSubError::topic_not_found(name));
        }

        let spec = TopicSpec::new(
            name,
            self.config.default_partitions,
            self.config.default_replication_factor,
        );
        self.create_topic(state, &spec).map(|_| ())
    }
}

/// Cloneable handle to an in-process broker
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Connect to a fresh broker with the given configuration
    pub fn connect(config: BrokerConfig) -> Result<Self> {
        config.validate()?;
        log::debug!(
            "In-memory broker ready (bootstrap servers: {})",
            config.bootstrap_servers.join(",")
        );
        Ok(Self::from_config(config))
    }

    /// Broker with default configuration
    pub fn new() -> Self {
        Self::from_config(BrokerConfig::default())
    }

    fn from_config(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                config,
                state: Mutex::new(BrokerState::default()),
                data_ready: Condvar::new(),
                available: AtomicBool::new(true),
                next_member_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Simulate an outage (`false`) or recovery (`true`)
    pub fn set_available(&self, available: bool) {
        let _state = self.inner.state.lock().unwrap();
        self.inner.available.store(available, Ordering::SeqCst);
        self.inner.data_ready.notify_all();
        if available {
            log::info!("Broker available");
        } else {
            log::warn!("Broker unavailable");
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    /// Statistics of one topic
    pub fn topic_stats(&self, topic: &str) -> Option<Arc<TopicStats>> {
        let state = self.inner.state.lock().unwrap();
        state.topics.get(topic).map(|t| t.stats.clone())
    }

    /// (log start, high watermark) of a partition
    pub fn offsets(&self, topic: &str, partition: u32) -> Result<(u64, u64)> {
        let state = self.inner.state.lock().unwrap();
        let topic_state = state
            .topics
            .get(topic)
            .ok_or_else(|| PubSubError::topic_not_found(topic))?;
        let plog = topic_state
            .partitions
            .get(partition as usize)
            .ok_or_else(|| {
                PubSubError::invalid_parameter(
                    "partition",
                    format!("Partition {} not found for topic '{}'", partition, topic),
                )
            })?;
        Ok((plog.log_start_offset(), plog.high_watermark()))
    }

    /// Groups subscribed to a topic
    pub fn list_groups(&self, topic: &str) -> Vec<String> {
        let state = self.inner.state.lock().unwrap();
        let mut groups: Vec<String> = state
            .topics
            .get(topic)
            .map(|t| t.groups.keys().cloned().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }

    /// Aggregate broker statistics
    pub fn stats(&self) -> BrokerStats {
        let state = self.inner.state.lock().unwrap();
        BrokerStats {
            total_topics: state.topics.len(),
            total_partitions: state.topics.values().map(|t| t.partitions.len()).sum(),
            total_records: state
                .topics
                .values()
                .map(|t| t.stats.records_appended.load(Ordering::Relaxed))
                .sum(),
            total_groups: state.topics.values().map(|t| t.groups.len()).sum(),
        }
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerAdmin for InMemoryBroker {
    fn create_topic_if_absent(&self, spec: &TopicSpec) -> Result<TopicOutcome> {
        self.inner.check_available()?;
        let mut state = self.inner.state.lock().unwrap();
        self.inner.create_topic(&mut state, spec)
    }

    fn describe_topic(&self, name: &str) -> Option<TopicSpec> {
        let state = self.inner.state.lock().unwrap();
        state.topics.get(name).map(|t| t.spec.clone())
    }

    fn list_topics(&self) -> Vec<TopicSpec> {
        let state = self.inner.state.lock().unwrap();
        let mut topics: Vec<TopicSpec> = state.topics.values().map(|t| t.spec.clone()).collect();
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        topics
    }
}

impl BrokerClient for InMemoryBroker {
    fn send(&self, record: OutboundRecord, acks: Acks) -> Result<RecordMetadata> {
        self.inner.check_available()?;

        let metadata = {
            let mut state = self.inner.state.lock().unwrap();
            self.inner.ensure_topic_for_use(&mut state, &record.topic)?;
            let topic = state
                .topics
                .get_mut(&record.topic)
                .ok_or_else(|| PubSubError::topic_not_found(&record.topic))?;

            if record.value.len() > self.inner.config.max_record_bytes {
                topic.stats.record_rejected();
                return Err(PubSubError::invalid_parameter(
                    "value",
                    format!(
                        "Record of {} bytes exceeds maximum {}",
                        record.value.len(),
                        self.inner.config.max_record_bytes
                    ),
                ));
            }

            let partition = select_partition(
                record.key.as_deref(),
                topic.spec.partitions,
                &topic.round_robin,
            );
            let timestamp = now_millis();
            let value_size = record.value.len();
            let stored = ConsumerRecord {
                metadata: RecordMetadata {
                    topic: record.topic.clone(),
                    partition,
                    offset: 0,
                    timestamp,
                },
                key: record.key,
                value: record.value,
                headers: record.headers,
            };

            let plog = &mut topic.partitions[partition as usize];
            let offset = plog.append(stored);
            if let Some(max_records) = self.inner.config.retention_records {
                plog.retain_last(max_records);
            }
            topic.stats.record_appended(value_size);

            RecordMetadata {
                topic: record.topic,
                partition,
                offset,
                timestamp,
            }
        };

        // Single simulated broker: the append above satisfies every ack level
        log::trace!(
            "Appended {}[{}]@{} ({})",
            metadata.topic,
            metadata.partition,
            metadata.offset,
            acks.name()
        );
        self.inner.data_ready.notify_all();
        Ok(metadata)
    }

    fn subscribe(&self, topic: &str, group_id: &str) -> Result<Box<dyn Subscription>> {
        self.inner.check_available()?;
        if group_id.is_empty() {
            return Err(PubSubError::invalid_parameter(
                "group_id",
                "Consumer group id cannot be empty",
            ));
        }

        let member_id = format!(
            "{}-{}",
            group_id,
            self.inner.next_member_id.fetch_add(1, Ordering::Relaxed)
        );

        {
            let mut state = self.inner.state.lock().unwrap();
            self.inner.ensure_topic_for_use(&mut state, topic)?;
            let topic_state = state
                .topics
                .get_mut(topic)
                .ok_or_else(|| PubSubError::topic_not_found(topic))?;

            if !topic_state.groups.contains_key(group_id) {
                let start = topic_state.start_positions(self.inner.config.offset_reset);
                topic_state
                    .groups
                    .insert(group_id.to_string(), GroupState::new(group_id, start));
                topic_state
                    .stats
                    .active_groups
                    .fetch_add(1, Ordering::Relaxed);
            }

            let group = topic_state
                .groups
                .get_mut(group_id)
                .ok_or_else(|| PubSubError::invalid_parameter("group_id", "Group vanished"))?;
            let generation = group.join(member_id.clone());
            log::info!(
                "Member {} joined group '{}' on '{}' (generation {}, partitions {:?})",
                member_id,
                group_id,
                topic,
                generation,
                group.assignment(&member_id)
            );
            topic_state.stats.add_subscription();
        }
        self.inner.data_ready.notify_all();

        Ok(Box::new(InMemorySubscription {
            inner: self.inner.clone(),
            topic: topic.to_string(),
            group_id: group_id.to_string(),
            member_id,
            cursor: 0,
            closed: false,
        }))
    }
}

/// Group member handle returned by [`InMemoryBroker::subscribe`]
#[derive(Debug)]
pub struct InMemorySubscription {
    inner: Arc<BrokerInner>,
    topic: String,
    group_id: String,
    member_id: String,
    cursor: usize,
    closed: bool,
}

impl Subscription for InMemorySubscription {
    fn poll(&mut self, timeout: Duration) -> Result<Option<ConsumerRecord>> {
        if self.closed {
            return Err(PubSubError::invalid_parameter(
                "subscription",
                "Subscription is closed",
            ));
        }

        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock().unwrap();

        loop {
            self.inner.check_available()?;

            let topic = state
                .topics
                .get_mut(&self.topic)
                .ok_or_else(|| PubSubError::topic_not_found(&self.topic))?;
            if let Some(record) = topic.fetch_next(&self.group_id, &self.member_id, &mut self.cursor)
            {
                return Ok(Some(record));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let (guard, _) = self
                .inner
                .data_ready
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
        }
    }

    fn assignment(&self) -> Vec<u32> {
        let state = self.inner.state.lock().unwrap();
        state
            .topics
            .get(&self.topic)
            .and_then(|t| t.groups.get(&self.group_id))
            .map(|g| g.assignment(&self.member_id).to_vec())
            .unwrap_or_default()
    }

    fn member_id(&self) -> &str {
        &self.member_id
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(topic) = state.topics.get_mut(&self.topic) {
                if let Some(group) = topic.groups.get_mut(&self.group_id) {
                    group.leave(&self.member_id);
                    log::info!(
                        "Member {} left group '{}' on '{}' (generation {})",
                        self.member_id,
                        self.group_id,
                        self.topic,
                        group.generation()
                    );
                }
                topic.stats.remove_subscription();
            }
        }
        self.inner.data_ready.notify_all();
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        self.close();
    }
}
