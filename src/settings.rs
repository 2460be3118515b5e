//! Pipeline configuration file
//!
//! A TOML document describing the broker connection, producer and consumer
//! settings, the topics to declare at startup and the listeners to run:
//!
//! ```toml
//! [broker]
//! bootstrap_servers = ["localhost:9092"]
//!
//! [producer]
//! acks = "leader"
//! emission_interval_ms = 1000
//!
//! [consumer]
//! poll_timeout_ms = 100
//! retry = { initial_delay_ms = 100, max_retries = 10 }
//!
//! [[topics]]
//! name = "my-topic-new"
//! kind = "rider-location"
//! format = "json"
//!
//! [[listeners]]
//! topic = "my-topic-new"
//! group_id = "my-new-group-rider"
//! ```
//!
//! Every section is optional. Listener payload kinds default to the kind of
//! the matching `[[topics]]` entry.

use std::{collections::HashSet, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    broker::BrokerConfig,
    codec::{codec_for, CodecRegistry, PayloadKind, SerializationFormat},
    config,
    consumer::{ConsumerConfig, ListenerSpec},
    error::{PubSubError, Result},
    producer::ProducerConfig,
    topic::{Acks, TopicSpec},
};

/// `[producer]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSettings {
    pub acks: Acks,
    pub replicate_key_header: bool,
    /// Cadence of scheduled emission
    pub emission_interval_ms: u64,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        let producer = ProducerConfig::default();
        Self {
            acks: producer.acks,
            replicate_key_header: producer.replicate_key_header,
            emission_interval_ms: config::DEFAULT_EMISSION_INTERVAL_MS,
        }
    }
}

/// One `[[topics]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicEntry {
    pub name: String,
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u16,
    pub kind: PayloadKind,
    /// Wire format; the kind's default when absent
    #[serde(default)]
    pub format: Option<SerializationFormat>,
}

fn default_partitions() -> u32 {
    config::DEFAULT_PARTITIONS
}

fn default_replication_factor() -> u16 {
    config::DEFAULT_REPLICATION_FACTOR
}

impl TopicEntry {
    pub fn new(name: impl Into<String>, kind: PayloadKind) -> Self {
        Self {
            name: name.into(),
            partitions: config::DEFAULT_PARTITIONS,
            replication_factor: config::DEFAULT_REPLICATION_FACTOR,
            kind,
            format: None,
        }
    }

    pub fn with_partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn spec(&self) -> TopicSpec {
        TopicSpec::new(&self.name, self.partitions, self.replication_factor)
    }

    pub fn format(&self) -> SerializationFormat {
        self.format.unwrap_or_else(|| self.kind.default_format())
    }
}

/// One `[[listeners]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerEntry {
    pub topic: String,
    pub group_id: String,
    /// Payload kind; taken from the topic entry when absent
    #[serde(default)]
    pub kind: Option<PayloadKind>,
}

impl ListenerEntry {
    pub fn new(topic: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group_id: group_id.into(),
            kind: None,
        }
    }
}

/// Whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub broker: BrokerConfig,
    pub producer: ProducerSettings,
    pub consumer: ConsumerConfig,
    pub topics: Vec<TopicEntry>,
    pub listeners: Vec<ListenerEntry>,
}

impl PipelineSettings {
    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PubSubError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse_str(&contents)
    }

    /// Parse settings from a TOML string
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| PubSubError::config(format!("Failed to parse config: {}", e)))
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PubSubError::config(format!("Failed to render config: {}", e)))
    }

    /// The topics and listeners of the reference rider pipeline
    pub fn reference() -> Self {
        Self {
            topics: vec![
                TopicEntry::new(config::TEXT_TOPIC, PayloadKind::Text),
                TopicEntry::new(config::RIDER_TOPIC, PayloadKind::RiderLocation),
                TopicEntry::new(config::PARTITIONED_TOPIC, PayloadKind::Text)
                    .with_partitions(config::PARTITIONED_TOPIC_PARTITIONS),
            ],
            listeners: vec![
                ListenerEntry::new(config::TEXT_TOPIC, config::TEXT_GROUP),
                ListenerEntry::new(config::TEXT_TOPIC, config::TEXT_GROUP_2),
                ListenerEntry::new(config::RIDER_TOPIC, config::RIDER_GROUP),
            ],
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.broker
            .validate()
            .map_err(|e| PubSubError::config(format!("broker: {}", e)))?;
        self.consumer
            .validate()
            .map_err(|e| PubSubError::config(format!("consumer: {}", e)))?;

        if self.producer.emission_interval_ms == 0 {
            return Err(PubSubError::config(
                "producer: Emission interval cannot be 0",
            ));
        }

        let mut seen = HashSet::new();
        for topic in &self.topics {
            if !seen.insert(topic.name.as_str()) {
                return Err(PubSubError::config(format!(
                    "Topic '{}' is declared twice",
                    topic.name
                )));
            }
            topic
                .spec()
                .validate()
                .and_then(|_| codec_for(topic.kind, topic.format()).map(|_| ()))
                .map_err(|e| PubSubError::config(format!("topic '{}': {}", topic.name, e)))?;
            if topic.replication_factor > self.broker.cluster_size {
                return Err(PubSubError::config(format!(
                    "topic '{}': Replication factor {} exceeds cluster size {}",
                    topic.name, topic.replication_factor, self.broker.cluster_size
                )));
            }
        }

        self.listener_specs().map(|_| ())
    }

    pub fn topic(&self, name: &str) -> Option<&TopicEntry> {
        self.topics.iter().find(|t| t.name == name)
    }

    pub fn topic_specs(&self) -> Vec<TopicSpec> {
        self.topics.iter().map(TopicEntry::spec).collect()
    }

    /// Resolve listener entries, filling in payload kinds from topics
    pub fn listener_specs(&self) -> Result<Vec<ListenerSpec>> {
        self.listeners
            .iter()
            .map(|entry| {
                let kind = entry
                    .kind
                    .or_else(|| self.topic(&entry.topic).map(|t| t.kind))
                    .ok_or_else(|| {
                        PubSubError::config(format!(
                            "listener '{}' on '{}': No payload kind and no matching topic entry",
                            entry.group_id, entry.topic
                        ))
                    })?;
                let spec = ListenerSpec::new(&entry.topic, &entry.group_id, kind);
                spec.validate().map_err(|e| {
                    PubSubError::config(format!("listener '{}': {}", entry.group_id, e))
                })?;
                Ok(spec)
            })
            .collect()
    }

    /// Assign every declared topic's codec in `registry`
    pub fn register_codecs(&self, registry: &CodecRegistry) -> Result<()> {
        for topic in &self.topics {
            registry.assign_format(&topic.name, topic.kind, topic.format())?;
        }
        Ok(())
    }

    pub fn producer_config(&self) -> ProducerConfig {
        ProducerConfig {
            acks: self.producer.acks,
            replicate_key_header: self.producer.replicate_key_header,
        }
    }

    pub fn emission_interval(&self) -> Duration {
        Duration::from_millis(self.producer.emission_interval_ms)
    }
}
