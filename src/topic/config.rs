//! Topic shape and delivery guarantees

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PubSubError, Result};

/// Maximum topic name length
pub const MAX_TOPIC_NAME_LENGTH: usize = 249;

/// Topic shape: name, partition count and replication factor.
///
/// The shape is fixed once the topic exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicSpec {
    /// Topic name (must be unique)
    pub name: String,
    /// Number of partitions
    pub partitions: u32,
    /// Replication factor
    pub replication_factor: u16,
}

impl TopicSpec {
    /// Create a new topic spec
    pub fn new(name: impl Into<String>, partitions: u32, replication_factor: u16) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication_factor,
        }
    }

    /// Whether another spec describes the same partitions and replication
    pub fn same_shape(&self, other: &TopicSpec) -> bool {
        self.partitions == other.partitions && self.replication_factor == other.replication_factor
    }

    /// Validate the spec
    pub fn validate(&self) -> Result<()> {
        validate_topic_name(&self.name)?;

        if self.partitions == 0 {
            return Err(PubSubError::invalid_parameter(
                "partitions",
                "Partition count cannot be zero",
            ));
        }

        if self.replication_factor == 0 {
            return Err(PubSubError::invalid_parameter(
                "replication_factor",
                "Replication factor cannot be zero",
            ));
        }

        Ok(())
    }

    /// Short shape description used in conflict reports
    pub fn shape(&self) -> String {
        format!(
            "partitions={}, replication_factor={}",
            self.partitions, self.replication_factor
        )
    }
}

impl fmt::Display for TopicSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.shape())
    }
}

/// Check a topic name: non-empty, bounded, `[A-Za-z0-9._-]` only
pub fn validate_topic_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PubSubError::invalid_parameter(
            "name",
            "Topic name cannot be empty",
        ));
    }

    if name.len() > MAX_TOPIC_NAME_LENGTH {
        return Err(PubSubError::invalid_parameter(
            "name",
            format!("Topic name longer than {} characters", MAX_TOPIC_NAME_LENGTH),
        ));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(PubSubError::invalid_parameter(
            "name",
            format!("Topic name contains illegal character '{}'", bad),
        ));
    }

    Ok(())
}

/// Acknowledgment level requested from the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Acks {
    /// Fire-and-forget: accepted by the client buffer
    None,
    /// Partition leader has written the record
    #[default]
    Leader,
    /// Every in-sync replica has written the record
    All,
}

impl Acks {
    pub fn name(self) -> &'static str {
        match self {
            Acks::None => "fire-and-forget",
            Acks::Leader => "leader-ack",
            Acks::All => "all-replicas-ack",
        }
    }
}

impl std::str::FromStr for Acks {
    type Err = PubSubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" | "0" | "fire-and-forget" => Ok(Acks::None),
            "leader" | "1" | "leader-ack" => Ok(Acks::Leader),
            "all" | "-1" | "all-replicas-ack" => Ok(Acks::All),
            other => Err(PubSubError::invalid_parameter(
                "acks",
                format!("Unknown acknowledgment level '{}'", other),
            )),
        }
    }
}
