//! Error types and handling for the publish/subscribe pipeline

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PubSubError>;

/// Error taxonomy shared by the codecs, the broker client and both cores
#[derive(Debug, thiserror::Error)]
pub enum PubSubError {
    /// Broker refused or could not accept a record
    #[error("Publish to '{topic}' failed: {reason}")]
    PublishFailure { topic: String, reason: String },

    /// Bytes did not conform to the codec's schema
    #[error("Malformed payload on {topic}[{partition}]@{offset}: {message}")]
    MalformedPayload {
        topic: String,
        partition: u32,
        offset: u64,
        message: String,
    },

    /// Topic already exists with a different shape
    #[error("Topic '{name}' exists as {existing}, requested {requested}")]
    TopicShapeConflict {
        name: String,
        existing: String,
        requested: String,
    },

    /// Transient broker unavailability
    #[error("Connection lost: {message}")]
    ConnectionLoss { message: String },

    /// Topic unknown to the broker
    #[error("Topic not found: {name}")]
    TopicNotFound { name: String },

    /// Invalid parameters or configuration
    #[error("Invalid parameter: {parameter} - {message}")]
    InvalidParameter { parameter: String, message: String },

    /// Encoding errors that are not schema violations of incoming data
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration file errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O related errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl PubSubError {
    /// Create an I/O error from a standard I/O error
    pub fn from_io(source: std::io::Error, context: &str) -> Self {
        Self::Io {
            message: format!("{}: {}", context, source),
            source: Some(source),
        }
    }

    /// Create a publish failure
    pub fn publish_failure(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PublishFailure {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed payload error without record context
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            topic: String::new(),
            partition: 0,
            offset: 0,
            message: message.into(),
        }
    }

    /// Create a topic shape conflict error
    pub fn topic_shape_conflict(
        name: impl Into<String>,
        existing: impl Into<String>,
        requested: impl Into<String>,
    ) -> Self {
        Self::TopicShapeConflict {
            name: name.into(),
            existing: existing.into(),
            requested: requested.into(),
        }
    }

    /// Create a connection loss error
    pub fn connection_loss(message: impl Into<String>) -> Self {
        Self::ConnectionLoss {
            message: message.into(),
        }
    }

    /// Create a topic not found error
    pub fn topic_not_found(name: impl Into<String>) -> Self {
        Self::TopicNotFound { name: name.into() }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Attach record coordinates to a malformed payload error.
    ///
    /// Other variants are returned unchanged.
    pub fn with_record_context(self, topic: &str, partition: u32, offset: u64) -> Self {
        match self {
            Self::MalformedPayload { message, .. } => Self::MalformedPayload {
                topic: topic.to_string(),
                partition,
                offset,
                message,
            },
            other => other,
        }
    }

    /// Whether the error is a transient broker outage
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::ConnectionLoss { .. })
    }
}

// Convert from common error types
impl From<std::io::Error> for PubSubError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io(err, "I/O operation failed")
    }
}

impl From<bincode::Error> for PubSubError {
    fn from(err: bincode::Error) -> Self {
        Self::malformed(format!("Bincode error: {}", err))
    }
}

impl From<serde_json::Error> for PubSubError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(format!("JSON error: {}", err))
    }
}

impl From<toml::de::Error> for PubSubError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("Failed to parse config: {}", err))
    }
}
