//! Payload serialization contract
//!
//! Every topic carries exactly one payload kind, encoded by the codec bound
//! to that topic:
//!
//! **Text**: identity UTF-8 encoding
//!
//! **RiderLocation**: schema-stable structured encoding, either JSON
//! (camelCase field names) or bincode (field-ordered binary)
//!
//! Codecs never validate domain ranges. A rider at latitude 123.0 encodes and
//! decodes like any other; `RiderLocation::validate` is there for callers
//! that want the check.

pub mod registry;
pub mod rider;
pub mod text;
pub mod traits;

pub use registry::CodecRegistry;
pub use rider::{BincodeRiderCodec, JsonRiderCodec, RiderLocation};
pub use text::TextCodec;
pub use traits::PayloadCodec;

use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::error::{PubSubError, Result};

/// Payload kind carried by a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadKind {
    /// Plain UTF-8 text
    Text,
    /// Structured rider location record
    RiderLocation,
}

impl PayloadKind {
    /// Get kind name for headers and logging
    pub fn name(self) -> &'static str {
        match self {
            PayloadKind::Text => "text",
            PayloadKind::RiderLocation => "rider-location",
        }
    }

    /// Format used when a topic does not name one
    pub fn default_format(self) -> SerializationFormat {
        match self {
            PayloadKind::Text => SerializationFormat::Text,
            PayloadKind::RiderLocation => SerializationFormat::Json,
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PayloadKind {
    type Err = PubSubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(PayloadKind::Text),
            "rider-location" => Ok(PayloadKind::RiderLocation),
            other => Err(PubSubError::invalid_parameter(
                "payload_kind",
                format!("Unknown payload kind '{}'", other),
            )),
        }
    }
}

/// Wire format selectable per topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    Text,
    Json,
    Bincode,
}

impl SerializationFormat {
    /// Get format name for debugging/logging
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Text => "text",
            SerializationFormat::Json => "json",
            SerializationFormat::Bincode => "bincode",
        }
    }
}

/// Application-level message content
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    RiderLocation(RiderLocation),
}

impl Payload {
    /// Kind tag of this payload
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Text(_) => PayloadKind::Text,
            Payload::RiderLocation(_) => PayloadKind::RiderLocation,
        }
    }

    /// Borrow the text content, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Borrow the rider location, if any
    pub fn as_rider_location(&self) -> Option<&RiderLocation> {
        match self {
            Payload::RiderLocation(location) => Some(location),
            _ => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<RiderLocation> for Payload {
    fn from(location: RiderLocation) -> Self {
        Payload::RiderLocation(location)
    }
}

/// Build the codec for a kind/format pair
pub fn codec_for(
    kind: PayloadKind,
    format: SerializationFormat,
) -> Result<Arc<dyn PayloadCodec>> {
    match (kind, format) {
        (PayloadKind::Text, SerializationFormat::Text) => Ok(Arc::new(TextCodec)),
        (PayloadKind::RiderLocation, SerializationFormat::Json) => Ok(Arc::new(JsonRiderCodec)),
        (PayloadKind::RiderLocation, SerializationFormat::Bincode) => {
            Ok(Arc::new(BincodeRiderCodec))
        }
        (kind, format) => Err(PubSubError::invalid_parameter(
            "format",
            format!("Format {} cannot carry {} payloads", format.name(), kind),
        )),
    }
}

/// Codec used for a kind when nothing else is configured
pub fn default_codec(kind: PayloadKind) -> Arc<dyn PayloadCodec> {
    match kind {
        PayloadKind::Text => Arc::new(TextCodec),
        PayloadKind::RiderLocation => Arc::new(JsonRiderCodec),
    }
}
