//! Core trait for payload codecs

use super::{Payload, PayloadKind, SerializationFormat};
use crate::error::{PubSubError, Result};

/// Serialize/deserialize pair bound to one payload kind
pub trait PayloadCodec: Send + Sync {
    /// Payload kind this codec carries
    fn kind(&self) -> PayloadKind;

    /// Wire format identifier
    fn format(&self) -> SerializationFormat;

    /// Value of the `content-type` header for encoded records
    fn content_type(&self) -> &'static str;

    /// Get codec name for debugging
    fn name(&self) -> String {
        format!("{}/{}", self.kind().name(), self.format().name())
    }

    /// Encode a payload into wire bytes
    fn encode(&self, payload: &Payload) -> Result<Vec<u8>>;

    /// Decode wire bytes; fails with `MalformedPayload` on schema violations
    fn decode(&self, bytes: &[u8]) -> Result<Payload>;

    /// Reject payloads of another kind before encoding
    fn check_kind(&self, payload: &Payload) -> Result<()> {
        if payload.kind() != self.kind() {
            return Err(PubSubError::serialization(format!(
                "Codec {} cannot encode {} payload",
                self.name(),
                payload.kind()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for dyn PayloadCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCodec")
            .field("kind", &self.kind())
            .field("format", &self.format())
            .finish()
    }
}
