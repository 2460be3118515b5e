//! Identity UTF-8 codec for plain text topics

use super::{traits::PayloadCodec, Payload, PayloadKind, SerializationFormat};
use crate::error::{PubSubError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl PayloadCodec for TextCodec {
    fn kind(&self) -> PayloadKind {
        PayloadKind::Text
    }

    fn format(&self) -> SerializationFormat {
        SerializationFormat::Text
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        self.check_kind(payload)?;
        match payload {
            Payload::Text(text) => Ok(text.as_bytes().to_vec()),
            _ => unreachable!("kind checked above"),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Payload> {
        std::str::from_utf8(bytes)
            .map(|text| Payload::Text(text.to_string()))
            .map_err(|e| PubSubError::malformed(format!("Invalid UTF-8: {}", e)))
    }
}
