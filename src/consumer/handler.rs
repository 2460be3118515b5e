//! Application callbacks for delivered messages

use crate::{codec::Payload, topic::RecordMetadata};

/// Receives each successfully decoded message of a listener
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, payload: &Payload, metadata: &RecordMetadata);
}

impl<F> MessageHandler for F
where
    F: Fn(&Payload, &RecordMetadata) + Send + Sync + 'static,
{
    fn handle(&self, payload: &Payload, metadata: &RecordMetadata) {
        self(payload, metadata)
    }
}

/// Handler that logs every message at `info`, tagged with a label
#[derive(Debug, Clone)]
pub struct LoggingHandler {
    label: String,
}

impl LoggingHandler {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl MessageHandler for LoggingHandler {
    fn handle(&self, payload: &Payload, metadata: &RecordMetadata) {
        match payload {
            Payload::Text(text) => log::info!(
                "{}: received message from {}[{}]@{}: {}",
                self.label,
                metadata.topic,
                metadata.partition,
                metadata.offset,
                text
            ),
            Payload::RiderLocation(location) => log::info!(
                "{}: received location {} : {} : {}",
                self.label,
                location.rider_id,
                location.latitude,
                location.longitude
            ),
        }
    }
}
