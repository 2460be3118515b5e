//! Rider location record and its structured codecs

use bincode::Options;
use serde::{Deserialize, Serialize};

use super::{traits::PayloadCodec, Payload, PayloadKind, SerializationFormat};
use crate::error::{PubSubError, Result};

/// Upper bound on an encoded bincode record
const MAX_BINCODE_RECORD: u64 = 64 * 1024;

/// Location sample reported by a rider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderLocation {
    pub rider_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl RiderLocation {
    pub fn new(rider_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            rider_id: rider_id.into(),
            latitude,
            longitude,
        }
    }

    /// Check the domain rules: non-empty id, latitude in -90..=90,
    /// longitude in -180..=180.
    pub fn validate(&self) -> Result<()> {
        if self.rider_id.is_empty() {
            return Err(PubSubError::invalid_parameter(
                "rider_id",
                "Rider id cannot be empty",
            ));
        }

        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(PubSubError::invalid_parameter(
                "latitude",
                format!("Latitude {} outside -90..90", self.latitude),
            ));
        }

        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(PubSubError::invalid_parameter(
                "longitude",
                format!("Longitude {} outside -180..180", self.longitude),
            ));
        }

        Ok(())
    }
}

fn rider_of(payload: &Payload) -> &RiderLocation {
    match payload {
        Payload::RiderLocation(location) => location,
        _ => unreachable!("kind checked by caller"),
    }
}

/// JSON codec, field names `riderId`, `latitude`, `longitude`.
///
/// Coordinates outside the geographic range are carried unchanged as long
/// as they are finite. JSON has no literal for NaN or infinity, so encoding
/// such a coordinate fails with `Serialization`; topics that must carry
/// them should use [`BincodeRiderCodec`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRiderCodec;

impl PayloadCodec for JsonRiderCodec {
    fn kind(&self) -> PayloadKind {
        PayloadKind::RiderLocation
    }

    fn format(&self) -> SerializationFormat {
        SerializationFormat::Json
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        self.check_kind(payload)?;
        let location = rider_of(payload);

        if !location.latitude.is_finite() || !location.longitude.is_finite() {
            return Err(PubSubError::serialization(
                "JSON cannot encode non-finite coordinates",
            ));
        }

        serde_json::to_vec(location)
            .map_err(|e| PubSubError::serialization(format!("JSON encode failed: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Payload> {
        let location: RiderLocation = serde_json::from_slice(bytes)?;
        Ok(Payload::RiderLocation(location))
    }
}

/// Field-ordered binary codec
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeRiderCodec;

impl BincodeRiderCodec {
    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_limit(MAX_BINCODE_RECORD)
            .reject_trailing_bytes()
    }
}

impl PayloadCodec for BincodeRiderCodec {
    fn kind(&self) -> PayloadKind {
        PayloadKind::RiderLocation
    }

    fn format(&self) -> SerializationFormat {
        SerializationFormat::Bincode
    }

    fn content_type(&self) -> &'static str {
        "application/x-bincode"
    }

    fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        self.check_kind(payload)?;
        Self::options()
            .serialize(rider_of(payload))
            .map_err(|e| PubSubError::serialization(format!("Bincode encode failed: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Payload> {
        let location: RiderLocation = Self::options().deserialize(bytes)?;
        Ok(Payload::RiderLocation(location))
    }
}
