//! Tests for the payload wire formats

#[cfg(test)]
mod tests {
    use rider_pubsub::{
        codec::{codec_for, default_codec, BincodeRiderCodec, JsonRiderCodec, TextCodec},
        Payload, PayloadCodec, PayloadKind, PubSubError, RiderLocation, SerializationFormat,
    };

    fn samples() -> Vec<RiderLocation> {
        vec![
            RiderLocation::new("rider123", 28.31, 77.34),
            RiderLocation::new("rider123", 16.27, 68.45),
            RiderLocation::new("", 0.0, -0.0),
            RiderLocation::new("édith-🚲", -90.0, 180.0),
            RiderLocation::new("precise", 12.345678901234567, -98.76543210987654),
        ]
    }

    #[test]
    fn test_rider_formats_preserve_values() {
        let codecs: Vec<Box<dyn PayloadCodec>> =
            vec![Box::new(JsonRiderCodec), Box::new(BincodeRiderCodec)];
        for codec in &codecs {
            for location in samples() {
                let payload = Payload::from(location.clone());
                let decoded = codec.decode(&codec.encode(&payload).unwrap()).unwrap();
                assert_eq!(decoded, payload, "{}", codec.name());
            }
        }
    }

    #[test]
    fn test_json_wire_shape() {
        let bytes = JsonRiderCodec
            .encode(&Payload::from(RiderLocation::new("rider123", 28.31, 77.34)))
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["riderId"], "rider123");
        assert_eq!(value["latitude"], 28.31);
        assert_eq!(value["longitude"], 77.34);
    }

    #[test]
    fn test_json_accepts_field_reordering_and_extras() {
        let decoded = JsonRiderCodec
            .decode(br#"{"longitude": 1.5, "note": "x", "riderId": "r", "latitude": -2.5}"#)
            .unwrap();
        assert_eq!(decoded, Payload::from(RiderLocation::new("r", -2.5, 1.5)));
    }

    fn assert_malformed(codec: &dyn PayloadCodec, bytes: &[u8]) {
        let err = codec.decode(bytes).unwrap_err();
        assert!(
            matches!(err, PubSubError::MalformedPayload { .. }),
            "{}: {:?}",
            codec.name(),
            err
        );
    }

    #[test]
    fn test_invalid_inputs_are_malformed() {
        assert_malformed(&TextCodec, &[0xff, 0xfe, 0x00]);
        assert_malformed(&JsonRiderCodec, b"not json");
        assert_malformed(&JsonRiderCodec, br#"{"riderId": "r", "latitude": 1.0}"#);
        assert_malformed(
            &JsonRiderCodec,
            br#"{"riderId": 1, "latitude": 1.0, "longitude": 2.0}"#,
        );
        assert_malformed(&BincodeRiderCodec, &[1, 2, 3]);
    }

    #[test]
    fn test_text_is_raw_utf8() {
        let bytes = TextCodec.encode(&Payload::from("hello")).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(TextCodec.decode(b"").unwrap(), Payload::from(""));
    }

    #[test]
    fn test_codec_selection() {
        assert_eq!(default_codec(PayloadKind::Text).format(), SerializationFormat::Text);
        assert_eq!(
            default_codec(PayloadKind::RiderLocation).format(),
            SerializationFormat::Json
        );
        assert!(codec_for(PayloadKind::Text, SerializationFormat::Bincode).is_err());
        assert!(codec_for(PayloadKind::RiderLocation, SerializationFormat::Text).is_err());
    }

    #[test]
    fn test_wrong_kind_is_rejected_on_encode() {
        assert!(TextCodec
            .encode(&Payload::from(RiderLocation::new("r", 0.0, 0.0)))
            .is_err());
        assert!(JsonRiderCodec.encode(&Payload::from("text")).is_err());
    }
}
