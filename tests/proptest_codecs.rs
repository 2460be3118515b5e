//! Property-based tests for the rider location codecs
//!
//! Every rider location must decode back to the value that was encoded,
//! for any rider id and any coordinate pair.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use rider_pubsub::{
        codec::{BincodeRiderCodec, JsonRiderCodec},
        Payload, PayloadCodec, RiderLocation,
    };

    fn in_range_location() -> impl Strategy<Value = RiderLocation> {
        (any::<String>(), -90.0f64..=90.0, -180.0f64..=180.0)
            .prop_map(|(rider_id, latitude, longitude)| {
                RiderLocation::new(rider_id, latitude, longitude)
            })
    }

    fn finite_coordinate() -> impl Strategy<Value = f64> {
        prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO
    }

    fn assert_round_trip(codec: &dyn PayloadCodec, location: RiderLocation) {
        let payload = Payload::from(location);
        let bytes = codec.encode(&payload).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), payload, "{}", codec.name());
    }

    proptest! {
        #[test]
        fn prop_json_round_trip(location in in_range_location()) {
            assert_round_trip(&JsonRiderCodec, location);
        }

        #[test]
        fn prop_bincode_round_trip(location in in_range_location()) {
            assert_round_trip(&BincodeRiderCodec, location);
        }

        /// Out-of-range but finite coordinates are carried unchanged
        #[test]
        fn prop_json_keeps_finite_out_of_range(
            rider_id in "[a-z0-9]{1,12}",
            latitude in finite_coordinate(),
            longitude in finite_coordinate(),
        ) {
            assert_round_trip(&JsonRiderCodec, RiderLocation::new(rider_id, latitude, longitude));
        }

        #[test]
        fn prop_bincode_keeps_infinite_coordinates(
            rider_id in "[a-z0-9]{1,12}",
            latitude in prop::num::f64::INFINITE | prop::num::f64::NORMAL,
            longitude in prop::num::f64::INFINITE | prop::num::f64::NORMAL,
        ) {
            assert_round_trip(
                &BincodeRiderCodec,
                RiderLocation::new(rider_id, latitude, longitude),
            );
        }
    }
}
