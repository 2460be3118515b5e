//! Simulated rider location source
//!
//! Each simulated rider starts somewhere inside a bounding box and then
//! drifts by a small random step per sample. Riders are visited in turn,
//! and every emission is keyed by rider id so a rider's samples stay in
//! order on one partition.

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::scheduler::{Emission, EmissionSource};
use crate::{
    codec::RiderLocation,
    error::{PubSubError, Result},
};

/// Sample emitted by the on-demand rider trigger
pub fn reference_sample() -> RiderLocation {
    RiderLocation::new("rider123", 28.31, 77.34)
}

/// Sample emitted by the fixed streaming supplier
pub fn streaming_sample() -> RiderLocation {
    RiderLocation::new("rider123", 16.27, 68.45)
}

/// Center of the area simulated riders start in
const START_CENTER: (f64, f64) = (28.61, 77.21);
/// Half-width of the start area, degrees
const START_SPREAD: f64 = 0.25;
/// Maximum drift per sample, degrees
const MAX_STEP: f64 = 0.002;

#[derive(Debug)]
enum Mode {
    Fixed(RiderLocation),
    Simulated {
        rng: StdRng,
        riders: Vec<RiderLocation>,
        next: usize,
    },
}

/// Generator of rider location samples
#[derive(Debug)]
pub struct RiderLocationGenerator {
    mode: Mode,
}

impl RiderLocationGenerator {
    /// Simulate `rider_count` riders named `rider-1`, `rider-2`, ...
    pub fn new(seed: u64, rider_count: usize) -> Result<Self> {
        let ids = (1..=rider_count).map(|i| format!("rider-{}", i)).collect();
        Self::with_riders(seed, ids)
    }

    /// Simulate the given rider ids
    pub fn with_riders(seed: u64, rider_ids: Vec<String>) -> Result<Self> {
        if rider_ids.is_empty() {
            return Err(PubSubError::invalid_parameter(
                "rider_ids",
                "At least one rider is required",
            ));
        }
        if rider_ids.iter().any(String::is_empty) {
            return Err(PubSubError::invalid_parameter(
                "rider_ids",
                "Rider id cannot be empty",
            ));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let riders = rider_ids
            .into_iter()
            .map(|id| {
                let latitude =
                    START_CENTER.0 + rng.gen_range(-START_SPREAD..=START_SPREAD);
                let longitude =
                    START_CENTER.1 + rng.gen_range(-START_SPREAD..=START_SPREAD);
                RiderLocation::new(id, latitude, longitude)
            })
            .collect();

        Ok(Self {
            mode: Mode::Simulated {
                rng,
                riders,
                next: 0,
            },
        })
    }

    /// Always produce the same sample
    pub fn fixed(sample: RiderLocation) -> Self {
        Self {
            mode: Mode::Fixed(sample),
        }
    }

    /// Produce the next sample
    pub fn next_location(&mut self) -> RiderLocation {
        match &mut self.mode {
            Mode::Fixed(sample) => sample.clone(),
            Mode::Simulated { rng, riders, next } => {
                let index = *next;
                *next = (index + 1) % riders.len();
                let rider = &mut riders[index];

                rider.latitude =
                    (rider.latitude + rng.gen_range(-MAX_STEP..=MAX_STEP)).clamp(-90.0, 90.0);
                rider.longitude =
                    (rider.longitude + rng.gen_range(-MAX_STEP..=MAX_STEP)).clamp(-180.0, 180.0);
                rider.clone()
            }
        }
    }
}

impl EmissionSource for RiderLocationGenerator {
    fn next_emission(&mut self) -> Emission {
        let location = self.next_location();
        log::debug!("Sending rider location: {}", location.rider_id);
        Emission::new(location.clone()).with_key(location.rider_id)
    }
}
