use std::sync::Mutex;

use anyhow::anyhow;
use chrono::Utc;
use rand::{
    SeedableRng,
    distr::{Distribution, Uniform},
};
use rand_chacha::ChaCha20Rng;

use crate::{
    position::{Coordinate, Geoposition},
    prelude::*,
    provider::lock,
    source::PositionSource,
};

/// Mean earth radius in meters
const EARTH_RADIUS: Coordinate = 6_371_008.8;

/// Horizontal accuracy reported in high accuracy mode, in meters
const HIGH_ACCURACY_METERS: Coordinate = 5.0;
/// Horizontal accuracy reported otherwise, in meters
const LOW_ACCURACY_METERS: Coordinate = 50.0;

/// Great circle distance between two points in meters
pub fn distance_meters(from: (Coordinate, Coordinate), to: (Coordinate, Coordinate)) -> Coordinate {
    let (lat1, long1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, long2) = (to.0.to_radians(), to.1.to_radians());
    let d_lat = lat2 - lat1;
    let d_long = long2 - long1;

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_long / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().asin()
}

/// Initial bearing from one point to another, degrees clockwise from north in [0, 360)
pub fn bearing_degrees(from: (Coordinate, Coordinate), to: (Coordinate, Coordinate)) -> Coordinate {
    let (lat1, long1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, long2) = (to.0.to_radians(), to.1.to_radians());
    let d_long = long2 - long1;

    let y = d_long.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_long.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

struct RouteState {
    next: usize,
    rng: ChaCha20Rng,
    last: Option<Geoposition>,
}

/// A [PositionSource] that walks a loop of waypoints, one per acquisition.
///
/// Reported accuracy is jittered with a seeded RNG so runs are reproducible. Heading and speed
/// are derived from the previous fix handed out.
pub struct SimulatedRoute {
    waypoints: Vec<(Coordinate, Coordinate)>,
    jitter: Uniform<Coordinate>,
    state: Mutex<RouteState>,
}

impl SimulatedRoute {
    pub fn new(waypoints: Vec<(Coordinate, Coordinate)>, seed: u64) -> Result<Self> {
        let jitter = Uniform::new_inclusive(0.8, 1.2).context("Invalid jitter range")?;

        Ok(Self {
            waypoints,
            jitter,
            state: Mutex::new(RouteState {
                next: 0,
                rng: ChaCha20Rng::seed_from_u64(seed),
                last: None,
            }),
        })
    }

    pub fn waypoints(&self) -> &[(Coordinate, Coordinate)] {
        &self.waypoints
    }

    /// Produce the next fix along the route
    pub fn next_fix(&self, high_accuracy: bool) -> Result<Geoposition> {
        if self.waypoints.is_empty() {
            return Err(anyhow!("Simulated route has no waypoints"));
        }

        let mut state = lock(&self.state);
        let (latitude, longitude) = self.waypoints[state.next % self.waypoints.len()];
        state.next = state.next.wrapping_add(1);

        let base = if high_accuracy {
            HIGH_ACCURACY_METERS
        } else {
            LOW_ACCURACY_METERS
        };
        let accuracy = base * self.jitter.sample(&mut state.rng);

        let now = Utc::now();
        let mut fix = Geoposition::new(latitude, longitude, accuracy, now);

        if let Some(last) = state.last {
            let from = (last.latitude, last.longitude);
            let to = (latitude, longitude);
            let distance = distance_meters(from, to);
            if distance > 0.0 {
                fix = fix.with_heading(bearing_degrees(from, to));
            }
            let elapsed = (now - last.timestamp).num_milliseconds();
            if elapsed > 0 {
                fix = fix.with_speed(distance / (elapsed as Coordinate / 1000.0));
            }
        }

        state.last = Some(fix);
        Ok(fix)
    }
}

impl PositionSource for SimulatedRoute {
    fn technology(&self) -> &str {
        "simulated"
    }

    fn acquire(&self, high_accuracy: bool) -> impl Future<Output = Result<Geoposition>> + Send {
        let fix = self.next_fix(high_accuracy);
        async move { fix }
    }
}
