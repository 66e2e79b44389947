use geoprovider_logic::{Coordinate, SimulatedRoute, prelude::*};

/// A walk around a city block, closed so the route loops smoothly
pub const DEFAULT_WAYPOINTS: [(Coordinate, Coordinate); 8] = [
    (40.748_44, -73.985_66),
    (40.749_09, -73.985_18),
    (40.749_73, -73.984_71),
    (40.750_37, -73.984_24),
    (40.749_92, -73.983_16),
    (40.749_28, -73.983_63),
    (40.748_64, -73.984_10),
    (40.747_99, -73.984_58),
];

pub fn default_route(seed: u64) -> Result<SimulatedRoute> {
    SimulatedRoute::new(DEFAULT_WAYPOINTS.to_vec(), seed).context("Failed to build default route")
}
