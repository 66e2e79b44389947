mod fake;
mod polling;
mod position;
mod provider;
mod settings;
mod simulated;
mod source;
#[cfg(test)]
mod tests;

pub use fake::FakeLocationProvider;
pub use polling::PollingLocationProvider;
pub use position::{
    Coordinate, Geoposition, GeopositionError, GeopositionErrorCode, PositionResult,
    UNAVAILABLE_MESSAGE, UtcDT,
};
pub use provider::{LocationProvider, ProviderState, UpdateCallback, update_callback};
pub use settings::ProviderSettings;
pub use simulated::{SimulatedRoute, bearing_degrees, distance_meters};
pub use source::PositionSource;

pub mod prelude {
    use anyhow::Error as AnyhowError;
    use std::result::Result as StdResult;
    pub type Result<T = (), E = AnyhowError> = StdResult<T, E>;
    pub use anyhow::Context;
}
