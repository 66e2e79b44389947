use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use geoprovider_logic::{Geoposition, SimulatedRoute};
use log::{info, warn};

/// How long a stalled request hangs before giving up
const STALL_DURATION: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// What the server answers position requests with
pub enum FixMode {
    /// Hand out fixes along the simulated route
    #[default]
    Normal,
    /// Report that no fix is available
    Unavailable,
    /// Refuse access to location data
    Denied,
    /// Hang for a long time, to exercise client timeouts
    Stall,
}

impl FixMode {
    pub const ALL_MODES: [Self; 4] = [Self::Normal, Self::Unavailable, Self::Denied, Self::Stall];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Unavailable => "unavailable",
            Self::Denied => "denied",
            Self::Stall => "stall",
        }
    }
}

impl fmt::Display for FixMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnknownModeError;

impl FromStr for FixMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL_MODES
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s))
            .ok_or(UnknownModeError)
    }
}

impl From<UnknownModeError> for StatusCode {
    fn from(_: UnknownModeError) -> Self {
        StatusCode::BAD_REQUEST
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixError {
    /// No fix to hand out
    Unavailable(String),
    /// Location access is switched off
    Denied,
}

impl IntoResponse for FixError {
    fn into_response(self) -> Response {
        match self {
            Self::Unavailable(why) => (StatusCode::SERVICE_UNAVAILABLE, why).into_response(),
            Self::Denied => (StatusCode::FORBIDDEN, "Location access denied").into_response(),
        }
    }
}

#[derive(Clone)]
pub struct ServerState {
    route: Arc<SimulatedRoute>,
    mode: Arc<Mutex<FixMode>>,
}

impl ServerState {
    pub fn new(route: SimulatedRoute) -> Self {
        Self {
            route: Arc::new(route),
            mode: Arc::default(),
        }
    }

    pub fn mode(&self) -> FixMode {
        *self.mode.lock().unwrap()
    }

    pub fn set_mode(&self, mode: FixMode) {
        info!("Switching to {mode} mode");
        *self.mode.lock().unwrap() = mode;
    }

    /// Answer a position request according to the current mode
    pub async fn next_fix(&self, high_accuracy: bool) -> Result<Geoposition, FixError> {
        match self.mode() {
            FixMode::Normal => self.route.next_fix(high_accuracy).map_err(|why| {
                warn!("Route could not produce a fix: {why:?}");
                FixError::Unavailable(why.to_string())
            }),
            FixMode::Unavailable => Err(FixError::Unavailable("No fix available".to_string())),
            FixMode::Denied => Err(FixError::Denied),
            FixMode::Stall => {
                tokio::time::sleep(STALL_DURATION).await;
                Err(FixError::Unavailable("Gave up waiting for a fix".to_string()))
            }
        }
    }
}
