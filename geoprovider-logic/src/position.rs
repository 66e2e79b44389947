use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Convenience alias for UTC DT
pub type UtcDT = DateTime<Utc>;

/// A "part" of a position (degrees, meters or m/s depending on the field)
pub type Coordinate = f64;

/// Message carried by the default "no fix yet" result
pub const UNAVAILABLE_MESSAGE: &str = "Position unavailable.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// Why a provider could not produce a position
pub enum GeopositionErrorCode {
    /// No fix could be obtained
    PositionUnavailable,
    /// The consumer or the system denied access to location data
    PermissionDenied,
    /// Acquisition took longer than the provider was willing to wait
    Timeout,
}

impl GeopositionErrorCode {
    pub const ALL_CODES: [Self; 3] = [
        Self::PositionUnavailable,
        Self::PermissionDenied,
        Self::Timeout,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PositionUnavailable => "POSITION_UNAVAILABLE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for GeopositionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// A failed position acquisition.
///
/// This also implements [std::error::Error] so a [crate::PositionSource] can hand one back
/// through [anyhow] to pick the code the provider reports.
pub struct GeopositionError {
    pub code: GeopositionErrorCode,
    pub message: String,
    /// Name of the positioning technology that failed, empty when unknown
    pub technology: String,
}

impl GeopositionError {
    pub fn new(
        code: GeopositionErrorCode,
        message: impl Into<String>,
        technology: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            technology: technology.into(),
        }
    }
}

impl fmt::Display for GeopositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for GeopositionError {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
/// A position fix as reported by some positioning technology
pub struct Geoposition {
    /// Latitude in degrees, within [-90, 90]
    pub latitude: Coordinate,
    /// Longitude in degrees, within [-180, 180]
    pub longitude: Coordinate,
    /// Horizontal accuracy radius in meters
    pub accuracy: Coordinate,
    /// Meters above the WGS84 ellipsoid
    pub altitude: Option<Coordinate>,
    pub altitude_accuracy: Option<Coordinate>,
    /// Degrees clockwise from true north, optional as GPS can't always determine
    pub heading: Option<Coordinate>,
    /// Ground speed in meters per second
    pub speed: Option<Coordinate>,
    pub timestamp: UtcDT,
}

impl Geoposition {
    pub fn new(
        latitude: Coordinate,
        longitude: Coordinate,
        accuracy: Coordinate,
        timestamp: UtcDT,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            altitude: None,
            altitude_accuracy: None,
            heading: None,
            speed: None,
            timestamp,
        }
    }

    pub fn with_altitude(mut self, altitude: Coordinate, accuracy: Option<Coordinate>) -> Self {
        self.altitude = Some(altitude);
        self.altitude_accuracy = accuracy;
        self
    }

    pub fn with_heading(mut self, heading: Coordinate) -> Self {
        self.heading = Some(heading);
        self
    }

    pub fn with_speed(mut self, speed: Coordinate) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Whether the coordinates are within standard geographic ranges and the accuracy is a
    /// usable, non-negative number
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy.is_finite()
            && self.accuracy >= 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// The outcome of asking a provider where the device is, either a fix or an error.
///
/// Results are never mutated in place by a provider, every update replaces the whole value and
/// deliveries to callbacks are independent clones.
pub enum PositionResult {
    Position(Geoposition),
    Error(GeopositionError),
}

impl PositionResult {
    pub fn new_error(
        code: GeopositionErrorCode,
        message: impl Into<String>,
        technology: impl Into<String>,
    ) -> Self {
        Self::Error(GeopositionError::new(code, message, technology))
    }

    /// Create a successful result.
    ///
    /// The caller must pass coordinates within standard geographic ranges, see
    /// [Geoposition::is_valid]. This is only checked in debug builds.
    pub fn new_position(position: Geoposition) -> Self {
        debug_assert!(
            position.is_valid(),
            "Position out of range: {position:?}"
        );
        Self::Position(position)
    }

    /// The "no fix yet" result every provider starts with
    pub fn unavailable() -> Self {
        Self::new_error(
            GeopositionErrorCode::PositionUnavailable,
            UNAVAILABLE_MESSAGE,
            "",
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn as_position(&self) -> Option<&Geoposition> {
        if let Self::Position(position) = self {
            Some(position)
        } else {
            None
        }
    }

    pub fn as_error(&self) -> Option<&GeopositionError> {
        if let Self::Error(err) = self {
            Some(err)
        } else {
            None
        }
    }
}

impl Default for PositionResult {
    fn default() -> Self {
        Self::unavailable()
    }
}

impl From<GeopositionError> for PositionResult {
    fn from(v: GeopositionError) -> Self {
        Self::Error(v)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn mk_position() -> Geoposition {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Geoposition::new(43.0845, -77.6749, 12.5, timestamp)
            .with_altitude(160.0, Some(4.0))
            .with_heading(270.0)
            .with_speed(1.4)
    }

    #[test]
    fn test_default_is_unavailable() {
        let result = PositionResult::default();
        let err = result.as_error().expect("Default result is not an error");
        assert_eq!(err.code, GeopositionErrorCode::PositionUnavailable);
        assert_eq!(err.message, "Position unavailable.");
        assert_eq!(err.technology, "");
        assert!(result.as_position().is_none());
    }

    #[test]
    fn test_new_error_fields() {
        let result = PositionResult::new_error(GeopositionErrorCode::Timeout, "Too slow", "gps");
        assert!(result.is_error());
        assert_eq!(
            result,
            PositionResult::Error(GeopositionError {
                code: GeopositionErrorCode::Timeout,
                message: "Too slow".to_string(),
                technology: "gps".to_string(),
            })
        );
    }

    #[test]
    fn test_new_position_fields() {
        let position = mk_position();
        let result = PositionResult::new_position(position);
        assert!(!result.is_error());
        assert_eq!(result.as_position(), Some(&position));
        assert!(result.as_error().is_none());
    }

    #[test]
    fn test_clones_are_independent() {
        let original = PositionResult::new_error(
            GeopositionErrorCode::PermissionDenied,
            "Denied by user",
            "network",
        );
        let mut copy = original.clone();
        assert_eq!(copy, original);

        if let PositionResult::Error(err) = &mut copy {
            err.message.push_str(" (again)");
        }

        assert_ne!(copy, original);
        assert_eq!(
            original.as_error().map(|e| e.message.as_str()),
            Some("Denied by user")
        );
    }

    #[test]
    fn test_position_clone_equal() {
        let original = PositionResult::new_position(mk_position());
        let copy = original.clone();
        assert_eq!(copy, original);
    }

    #[test]
    fn test_validity_ranges() {
        let valid = mk_position();
        assert!(valid.is_valid());

        let edges = Geoposition {
            latitude: -90.0,
            longitude: 180.0,
            ..valid
        };
        assert!(edges.is_valid());

        for bad in [
            Geoposition {
                latitude: 90.5,
                ..valid
            },
            Geoposition {
                longitude: -180.1,
                ..valid
            },
            Geoposition {
                accuracy: -1.0,
                ..valid
            },
            Geoposition {
                latitude: f64::NAN,
                ..valid
            },
        ] {
            assert!(!bad.is_valid(), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn test_error_display() {
        let err = GeopositionError::new(GeopositionErrorCode::Timeout, "Gave up", "");
        assert_eq!(err.to_string(), "TIMEOUT: Gave up");
        let names = GeopositionErrorCode::ALL_CODES.map(|c| c.as_str());
        assert_eq!(
            names,
            ["POSITION_UNAVAILABLE", "PERMISSION_DENIED", "TIMEOUT"]
        );
    }

    #[test]
    fn test_error_through_anyhow() {
        let err: anyhow::Error =
            GeopositionError::new(GeopositionErrorCode::PermissionDenied, "No", "mock").into();
        let err = err.context("While acquiring");
        let recovered = err
            .downcast_ref::<GeopositionError>()
            .expect("Could not recover error");
        assert_eq!(recovered.code, GeopositionErrorCode::PermissionDenied);
    }
}
