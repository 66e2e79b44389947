use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Timing knobs for a [crate::PollingLocationProvider]
pub struct ProviderSettings {
    /// Milliseconds between acquisitions in normal mode
    pub poll_interval_ms: u64,
    /// Milliseconds between acquisitions when started with high accuracy
    pub high_accuracy_poll_interval_ms: u64,
    /// How long a single acquisition may take before it is reported as a timeout
    pub acquisition_timeout_ms: u64,
}

impl ProviderSettings {
    pub fn poll_interval(&self, high_accuracy: bool) -> Duration {
        let ms = if high_accuracy {
            self.high_accuracy_poll_interval_ms
        } else {
            self.poll_interval_ms
        };
        // A zero period would make tokio's interval panic
        Duration::from_millis(ms.max(1))
    }

    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition_timeout_ms)
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            high_accuracy_poll_interval_ms: 1000,
            acquisition_timeout_ms: 10000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_selection() {
        let settings = ProviderSettings::default();
        assert_eq!(settings.poll_interval(false), Duration::from_secs(5));
        assert_eq!(settings.poll_interval(true), Duration::from_secs(1));
        assert_eq!(settings.acquisition_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_interval_clamped() {
        let settings = ProviderSettings {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(settings.poll_interval(false), Duration::from_millis(1));
    }
}
