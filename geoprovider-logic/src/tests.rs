use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::anyhow;
use chrono::{TimeZone, Utc};

use crate::{
    FakeLocationProvider, Geoposition, GeopositionError, GeopositionErrorCode, LocationProvider,
    PollingLocationProvider, PositionResult, PositionSource, ProviderSettings, ProviderState,
    UpdateCallback, prelude::*, update_callback,
};

/// A fix at a fixed point in time, so results compare equal across polls
pub fn mk_fix(lat: f64, long: f64) -> Geoposition {
    let timestamp = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Geoposition::new(lat, long, 10.0, timestamp)
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Fix(Geoposition),
    Fail(String),
    /// Fail with [GeopositionErrorCode::PermissionDenied]
    Deny,
    /// Never answer (well, not for an hour)
    Stall,
}

/// A source that plays back queued responses, repeating the last one forever
pub struct MockSource {
    responses: Mutex<VecDeque<MockResponse>>,
    pub calls: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> MockResponse {
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses.pop_front().unwrap()
        } else {
            responses
                .front()
                .cloned()
                .unwrap_or(MockResponse::Fix(mk_fix(0.0, 0.0)))
        }
    }
}

impl PositionSource for MockSource {
    fn technology(&self) -> &str {
        "mock"
    }

    fn acquire(&self, _high_accuracy: bool) -> impl Future<Output = Result<Geoposition>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();
        async move {
            match response {
                MockResponse::Fix(position) => Ok(position),
                MockResponse::Fail(why) => Err(anyhow!(why)),
                MockResponse::Deny => Err(GeopositionError::new(
                    GeopositionErrorCode::PermissionDenied,
                    "User said no",
                    "",
                )
                .into()),
                MockResponse::Stall => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(anyhow!("Stalled"))
                }
            }
        }
    }
}

/// Collects everything delivered to its callbacks
#[derive(Clone, Default)]
pub struct RecordingCallback(Arc<Mutex<Vec<PositionResult>>>);

impl RecordingCallback {
    pub fn callback(&self) -> UpdateCallback {
        let recorded = self.0.clone();
        update_callback(move |_, result| {
            recorded.lock().unwrap().push(result);
        })
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn take(&self) -> Vec<PositionResult> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Behaviour every provider must share, run against each variant below
mod contract {
    use super::*;
    use tokio::test;

    async fn with_each_provider(f: impl Fn(&dyn LocationProvider)) {
        tokio::time::pause();
        let fake = FakeLocationProvider::new();
        f(&fake);

        let polling = PollingLocationProvider::new(
            MockSource::new(vec![]),
            ProviderSettings::default(),
        )
        .expect("Failed to create provider");
        f(&polling);
    }

    #[test]
    async fn test_fresh_provider_reports_unavailable() {
        with_each_provider(|provider| {
            assert_eq!(*provider.get_position(), PositionResult::unavailable());
            assert_eq!(provider.state(), ProviderState::Stopped);
            assert!(!provider.permission_granted());
        })
        .await;
    }

    #[test]
    async fn test_double_start_matches_single() {
        with_each_provider(|provider| {
            provider.start_provider(false);
            let once = (provider.state(), provider.get_position());
            provider.start_provider(false);
            assert_eq!((provider.state(), provider.get_position()), once);
            provider.stop_provider();
        })
        .await;
    }

    #[test]
    async fn test_stop_without_start_has_no_effect() {
        with_each_provider(|provider| {
            let before = provider.get_position();
            provider.stop_provider();
            provider.stop_provider();
            assert_eq!(provider.state(), ProviderState::Stopped);
            assert_eq!(provider.get_position(), before);
        })
        .await;
    }

    #[test]
    async fn test_grant_without_callback() {
        with_each_provider(|provider| {
            provider.on_permission_granted();
            assert!(provider.permission_granted());
        })
        .await;
    }

    #[test]
    async fn test_two_grants_two_deliveries() {
        with_each_provider(|provider| {
            let recorder = RecordingCallback::default();
            provider.set_update_callback(recorder.callback());

            provider.on_permission_granted();
            provider.on_permission_granted();

            let current = provider.get_position();
            let delivered = recorder.take();
            assert_eq!(delivered.len(), 2);
            assert!(delivered.iter().all(|r| *r == *current));
            assert!(provider.permission_granted());
        })
        .await;
    }

    #[test]
    async fn test_callback_sees_providing_provider() {
        with_each_provider(|provider| {
            let seen = Arc::new(Mutex::new(None));
            let seen2 = seen.clone();
            provider.set_update_callback(update_callback(move |provider, result| {
                *seen2.lock().unwrap() = Some((provider.permission_granted(), result));
            }));

            provider.on_permission_granted();

            let seen = seen.lock().unwrap().take();
            assert_eq!(seen, Some((true, PositionResult::unavailable())));
        })
        .await;
    }
}
