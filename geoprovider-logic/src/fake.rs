use std::sync::{Arc, Mutex};

use log::debug;

use crate::{
    position::PositionResult,
    provider::{LocationProvider, ProviderState, UpdateCallback, lock},
};

#[derive(Default)]
struct FakeState {
    state: ProviderState,
    permission_granted: bool,
    callback: Option<UpdateCallback>,
}

/// A provider for environments with no location source at all.
///
/// It always reports [PositionResult::unavailable], and only does so when permission is
/// granted, synchronously on the granting thread.
pub struct FakeLocationProvider {
    result: Arc<PositionResult>,
    state: Mutex<FakeState>,
}

impl FakeLocationProvider {
    pub fn new() -> Self {
        Self {
            result: Arc::new(PositionResult::unavailable()),
            state: Mutex::default(),
        }
    }
}

impl Default for FakeLocationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationProvider for FakeLocationProvider {
    fn set_update_callback(&self, callback: UpdateCallback) {
        lock(&self.state).callback = Some(callback);
    }

    fn start_provider(&self, high_accuracy: bool) {
        debug!("Fake provider started (high accuracy: {high_accuracy})");
        lock(&self.state).state = ProviderState::Started;
    }

    fn stop_provider(&self) {
        lock(&self.state).state = ProviderState::Stopped;
    }

    fn get_position(&self) -> Arc<PositionResult> {
        self.result.clone()
    }

    fn on_permission_granted(&self) {
        let mut state = lock(&self.state);
        state.permission_granted = true;
        let callback = state.callback.clone();
        // Don't hold the lock while the consumer runs, it may call back into us
        drop(state);

        if let Some(callback) = callback {
            callback(self, self.result.as_ref().clone());
        }
    }

    fn state(&self) -> ProviderState {
        lock(&self.state).state
    }

    fn permission_granted(&self) -> bool {
        lock(&self.state).permission_granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        position::GeopositionErrorCode, provider::update_callback, tests::RecordingCallback,
    };

    #[test]
    fn test_grant_delivers_unavailable() {
        let provider = FakeLocationProvider::new();
        let recorder = RecordingCallback::default();
        provider.set_update_callback(recorder.callback());

        provider.on_permission_granted();

        let delivered = recorder.take();
        assert_eq!(delivered.len(), 1);
        let err = delivered[0].as_error().expect("Delivered result is not an error");
        assert_eq!(err.code, GeopositionErrorCode::PositionUnavailable);
        assert_eq!(err.message, "Position unavailable.");
        assert_eq!(err.technology, "");
    }

    #[test]
    fn test_grant_without_callback_then_with() {
        let provider = FakeLocationProvider::new();
        let recorder = RecordingCallback::default();

        provider.on_permission_granted();
        assert!(provider.permission_granted());

        provider.set_update_callback(recorder.callback());
        assert_eq!(recorder.len(), 0, "Setting the callback must not fire it");

        provider.on_permission_granted();
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_start_stop_only_flip_state() {
        let provider = FakeLocationProvider::new();
        let recorder = RecordingCallback::default();
        provider.set_update_callback(recorder.callback());

        provider.start_provider(true);
        assert_eq!(provider.state(), ProviderState::Started);
        provider.stop_provider();
        assert_eq!(provider.state(), ProviderState::Stopped);

        assert_eq!(recorder.len(), 0, "Start/stop must never deliver");
        assert_eq!(*provider.get_position(), PositionResult::unavailable());
    }

    #[test]
    fn test_last_callback_wins() {
        let provider = FakeLocationProvider::new();
        let first = RecordingCallback::default();
        let second = RecordingCallback::default();

        provider.set_update_callback(first.callback());
        provider.set_update_callback(second.callback());
        provider.on_permission_granted();

        assert_eq!(first.len(), 0);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn test_callback_can_reenter_provider() {
        let provider = FakeLocationProvider::new();
        let recorder = RecordingCallback::default();
        let inner = recorder.clone();

        provider.set_update_callback(update_callback(move |provider, result| {
            assert_eq!(*provider.get_position(), result);
            provider.stop_provider();
            provider.set_update_callback(inner.callback());
        }));

        provider.on_permission_granted();
        assert_eq!(recorder.len(), 0);

        provider.on_permission_granted();
        assert_eq!(recorder.len(), 1);
    }
}
