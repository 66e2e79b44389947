use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::position::PositionResult;

/// Consumer logic run on every delivery, receives the provider that produced the result and an
/// owned copy of it.
pub type UpdateCallback = Arc<dyn Fn(&dyn LocationProvider, PositionResult) + Send + Sync>;

/// Wrap a closure as an [UpdateCallback]
pub fn update_callback<F>(f: F) -> UpdateCallback
where
    F: Fn(&dyn LocationProvider, PositionResult) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
/// Lifecycle of a provider, permission is tracked separately
pub enum ProviderState {
    #[default]
    Stopped,
    Started,
}

/// Something that can report where the device is.
///
/// Every implementation starts out holding [PositionResult::unavailable], keeps at most one
/// callback (the last one set wins) and only delivers to it once permission has been granted.
/// Failures are always reported as [PositionResult::Error], never as panics or `Err`s.
pub trait LocationProvider: Send + Sync {
    /// Replace the callback, this never fires it.
    fn set_update_callback(&self, callback: UpdateCallback);
    /// Begin acquiring positions. Calling this while already started does nothing.
    fn start_provider(&self, high_accuracy: bool);
    /// Halt acquisition. Once this returns no result from work started before the call will be
    /// delivered. The last result stays available through [LocationProvider::get_position].
    fn stop_provider(&self);
    /// The most recent result, never blocks.
    fn get_position(&self) -> Arc<PositionResult>;
    /// Record that permission was granted and, if a callback is set, deliver the current result
    /// to it right away. Every call re-delivers.
    fn on_permission_granted(&self);
    fn state(&self) -> ProviderState;
    fn permission_granted(&self) -> bool;
}

/// Lock a mutex, recovering the data if a callback panicked while it was held.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
