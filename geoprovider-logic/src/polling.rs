use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, Weak},
    thread::{self, ThreadId},
};

use log::{debug, error, warn};
use tokio::{runtime::Handle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    position::{GeopositionError, GeopositionErrorCode, PositionResult},
    prelude::*,
    provider::{LocationProvider, ProviderState, UpdateCallback, lock},
    settings::ProviderSettings,
    source::PositionSource,
};

/// A provider that repeatedly asks a [PositionSource] for a fix while started.
///
/// Polling happens on a task spawned onto the tokio runtime the provider was created in, so
/// callbacks run on that runtime's threads. Callbacks receive a handle to the provider's shared
/// state which answers every [LocationProvider] method the same way this type does.
///
/// Dropping the provider stops it, after which nothing is delivered.
pub struct PollingLocationProvider<S: PositionSource> {
    core: Arc<PollingCore<S>>,
}

impl<S: PositionSource> PollingLocationProvider<S> {
    /// Create a stopped provider, this must be called from within a tokio runtime.
    pub fn new(source: S, settings: ProviderSettings) -> Result<Self> {
        let runtime =
            Handle::try_current().context("Polling providers must be created inside a runtime")?;

        let core = Arc::new_cyclic(|this| PollingCore {
            this: this.clone(),
            source,
            settings,
            runtime,
            delivery: Mutex::new(()),
            inner: Mutex::new(Inner::default()),
        });

        Ok(Self { core })
    }

    pub fn source(&self) -> &S {
        &self.core.source
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.core.settings
    }
}

impl<S: PositionSource> LocationProvider for PollingLocationProvider<S> {
    fn set_update_callback(&self, callback: UpdateCallback) {
        self.core.set_update_callback(callback);
    }

    fn start_provider(&self, high_accuracy: bool) {
        self.core.start_provider(high_accuracy);
    }

    fn stop_provider(&self) {
        self.core.stop_provider();
    }

    fn get_position(&self) -> Arc<PositionResult> {
        self.core.get_position()
    }

    fn on_permission_granted(&self) {
        self.core.on_permission_granted();
    }

    fn state(&self) -> ProviderState {
        self.core.state()
    }

    fn permission_granted(&self) -> bool {
        self.core.permission_granted()
    }
}

impl<S: PositionSource> Drop for PollingLocationProvider<S> {
    fn drop(&mut self) {
        self.core.stop_provider();
        lock(&self.core.inner).callback = None;
    }
}

#[derive(Default)]
struct Inner {
    state: ProviderState,
    permission_granted: bool,
    callback: Option<UpdateCallback>,
    result: Arc<PositionResult>,
    /// Bumped on every start and stop, a polling run may only publish while its generation is
    /// current
    generation: u64,
    run: Option<CancellationToken>,
    /// Thread currently running our callback while holding the delivery lock
    delivering_on: Option<ThreadId>,
}

type Delivery = (UpdateCallback, Arc<PositionResult>);

struct PollingCore<S: PositionSource> {
    this: Weak<Self>,
    source: S,
    settings: ProviderSettings,
    runtime: Handle,
    /// Held for the whole time a callback runs, [LocationProvider::stop_provider] waits on it so
    /// no stale delivery can outlive a stop
    delivery: Mutex<()>,
    inner: Mutex<Inner>,
}

/// Clears [Inner::delivering_on] once a callback returns or unwinds
struct DeliveryScope<'a>(&'a Mutex<Inner>);

impl Drop for DeliveryScope<'_> {
    fn drop(&mut self) {
        lock(self.0).delivering_on = None;
    }
}

impl<S: PositionSource> PollingCore<S> {
    fn is_delivering_here(&self) -> bool {
        lock(&self.inner).delivering_on == Some(thread::current().id())
    }

    /// Run `prepare` with the delivery lock held and invoke whatever callback it hands back.
    ///
    /// Re-entrant calls from inside one of our own callbacks skip the lock, they already own it.
    fn deliver(&self, prepare: impl FnOnce(&mut Inner) -> Option<Delivery>) {
        let reentrant = self.is_delivering_here();
        let _guard = (!reentrant).then(|| lock(&self.delivery));

        let delivery = {
            let mut inner = lock(&self.inner);
            let delivery = prepare(&mut *inner);
            if delivery.is_some() && !reentrant {
                inner.delivering_on = Some(thread::current().id());
            }
            delivery
        };

        if let Some((callback, result)) = delivery {
            let _scope = (!reentrant).then(|| DeliveryScope(&self.inner));
            // A panicking callback must not end the polling run
            if catch_unwind(AssertUnwindSafe(|| callback(self, result.as_ref().clone()))).is_err()
            {
                error!("Update callback panicked while handling a delivery");
            }
        }
    }

    /// Store the outcome of an acquisition made by run `generation`
    fn publish(&self, generation: u64, result: PositionResult) {
        self.deliver(|inner| {
            if inner.generation != generation {
                debug!("Dropping result from stale polling run {generation}");
                return None;
            }

            inner.result = Arc::new(result);

            if inner.permission_granted {
                inner
                    .callback
                    .clone()
                    .map(|callback| (callback, inner.result.clone()))
            } else {
                None
            }
        });
    }

    async fn acquire(&self, high_accuracy: bool) -> PositionResult {
        let technology = self.source.technology();
        let timeout = self.settings.acquisition_timeout();

        match tokio::time::timeout(timeout, self.source.acquire(high_accuracy)).await {
            Ok(Ok(position)) if position.is_valid() => PositionResult::new_position(position),
            Ok(Ok(position)) => {
                warn!("Source returned an out of range fix: {position:?}");
                PositionResult::new_error(
                    GeopositionErrorCode::PositionUnavailable,
                    "Source reported coordinates out of range",
                    technology,
                )
            }
            Ok(Err(why)) => {
                warn!("Failed to acquire position: {why:?}");
                map_source_error(&why, technology)
            }
            Err(_) => {
                warn!("Position acquisition timed out after {timeout:?}");
                PositionResult::new_error(
                    GeopositionErrorCode::Timeout,
                    format!("Timed out after {}ms", timeout.as_millis()),
                    technology,
                )
            }
        }
    }

    async fn poll_loop(
        self: Arc<Self>,
        generation: u64,
        cancel: CancellationToken,
        high_accuracy: bool,
    ) {
        let mut interval = tokio::time::interval(self.settings.poll_interval(high_accuracy));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                _ = interval.tick() => {}
            }

            let result = tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                result = self.acquire(high_accuracy) => result,
            };

            self.publish(generation, result);
        }

        debug!("Polling run {generation} finished");
    }
}

/// Turn a source failure into a result, keeping the code if the source chose one
fn map_source_error(why: &anyhow::Error, technology: &str) -> PositionResult {
    if let Some(err) = why.downcast_ref::<GeopositionError>() {
        let mut err = err.clone();
        if err.technology.is_empty() {
            err.technology = technology.to_string();
        }
        PositionResult::Error(err)
    } else {
        PositionResult::new_error(
            GeopositionErrorCode::PositionUnavailable,
            format!("{why:#}"),
            technology,
        )
    }
}

impl<S: PositionSource> LocationProvider for PollingCore<S> {
    fn set_update_callback(&self, callback: UpdateCallback) {
        lock(&self.inner).callback = Some(callback);
    }

    fn start_provider(&self, high_accuracy: bool) {
        let Some(this) = self.this.upgrade() else {
            return;
        };

        let mut inner = lock(&self.inner);
        if inner.state == ProviderState::Started {
            return;
        }

        inner.state = ProviderState::Started;
        inner.generation += 1;
        let generation = inner.generation;
        let cancel = CancellationToken::new();
        inner.run = Some(cancel.clone());
        drop(inner);

        debug!("Starting polling run {generation} (high accuracy: {high_accuracy})");
        self.runtime
            .spawn(this.poll_loop(generation, cancel, high_accuracy));
    }

    fn stop_provider(&self) {
        let mut inner = lock(&self.inner);
        if inner.state == ProviderState::Stopped {
            return;
        }

        inner.state = ProviderState::Stopped;
        inner.generation += 1;
        if let Some(cancel) = inner.run.take() {
            cancel.cancel();
        }
        let reentrant = inner.delivering_on == Some(thread::current().id());
        drop(inner);

        // Wait out any delivery the old run already committed to
        if !reentrant {
            drop(lock(&self.delivery));
        }

        debug!("Stopped polling");
    }

    fn get_position(&self) -> Arc<PositionResult> {
        lock(&self.inner).result.clone()
    }

    fn on_permission_granted(&self) {
        self.deliver(|inner| {
            inner.permission_granted = true;
            inner
                .callback
                .clone()
                .map(|callback| (callback, inner.result.clone()))
        });
    }

    fn state(&self) -> ProviderState {
        lock(&self.inner).state
    }

    fn permission_granted(&self) -> bool {
        lock(&self.inner).permission_granted
    }
}
