use crate::{position::Geoposition, prelude::*};

/// Where a [crate::PollingLocationProvider] gets its raw fixes from, e.g. a device or a
/// network service.
///
/// Failures are plain [anyhow::Error]s. Returning a [crate::GeopositionError] (possibly
/// wrapped in context) picks the code the provider reports, anything else is reported as
/// position unavailable.
pub trait PositionSource: Send + Sync + 'static {
    /// Short name of the positioning technology, attached to errors
    fn technology(&self) -> &str {
        ""
    }

    /// Acquire a single fix
    fn acquire(&self, high_accuracy: bool) -> impl Future<Output = Result<Geoposition>> + Send;
}
