use std::{fmt, str::FromStr};

use geoprovider_logic::{
    Coordinate, FakeLocationProvider, LocationProvider, PollingLocationProvider,
    ProviderSettings, SimulatedRoute, update_callback,
};
use geoprovider_network::NetworkPositionSource;
use log::debug;
use tokio::sync::mpsc;

use crate::{TestingRequest, TestingResponse, prelude::*};

const SIMULATED_SEED: u64 = 0;

const SIMULATED_WAYPOINTS: [(Coordinate, Coordinate); 4] = [
    (52.379_19, 4.900_41),
    (52.379_81, 4.901_36),
    (52.380_42, 4.900_29),
    (52.379_77, 4.899_33),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Which provider the daemon hosts
pub enum ProviderKind {
    /// Always unavailable
    #[default]
    Fake,
    /// Polls a simulated route
    Simulated,
    /// Polls the configured fix server
    Network,
}

impl ProviderKind {
    pub const ALL_KINDS: [Self; 3] = [Self::Fake, Self::Simulated, Self::Network];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fake => "fake",
            Self::Simulated => "simulated",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL_KINDS
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow!("Unknown provider kind {s:?}"))
    }
}

/// One hosted provider plus the channel its deliveries are forwarded on
pub struct Session {
    kind: ProviderKind,
    provider: Box<dyn LocationProvider>,
    deliveries: mpsc::UnboundedSender<TestingResponse>,
}

impl Session {
    /// Create a session, polling kinds must be created inside a tokio runtime
    pub fn new(
        kind: ProviderKind,
        deliveries: mpsc::UnboundedSender<TestingResponse>,
    ) -> Result<Self> {
        let settings = ProviderSettings::default();
        let provider: Box<dyn LocationProvider> = match kind {
            ProviderKind::Fake => Box::new(FakeLocationProvider::new()),
            ProviderKind::Simulated => {
                let route = SimulatedRoute::new(SIMULATED_WAYPOINTS.to_vec(), SIMULATED_SEED)?;
                Box::new(PollingLocationProvider::new(route, settings)?)
            }
            ProviderKind::Network => {
                let source = NetworkPositionSource::new()?;
                Box::new(PollingLocationProvider::new(source, settings)?)
            }
        };

        Ok(Self {
            kind,
            provider,
            deliveries,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn process_req(&self, req: TestingRequest) -> TestingResponse {
        debug!("Processing {req:?}");
        match req {
            TestingRequest::SetCallback => {
                let tx = self.deliveries.clone();
                self.provider
                    .set_update_callback(update_callback(move |_, result| {
                        tx.send(TestingResponse::Delivered(result)).ok();
                    }));
            }
            TestingRequest::Start { high_accuracy } => self.provider.start_provider(high_accuracy),
            TestingRequest::Stop => self.provider.stop_provider(),
            TestingRequest::GetPosition => {
                return TestingResponse::Position(self.provider.get_position().as_ref().clone());
            }
            TestingRequest::GetState => {
                return TestingResponse::State {
                    state: self.provider.state(),
                    permission_granted: self.provider.permission_granted(),
                };
            }
            TestingRequest::GrantPermission => self.provider.on_permission_granted(),
        }
        TestingResponse::Complete
    }
}
