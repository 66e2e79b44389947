mod session;

use geoprovider_logic::{PositionResult, ProviderState};
use interprocess::local_socket::{GenericNamespaced, Name, ToNsName};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use session::{ProviderKind, Session};

pub mod prelude {
    pub use anyhow::{Context, anyhow, bail};
    pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
}

pub use prelude::*;

pub fn get_socket_name(base_name: String) -> Result<Name<'static>> {
    base_name
        .to_ns_name::<GenericNamespaced>()
        .context("Failed to parse socket name")
}

/// Encode a message as a single line of JSON
pub fn encode_line(value: &impl Serialize) -> Result<Vec<u8>> {
    let mut encoded = serde_json::to_vec(value).context("Failed to encode")?;
    encoded.push(b'\n');
    Ok(encoded)
}

/// Throw away deliveries nobody was connected to receive, returning how many were dropped
pub fn discard_pending(deliveries: &mut mpsc::UnboundedReceiver<TestingResponse>) -> usize {
    let mut discarded = 0;
    while deliveries.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestingRequest {
    /// Install a callback that forwards deliveries to the connected driver
    SetCallback,
    Start { high_accuracy: bool },
    Stop,
    GetPosition,
    GetState,
    GrantPermission,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TestingResponse {
    Complete,
    Position(PositionResult),
    State {
        state: ProviderState,
        permission_granted: bool,
    },
    /// Sent whenever the provider invokes the forwarding callback
    Delivered(PositionResult),
    Error(String),
}

impl TestingResponse {
    /// Whether this answers a request, as opposed to an unprompted delivery
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Delivered(_))
    }
}

impl From<anyhow::Error> for TestingResponse {
    fn from(value: anyhow::Error) -> Self {
        TestingResponse::Error(format!("{value:#}"))
    }
}
