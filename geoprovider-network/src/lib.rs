mod server;
mod source;

pub use server::{SERVER_HTTP_URL, health_url, position_url, server_reachable};
pub use source::{NetworkPositionSource, decode_fix};
