use reqwest::StatusCode;

use geoprovider_logic::prelude::*;

const fn server_host() -> &'static str {
    if let Some(host) = option_env!("FIX_SERVER_HOST") {
        host
    } else {
        "localhost"
    }
}

const fn server_port() -> u16 {
    if let Some(port) = option_env!("FIX_SERVER_PORT") {
        const_str::parse!(port, u16)
    } else {
        3537
    }
}

const fn server_secure() -> bool {
    if let Some(secure) = option_env!("FIX_SERVER_SECURE") {
        const_str::eq_ignore_ascii_case!(secure, "true") || const_str::equal!(secure, "1")
    } else {
        false
    }
}

const fn server_http_proto() -> &'static str {
    if server_secure() { "https" } else { "http" }
}

const SERVER_HOST: &str = server_host();
const SERVER_PORT: u16 = server_port();
const SERVER_HTTP_PROTO: &str = server_http_proto();

const SERVER_SOCKET: &str = const_str::concat!(SERVER_HOST, ":", SERVER_PORT);

/// Base URL of the fix server this build was configured for
pub const SERVER_HTTP_URL: &str = const_str::concat!(SERVER_HTTP_PROTO, "://", SERVER_SOCKET);

pub fn position_url(base_url: &str, high_accuracy: bool) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/position?high_accuracy={high_accuracy}")
}

pub fn health_url(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/health")
}

/// Check whether the fix server at `base_url` is up
pub async fn server_reachable(base_url: &str) -> Result<bool> {
    reqwest::get(health_url(base_url))
        .await
        .map(|resp| resp.status() == StatusCode::OK)
        .context("Failed to make request")
}
