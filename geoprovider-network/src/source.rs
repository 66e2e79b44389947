use anyhow::bail;
use log::debug;
use reqwest::{Client, StatusCode};

use geoprovider_logic::{
    Geoposition, GeopositionError, GeopositionErrorCode, PositionSource, prelude::*,
};

use crate::server::{self, SERVER_HTTP_URL};

const TECHNOLOGY: &str = "network";

/// Gets fixes from a fix server over HTTP
pub struct NetworkPositionSource {
    client: Client,
    base_url: String,
}

impl NetworkPositionSource {
    /// Use the fix server configured at build time
    pub fn new() -> Result<Self> {
        Self::with_base_url(SERVER_HTTP_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn body_message(body: &[u8], fallback: &str) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}

/// Interpret a fix server response.
///
/// A denial or an unavailable fix comes back as a [GeopositionError] so the provider reports
/// the matching code.
pub fn decode_fix(status: StatusCode, body: &[u8]) -> Result<Geoposition> {
    match status {
        StatusCode::OK => {
            serde_json::from_slice(body).context("Fix server sent a malformed position")
        }
        StatusCode::FORBIDDEN => Err(GeopositionError::new(
            GeopositionErrorCode::PermissionDenied,
            body_message(body, "Fix server denied access"),
            TECHNOLOGY,
        )
        .into()),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::NOT_FOUND => Err(GeopositionError::new(
            GeopositionErrorCode::PositionUnavailable,
            body_message(body, "Fix server has no position"),
            TECHNOLOGY,
        )
        .into()),
        other => bail!("Fix server returned {other}"),
    }
}

impl PositionSource for NetworkPositionSource {
    fn technology(&self) -> &str {
        TECHNOLOGY
    }

    fn acquire(&self, high_accuracy: bool) -> impl Future<Output = Result<Geoposition>> + Send {
        let url = server::position_url(&self.base_url, high_accuracy);
        let request = self.client.get(url);
        async move {
            let resp = request.send().await.context("Could not reach fix server")?;
            let status = resp.status();
            let body = resp
                .bytes()
                .await
                .context("Failed to read fix server response")?;
            debug!("Fix server answered {status} with {} bytes", body.len());
            decode_fix(status, &body)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn mk_fix() -> Geoposition {
        let timestamp = Utc.with_ymd_and_hms(2025, 3, 14, 15, 9, 26).unwrap();
        Geoposition::new(51.5007, -0.1246, 30.0, timestamp).with_heading(45.0)
    }

    fn code_of(err: &anyhow::Error) -> Option<GeopositionErrorCode> {
        err.downcast_ref::<GeopositionError>().map(|e| e.code)
    }

    #[test]
    fn test_decode_ok() {
        let fix = mk_fix();
        let body = serde_json::to_vec(&fix).unwrap();
        let decoded = decode_fix(StatusCode::OK, &body).expect("Failed to decode");
        assert_eq!(decoded, fix);
    }

    #[test]
    fn test_decode_malformed() {
        let err = decode_fix(StatusCode::OK, b"{\"latitude\": \"north\"}").unwrap_err();
        assert!(code_of(&err).is_none());
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn test_decode_denied() {
        let err = decode_fix(StatusCode::FORBIDDEN, b"Location sharing is off").unwrap_err();
        assert_eq!(code_of(&err), Some(GeopositionErrorCode::PermissionDenied));
        let inner = err.downcast_ref::<GeopositionError>().unwrap();
        assert_eq!(inner.message, "Location sharing is off");
        assert_eq!(inner.technology, "network");
    }

    #[test]
    fn test_decode_unavailable_fallback_message() {
        let err = decode_fix(StatusCode::SERVICE_UNAVAILABLE, b"  ").unwrap_err();
        assert_eq!(code_of(&err), Some(GeopositionErrorCode::PositionUnavailable));
        let inner = err.downcast_ref::<GeopositionError>().unwrap();
        assert_eq!(inner.message, "Fix server has no position");
    }

    #[test]
    fn test_decode_other_status() {
        let err = decode_fix(StatusCode::INTERNAL_SERVER_ERROR, b"").unwrap_err();
        assert!(code_of(&err).is_none());
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_with_base_url() {
        let source = NetworkPositionSource::with_base_url("http://127.0.0.1:9").unwrap();
        assert_eq!(source.base_url(), "http://127.0.0.1:9");
        assert_eq!(source.technology(), "network");
    }
}
