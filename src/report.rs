//! Pick reporting client.
//!
//! Reports accepted picklists, individual picks, and completion to the
//! OrderPiQR server. Every call is fire-and-forget: the reconciliation
//! engine never awaits a report, local state is optimistic and authoritative,
//! and a failed report only produces a log line and a notification. In-flight
//! reports are abandoned on process exit; there is no retry queue.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fingerprint::FingerprintProvider;
use crate::ui::PickerUi;

/// Reporting failures. Never rolls back a local list mutation.
#[derive(Debug, Error)]
pub enum SyncFailure {
    #[error("{0}")]
    NetworkError(String),
    #[error("device fingerprint unavailable: {0}")]
    FingerprintUnavailable(String),
}

/// The seam between the reconciliation engine and the network. The engine
/// invokes these without awaiting; tests substitute a recording fake.
pub trait ReportSink: Send + Sync {
    /// One accepted picklist scan.
    fn picklist_scanned(&self, order_id: &str, codes: &[String]);

    /// One accepted pick. `elapsed_ms` is the time since the previous
    /// accepted pick, `None` for the first pick of a session.
    fn pick(&self, order_id: &str, code: &str, elapsed_ms: Option<u64>);

    /// The picklist emptied. Sent exactly once per session by the engine.
    fn completed(&self, order_id: &str);
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach server at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid server URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        403 => "Request rejected (CSRF token missing or invalid)".to_string(),
        404 => "Server does not recognize this device or order".to_string(),
        409 => "Order is already being picked or completed".to_string(),
        s if s >= 500 => format!("Server error (HTTP {s})"),
        s => format!("Unexpected response from server (HTTP {s})"),
    }
}

// ---------------------------------------------------------------------------
// HTTP reporter
// ---------------------------------------------------------------------------

/// Reports to the OrderPiQR endpoints over JSON POSTs with the CSRF header.
pub struct HttpReporter {
    client: reqwest::Client,
    base_url: String,
    csrf_token: String,
    fingerprint: Arc<FingerprintProvider>,
    ui: Arc<dyn PickerUi>,
}

impl HttpReporter {
    pub fn new(
        base_url: String,
        csrf_token: String,
        fingerprint: Arc<FingerprintProvider>,
        ui: Arc<dyn PickerUi>,
    ) -> Self {
        HttpReporter {
            client: reqwest::Client::new(),
            base_url,
            csrf_token,
            fingerprint,
            ui,
        }
    }

    /// POST `body` to `{base}{path}`. Returns the friendly failure message.
    async fn post(
        client: &reqwest::Client,
        base_url: &str,
        csrf_token: &str,
        path: &str,
        body: Value,
    ) -> Result<(), SyncFailure> {
        let url = format!("{base_url}{path}");

        let resp = client
            .post(&url)
            .header("X-CSRFToken", csrf_token)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SyncFailure::NetworkError(friendly_error(base_url, &e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SyncFailure::NetworkError(status_error(status)));
        }

        debug!(path, status = status.as_u16(), "report delivered");
        Ok(())
    }

    /// Resolve the fingerprint, then fire the POST in a detached task.
    /// `success_note` is shown on delivery, when present.
    fn spawn_report(&self, path: &'static str, body_without_fp: Value, success_note: Option<String>) {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let csrf_token = self.csrf_token.clone();
        let fingerprint = Arc::clone(&self.fingerprint);
        let ui = Arc::clone(&self.ui);

        tokio::spawn(async move {
            let fp = match fingerprint.get().await {
                Ok(fp) => fp,
                Err(e) => {
                    let failure = SyncFailure::FingerprintUnavailable(e);
                    warn!(path, error = %failure, "report aborted");
                    ui.notify(&failure.to_string(), true);
                    return;
                }
            };

            let mut body = body_without_fp;
            if let Value::Object(ref mut map) = body {
                map.insert("deviceFingerprint".to_string(), Value::String(fp));
            }

            match Self::post(&client, &base_url, &csrf_token, path, body).await {
                Ok(()) => {
                    if let Some(note) = success_note {
                        ui.notify(&note, false);
                    }
                }
                Err(e) => {
                    warn!(path, error = %e, "report failed");
                    ui.notify(&e.to_string(), true);
                }
            }
        });
    }
}

impl ReportSink for HttpReporter {
    fn picklist_scanned(&self, order_id: &str, codes: &[String]) {
        self.spawn_report(
            "/orderpiqr/scan-picklist",
            json!({
                "orderID": order_id,
                "picklist": codes,
            }),
            None,
        );
    }

    fn pick(&self, order_id: &str, code: &str, elapsed_ms: Option<u64>) {
        self.spawn_report(
            "/orderpiqr/product-pick",
            json!({
                "orderID": order_id,
                "productCode": code,
                "successful": true,
                "timeTakenMs": elapsed_ms,
                "scannedAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            }),
            None,
        );
    }

    fn completed(&self, order_id: &str) {
        self.spawn_report(
            "/orderpiqr/complete-picklist",
            json!({
                "orderID": order_id,
            }),
            Some("Picklist completion confirmed by server".to_string()),
        );
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_messages() {
        assert!(status_error(StatusCode::FORBIDDEN).contains("CSRF"));
        assert!(status_error(StatusCode::NOT_FOUND).contains("does not recognize"));
        assert!(status_error(StatusCode::CONFLICT).contains("already"));
        assert!(status_error(StatusCode::INTERNAL_SERVER_ERROR).contains("HTTP 500"));
        assert!(status_error(StatusCode::IM_A_TEAPOT).contains("HTTP 418"));
    }

    #[tokio::test]
    async fn test_post_reports_unreachable_server() {
        let client = reqwest::Client::new();
        let err = HttpReporter::post(
            &client,
            "http://127.0.0.1:1",
            "token",
            "/orderpiqr/product-pick",
            json!({}),
        )
        .await
        .unwrap_err();

        match err {
            SyncFailure::NetworkError(msg) => {
                assert!(msg.contains("127.0.0.1:1"), "unexpected message: {msg}")
            }
            other => panic!("expected NetworkError, got {other:?}"),
        }
    }

    #[test]
    fn test_pick_body_shape() {
        // The wire shape the server's product_pick view expects
        let body = json!({
            "orderID": "ORD-1",
            "productCode": "SKU1",
            "successful": true,
            "timeTakenMs": 1500,
            "scannedAt": "2026-01-01T00:00:00.000Z",
        });
        assert_eq!(body["successful"], true);
        assert_eq!(body["timeTakenMs"], 1500);

        // First pick of a session has no elapsed time
        let first = json!({ "timeTakenMs": Option::<u64>::None });
        assert!(first["timeTakenMs"].is_null());
    }
}
