//! Device fingerprint provider.
//!
//! Every report carries a stable per-device identifier so the server can
//! attribute picks to a device. Resolution order: in-memory copy, the
//! `local_settings` table, a remote fingerprint service when configured, and
//! finally a locally generated UUID. Whatever gets resolved is persisted.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{self, DbState};

const SETTING_CATEGORY: &str = "device";
const SETTING_KEY: &str = "fingerprint";
const REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves and caches the device fingerprint.
pub struct FingerprintProvider {
    db: Arc<DbState>,
    remote_url: Option<String>,
    cached: Mutex<Option<String>>,
}

impl FingerprintProvider {
    pub fn new(db: Arc<DbState>, remote_url: Option<String>) -> Self {
        FingerprintProvider {
            db,
            remote_url,
            cached: Mutex::new(None),
        }
    }

    /// Resolve the fingerprint, generating and persisting one if needed.
    pub async fn get(&self) -> Result<String, String> {
        if let Some(fp) = self.cached.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Ok(fp);
        }

        if let Some(fp) = self.read_persisted() {
            debug!(fingerprint = %fp, "fingerprint loaded from local settings");
            self.remember(fp.clone());
            return Ok(fp);
        }

        let fp = match self.fetch_remote().await {
            Some(fp) => fp,
            None => {
                let generated = Uuid::new_v4().to_string();
                info!(fingerprint = %generated, "generated local device fingerprint");
                generated
            }
        };

        self.persist(&fp)?;
        self.remember(fp.clone());
        Ok(fp)
    }

    fn remember(&self, fp: String) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = Some(fp);
    }

    fn read_persisted(&self) -> Option<String> {
        let conn = self.db.conn.lock().ok()?;
        db::get_setting(&conn, SETTING_CATEGORY, SETTING_KEY).filter(|s| !s.trim().is_empty())
    }

    fn persist(&self, fp: &str) -> Result<(), String> {
        let conn = self
            .db
            .conn
            .lock()
            .map_err(|e| format!("fingerprint store lock: {e}"))?;
        db::set_setting(&conn, SETTING_CATEGORY, SETTING_KEY, fp)
    }

    /// Ask the remote fingerprint service for an identifier. Any failure
    /// falls through to local generation.
    async fn fetch_remote(&self) -> Option<String> {
        let url = self.remote_url.as_deref()?;

        let client = reqwest::Client::builder()
            .timeout(REMOTE_TIMEOUT)
            .build()
            .ok()?;

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.json::<serde_json::Value>().await.ok()?;
                let fp = body
                    .get("visitorId")
                    .or_else(|| body.get("fingerprint"))
                    .and_then(serde_json::Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())?;
                info!(fingerprint = %fp, "fingerprint fetched from remote service");
                Some(fp.to_string())
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "fingerprint service returned an error");
                None
            }
            Err(e) => {
                warn!(error = %e, "fingerprint service unreachable, generating locally");
                None
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
