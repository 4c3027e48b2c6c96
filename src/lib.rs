//! OrderPiQR picker terminal.
//!
//! A warehouse worker scans a picklist QR code, then walks the list scanning
//! each product; this crate owns everything between the decoder and the
//! server: payload parsing, scan reconciliation, offline product catalog,
//! manual override, and fire-and-forget pick reporting.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod fingerprint;
pub mod manual;
pub mod picklist;
pub mod report;
pub mod scanner;
pub mod session;
pub mod sort;
pub mod ui;

use crate::config::PickerConfig;
use crate::engine::ScanEngine;
use crate::fingerprint::FingerprintProvider;
use crate::report::HttpReporter;
use crate::scanner::ScanInput;
use crate::ui::{ConsoleUi, PickerUi};

/// Initialize structured logging (console + rolling file under the data dir).
fn init_logging(config: &PickerConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,orderpiqr_picker=debug"));

    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(&log_dir, "picker");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    // Keep the guard alive for the lifetime of the app; dropping it flushes
    // logs. Leaked intentionally since the app runs until process exit.
    std::mem::forget(guard);
}

/// Wire up the picker and drive the scan loop until EOF or `quit`.
pub async fn run() -> anyhow::Result<()> {
    let config = PickerConfig::from_env();
    init_logging(&config);

    info!("Starting OrderPiQR picker v{}", env!("CARGO_PKG_VERSION"));
    info!(server = %config.server_url, data_dir = %config.data_dir.display(), "configuration loaded");

    let db = Arc::new(db::init(&config.data_dir).map_err(|e| anyhow::anyhow!(e))?);

    let auto_confirm = std::env::var("ORDERPIQR_AUTO_CONFIRM")
        .map(|v| config::parse_flag(&v))
        .unwrap_or(true);
    let ui: Arc<dyn PickerUi> = Arc::new(ConsoleUi::new(auto_confirm));

    // Server when reachable, offline cache otherwise; an empty catalog is
    // reported once but does not abort startup.
    let catalog = match catalog::load(&db, &config.server_url).await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(error = %e, "starting without a product catalog");
            ui.notify(&e.to_string(), true);
            catalog::Catalog::default()
        }
    };

    let fingerprint = Arc::new(FingerprintProvider::new(
        Arc::clone(&db),
        config.fingerprint_url.clone(),
    ));
    // Resolve eagerly so the first pick report does not pay the cost
    if let Err(e) = fingerprint.get().await {
        warn!(error = %e, "fingerprint warm-up failed");
    }

    let reporter = Arc::new(HttpReporter::new(
        config.server_url.clone(),
        config.csrf_token.clone(),
        Arc::clone(&fingerprint),
        Arc::clone(&ui),
    ));

    let mut engine = ScanEngine::new(
        catalog,
        config.order_important,
        config.default_sort,
        Arc::clone(&ui),
        reporter,
    );

    ui.notify("Ready. Scan a picklist to begin.", false);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match scanner::parse_line(&line) {
            Some(ScanInput::Scan(payload)) => engine.handle_scan(&payload),
            Some(ScanInput::Tap(code)) => engine.handle_tap(&code),
            Some(ScanInput::AcknowledgeOverlay) => engine.acknowledge_overlay(),
            Some(ScanInput::ToggleOrder) => {
                let strict = engine.toggle_order_importance();
                ui.notify(
                    if strict {
                        "Order importance: enabled"
                    } else {
                        "Order importance: disabled"
                    },
                    false,
                );
            }
            Some(ScanInput::Sort(mode)) => engine.resort(mode),
            Some(ScanInput::Quit) => break,
            None => {}
        }
    }

    info!("picker shutting down");
    Ok(())
}
