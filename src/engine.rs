//! Scan reconciliation engine.
//!
//! Owns the `ScanSession` and decides, for every scan event, whether to
//! accept or reject it, how the remaining list mutates, and which
//! notifications, reports, and overlays fire. All mutation happens
//! synchronously inside `handle_scan` / `handle_tap`; network reporting is
//! fire-and-forget through the `ReportSink` seam and never awaited here.
//!
//! Guards:
//! - a fixed settle window after every handled scan drops rapid-fire
//!   duplicate decoder events (the second event is dropped, not queued)
//! - the duplicate-quantity overlay blocks scanning until acknowledged,
//!   regardless of the settle window

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::manual::OverrideTracker;
use crate::picklist::{self, ParseError};
use crate::report::ReportSink;
use crate::session::ScanSession;
use crate::sort::{self, SortMode};
use crate::ui::PickerUi;

/// Minimum spacing between two reconciled scans.
pub const SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Why a product-code scan was rejected. Terminal to that scan only; the
/// session is never touched by a rejection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanRejected {
    #[error("Incorrect scan, please try again.")]
    NotFirstInOrder,
    #[error("Product code not found in the list.")]
    NotInRemainingList,
}

/// The reconciliation state machine.
pub struct ScanEngine {
    catalog: Catalog,
    ui: Arc<dyn PickerUi>,
    reporter: Arc<dyn ReportSink>,
    session: Option<ScanSession>,
    order_important: bool,
    default_sort: SortMode,
    busy_until: Option<Instant>,
    overlay_open: bool,
    parsing_picklist: bool,
    overrides: OverrideTracker,
}

impl ScanEngine {
    pub fn new(
        catalog: Catalog,
        order_important: bool,
        default_sort: SortMode,
        ui: Arc<dyn PickerUi>,
        reporter: Arc<dyn ReportSink>,
    ) -> Self {
        ScanEngine {
            catalog,
            ui,
            reporter,
            session: None,
            order_important,
            default_sort,
            busy_until: None,
            overlay_open: false,
            parsing_picklist: false,
            overrides: OverrideTracker::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Scan entry point
    // -----------------------------------------------------------------------

    /// Handle one decoder event.
    pub fn handle_scan(&mut self, raw: &str) {
        self.handle_scan_at(raw, Instant::now());
    }

    /// Deterministic variant used by tests.
    pub fn handle_scan_at(&mut self, raw: &str, now: Instant) {
        if self.overlay_open {
            debug!("scan dropped: duplicate overlay awaiting acknowledgement");
            return;
        }
        if let Some(until) = self.busy_until {
            if now < until {
                debug!("scan dropped: inside settle window");
                return;
            }
        }
        // Open the settle window up front; it is released by time alone,
        // whatever the outcome below.
        self.busy_until = Some(now + SETTLE_DELAY);

        if picklist::is_picklist_payload(raw) {
            self.handle_picklist(raw);
        } else {
            self.handle_product(raw.trim(), now);
        }
    }

    /// Dismiss the duplicate-quantity overlay. Releases the scan guard
    /// immediately; no additional settle delay is applied.
    pub fn acknowledge_overlay(&mut self) {
        if !self.overlay_open {
            return;
        }
        self.overlay_open = false;
        self.busy_until = None;
        self.ui.hide_duplicate_overlay();
    }

    // -----------------------------------------------------------------------
    // Picklist branch
    // -----------------------------------------------------------------------

    fn handle_picklist(&mut self, raw: &str) {
        if self.parsing_picklist {
            warn!("picklist scan dropped: another picklist is being processed");
            self.ui
                .notify("Still processing the previous picklist scan", true);
            return;
        }

        if !self.ui.confirm("New list found, start this list?") {
            debug!("picklist replacement declined, keeping current session");
            return;
        }

        self.parsing_picklist = true;
        let outcome = self.start_session(raw);
        self.parsing_picklist = false;

        if let Err(e) = outcome {
            error!(error = %e, "picklist rejected");
            let message = match e {
                ParseError::AmbiguousFieldOrder => {
                    "Cannot read picklist: product codes look like quantities"
                }
                ParseError::UnknownProductCode => {
                    "Cannot read picklist: no matching product codes"
                }
                ParseError::EmptyPicklist => "Picklist is empty, nothing to pick",
                ParseError::InvalidRowFormat { .. } => "Cannot read picklist rows",
            };
            self.ui.notify(message, true);
        }
    }

    /// Parse the payload and, on success, atomically replace the session.
    /// On failure the previous session state is untouched.
    fn start_session(&mut self, raw: &str) -> Result<(), ParseError> {
        let parsed = picklist::parse(raw, &self.catalog)?;
        if parsed.expanded_codes.is_empty() {
            return Err(ParseError::EmptyPicklist);
        }

        if !parsed.skipped.is_empty() {
            self.ui.notify(
                &format!("{} picklist row(s) could not be read", parsed.skipped.len()),
                true,
            );
        }

        let mut session = ScanSession::from_parsed(parsed);
        session.remaining = sort::sort_codes(
            &session.remaining,
            &self.catalog,
            self.default_sort,
            &session.original_order,
        );

        info!(
            order_id = %session.order_id,
            items = session.remaining.len(),
            "picklist accepted"
        );

        self.reporter
            .picklist_scanned(&session.order_id, &session.original_order);
        self.ui.render(&session.remaining, &self.catalog);
        self.ui.notify(
            &format!(
                "Picklist {} added ({} items)",
                session.order_id,
                session.remaining.len()
            ),
            false,
        );

        self.overlay_open = false;
        self.session = Some(session);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Product-code branch
    // -----------------------------------------------------------------------

    fn handle_product(&mut self, code: &str, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            self.ui.notify("Scan a picklist to begin", true);
            return;
        };

        let accepted = if self.order_important {
            // Strict mode: only the first outstanding item matches
            if session.remaining.first().map(String::as_str) == Some(code) {
                session.remaining.remove(0);
                Ok(())
            } else {
                Err(ScanRejected::NotFirstInOrder)
            }
        } else if session.remove_first(code) {
            Ok(())
        } else {
            Err(ScanRejected::NotInRemainingList)
        };

        match accepted {
            Ok(()) => self.after_accepted_pick(code, now, false),
            Err(rejection) => {
                debug!(code, rejection = %rejection, "scan rejected");
                self.ui.notify(&rejection.to_string(), true);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Manual override
    // -----------------------------------------------------------------------

    /// Handle one tap on a displayed product row.
    pub fn handle_tap(&mut self, code: &str) {
        self.handle_tap_at(code, Instant::now());
    }

    /// Deterministic variant used by tests.
    pub fn handle_tap_at(&mut self, code: &str, now: Instant) {
        if self.overlay_open {
            // While the overlay is up, any tap is its dismissal
            self.acknowledge_overlay();
            return;
        }
        if !self.overrides.register(code, now) {
            return;
        }

        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.remove_first(code) {
            debug!(code, "manual override ignored: code not in remaining list");
            return;
        }

        info!(code, "manual override pick");
        self.after_accepted_pick(code, now, true);
    }

    // -----------------------------------------------------------------------
    // Shared accepted-pick path
    // -----------------------------------------------------------------------

    /// Downstream effects of a pick, after the occurrence has been removed:
    /// render, elapsed-time report, notification, duplicate overlay, and the
    /// once-only completion report.
    fn after_accepted_pick(&mut self, code: &str, now: Instant, manual: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        self.ui.render(&session.remaining, &self.catalog);

        let elapsed_ms = session
            .last_pick_at
            .map(|t| now.saturating_duration_since(t).as_millis() as u64);
        session.last_pick_at = Some(now);

        self.reporter.pick(&session.order_id, code, elapsed_ms);

        let description = self.catalog.describe(code).to_string();
        if manual {
            self.ui
                .notify(&format!("Manual override: {description} confirmed"), false);
        } else {
            self.ui.notify(&format!("Scanned {description}"), false);
        }

        let still_remaining = session.remaining_count(code);
        if still_remaining > 0 {
            let total = session.original_total(code);
            self.overlay_open = true;
            self.ui
                .show_duplicate_overlay(&description, still_remaining, total);
        } else if session.is_complete() && !session.completion_sent {
            session.completion_sent = true;
            info!(order_id = %session.order_id, "picklist complete");
            self.reporter.completed(&session.order_id);
        }
    }

    // -----------------------------------------------------------------------
    // Preferences
    // -----------------------------------------------------------------------

    /// Flip strict/unordered matching. Returns the new value.
    pub fn toggle_order_importance(&mut self) -> bool {
        self.order_important = !self.order_important;
        info!(order_important = self.order_important, "order importance toggled");
        self.order_important
    }

    /// Re-sort the remaining list. Changes order only, never membership.
    pub fn resort(&mut self, mode: SortMode) {
        self.default_sort = mode;
        if let Some(session) = self.session.as_mut() {
            session.remaining = sort::sort_codes(
                &session.remaining,
                &self.catalog,
                mode,
                &session.original_order,
            );
            self.ui.render(&session.remaining, &self.catalog);
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn remaining(&self) -> &[String] {
        self.session
            .as_ref()
            .map(|s| s.remaining.as_slice())
            .unwrap_or(&[])
    }

    pub fn order_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.order_id.as_str())
    }

    pub fn overlay_is_open(&self) -> bool {
        self.overlay_open
    }

    pub fn order_important(&self) -> bool {
        self.order_important
    }
}

// ===========================================================================
// Tests
// ===========================================================================
