//! Manual override input path.
//!
//! A picker without a working scan (damaged label, unreadable code) taps the
//! product's row three times within two seconds to force-confirm it. The
//! tracker only decides when the gesture fires; the forced pick itself goes
//! through the reconciliation engine so downstream effects match a real scan.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Taps inside this window count toward the gesture.
pub const CLICK_WINDOW: Duration = Duration::from_secs(2);
/// Taps required to trigger a forced pick.
pub const CLICK_COUNT: usize = 3;

/// Sliding per-code window of interaction timestamps.
#[derive(Debug, Default)]
pub struct OverrideTracker {
    clicks: HashMap<String, Vec<Instant>>,
}

impl OverrideTracker {
    pub fn new() -> Self {
        OverrideTracker::default()
    }

    /// Record a tap on `code` at `now`. Returns true when this tap completes
    /// the gesture; the code's window is reset so the next trigger needs
    /// three fresh taps.
    pub fn register(&mut self, code: &str, now: Instant) -> bool {
        let times = self.clicks.entry(code.to_string()).or_default();
        times.retain(|t| now.saturating_duration_since(*t) <= CLICK_WINDOW);
        times.push(now);

        if times.len() >= CLICK_COUNT {
            times.clear();
            true
        } else {
            false
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_rapid_taps_trigger() {
        let mut t = OverrideTracker::new();
        let base = Instant::now();
        assert!(!t.register("SKU1", base));
        assert!(!t.register("SKU1", base + Duration::from_millis(300)));
        assert!(t.register("SKU1", base + Duration::from_millis(900)));
    }

    #[test]
    fn test_slow_taps_do_not_trigger() {
        let mut t = OverrideTracker::new();
        let base = Instant::now();
        assert!(!t.register("SKU1", base));
        assert!(!t.register("SKU1", base + Duration::from_millis(1500)));
        // First tap has slid out of the window by now
        assert!(!t.register("SKU1", base + Duration::from_millis(3000)));
    }

    #[test]
    fn test_taps_on_different_codes_are_independent() {
        let mut t = OverrideTracker::new();
        let base = Instant::now();
        assert!(!t.register("SKU1", base));
        assert!(!t.register("SKU2", base + Duration::from_millis(100)));
        assert!(!t.register("SKU1", base + Duration::from_millis(200)));
        assert!(!t.register("SKU2", base + Duration::from_millis(300)));
        assert!(t.register("SKU1", base + Duration::from_millis(400)));
    }

    #[test]
    fn test_window_resets_after_trigger() {
        let mut t = OverrideTracker::new();
        let base = Instant::now();
        for i in 0..2 {
            t.register("SKU1", base + Duration::from_millis(i * 100));
        }
        assert!(t.register("SKU1", base + Duration::from_millis(200)));
        // A fourth rapid tap starts a fresh window instead of retriggering
        assert!(!t.register("SKU1", base + Duration::from_millis(300)));
        assert!(!t.register("SKU1", base + Duration::from_millis(400)));
        assert!(t.register("SKU1", base + Duration::from_millis(500)));
    }
}
