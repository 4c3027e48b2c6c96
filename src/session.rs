//! Scan-session state.
//!
//! One `ScanSession` lives for the duration of a picklist: from the moment a
//! picklist scan is accepted until the list empties or another picklist
//! replaces it. All mutation goes through the reconciliation engine; nothing
//! here is persisted across a restart — re-scanning the picklist restarts the
//! session.

use std::collections::HashMap;
use std::time::Instant;

use crate::picklist::ParsedPicklist;

/// State for the picklist currently being picked.
#[derive(Debug, Clone)]
pub struct ScanSession {
    /// Order identifier from the first payload line; attached to every report.
    pub order_id: String,
    /// Outstanding picks. Multiplicity == remaining unpicked quantity.
    pub remaining: Vec<String>,
    /// Expanded sequence as scanned, before any sorting. Immutable baseline.
    pub original_order: Vec<String>,
    /// Per-code total quantity at creation time. Immutable baseline.
    pub original_counts: HashMap<String, usize>,
    /// When the previous accepted pick happened; `None` before the first.
    pub last_pick_at: Option<Instant>,
    /// Completion has been reported; guards the exactly-once contract.
    pub completion_sent: bool,
}

impl ScanSession {
    pub fn from_parsed(parsed: ParsedPicklist) -> Self {
        ScanSession {
            order_id: parsed.order_id,
            remaining: parsed.expanded_codes,
            original_order: parsed.original_order,
            original_counts: parsed.original_counts,
            last_pick_at: None,
            completion_sent: false,
        }
    }

    /// Remove the first occurrence of `code` from the remaining list.
    /// Returns false (and leaves the list untouched) when absent.
    pub fn remove_first(&mut self, code: &str) -> bool {
        match self.remaining.iter().position(|c| c == code) {
            Some(idx) => {
                self.remaining.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Remaining unpicked quantity for one product code.
    pub fn remaining_count(&self, code: &str) -> usize {
        self.remaining.iter().filter(|c| c.as_str() == code).count()
    }

    /// Original total for a code, defaulting to remaining + 1 when the
    /// baseline somehow has no entry.
    pub fn original_total(&self, code: &str) -> usize {
        self.original_counts
            .get(code)
            .copied()
            .unwrap_or_else(|| self.remaining_count(code) + 1)
    }

    pub fn is_complete(&self) -> bool {
        self.remaining.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn session(codes: &[&str]) -> ScanSession {
        let expanded: Vec<String> = codes.iter().map(|s| s.to_string()).collect();
        let mut counts = HashMap::new();
        for c in &expanded {
            *counts.entry(c.clone()).or_insert(0) += 1;
        }
        ScanSession {
            order_id: "ORD-1".into(),
            remaining: expanded.clone(),
            original_order: expanded,
            original_counts: counts,
            last_pick_at: None,
            completion_sent: false,
        }
    }

    #[test]
    fn test_remove_first_occurrence_only() {
        let mut s = session(&["A", "B", "A"]);
        assert!(s.remove_first("A"));
        assert_eq!(s.remaining, vec!["B", "A"]);
        assert!(s.remove_first("A"));
        assert_eq!(s.remaining, vec!["B"]);
        assert!(!s.remove_first("A"));
        assert_eq!(s.remaining, vec!["B"]);
    }

    #[test]
    fn test_counts_and_totals() {
        let mut s = session(&["X", "Y", "X"]);
        assert_eq!(s.remaining_count("X"), 2);
        assert_eq!(s.original_total("X"), 2);

        s.remove_first("X");
        assert_eq!(s.remaining_count("X"), 1);
        // Baseline total is unchanged by picks
        assert_eq!(s.original_total("X"), 2);

        // Unknown code: total defaults to remaining + 1
        assert_eq!(s.original_total("GHOST"), 1);
    }

    #[test]
    fn test_completion() {
        let mut s = session(&["A"]);
        assert!(!s.is_complete());
        s.remove_first("A");
        assert!(s.is_complete());
    }
}
