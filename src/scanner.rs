//! Line-based scan source.
//!
//! Keyboard-wedge scanners and the terminal both deliver one scan per
//! newline-terminated line. This module turns raw lines into `ScanInput`
//! events for the engine loop:
//!
//! - a blank line acknowledges the duplicate overlay
//! - `tap CODE` simulates one tap on a product row (three within two
//!   seconds trigger the manual override)
//! - `toggle` flips order importance, `sort MODE` re-sorts the list
//! - anything else is a scan payload; `\n` and `\t` escapes are expanded so
//!   multi-line picklist payloads can be entered on one line

use crate::sort::SortMode;

/// Accepted scan payload length after trimming. Shorter inputs are noise
/// from the wedge, longer ones are not a barcode or picklist.
pub const MIN_SCAN_LEN: usize = 3;
pub const MAX_SCAN_LEN: usize = 4096;

/// One decoded input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanInput {
    Scan(String),
    Tap(String),
    AcknowledgeOverlay,
    ToggleOrder,
    Sort(SortMode),
    Quit,
}

/// Expand `\n` / `\t` escapes so a picklist payload fits on one input line.
pub fn unescape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode one input line. `None` means the line is ignored (out-of-bounds
/// payload length).
pub fn parse_line(line: &str) -> Option<ScanInput> {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return Some(ScanInput::AcknowledgeOverlay);
    }
    if trimmed == "quit" || trimmed == "exit" {
        return Some(ScanInput::Quit);
    }
    if trimmed == "toggle" {
        return Some(ScanInput::ToggleOrder);
    }
    if let Some(rest) = trimmed.strip_prefix("tap ") {
        let code = rest.trim();
        if code.is_empty() {
            return None;
        }
        return Some(ScanInput::Tap(code.to_string()));
    }
    if let Some(rest) = trimmed.strip_prefix("sort ") {
        return rest.trim().parse::<SortMode>().ok().map(ScanInput::Sort);
    }

    let payload = unescape(trimmed);
    if payload.len() < MIN_SCAN_LEN || payload.len() > MAX_SCAN_LEN {
        return None;
    }
    Some(ScanInput::Scan(payload))
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line_acknowledges_overlay() {
        assert_eq!(parse_line(""), Some(ScanInput::AcknowledgeOverlay));
        assert_eq!(parse_line("   "), Some(ScanInput::AcknowledgeOverlay));
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse_line("toggle"), Some(ScanInput::ToggleOrder));
        assert_eq!(parse_line("quit"), Some(ScanInput::Quit));
        assert_eq!(
            parse_line("tap SKU1"),
            Some(ScanInput::Tap("SKU1".to_string()))
        );
        assert_eq!(
            parse_line("sort location"),
            Some(ScanInput::Sort(SortMode::Location))
        );
        assert_eq!(parse_line("sort sideways"), None);
    }

    #[test]
    fn test_scan_payload_with_escapes() {
        assert_eq!(
            parse_line(r"ORD-1\n2\tSKU1"),
            Some(ScanInput::Scan("ORD-1\n2\tSKU1".to_string()))
        );
        assert_eq!(parse_line("SKU123"), Some(ScanInput::Scan("SKU123".to_string())));
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(parse_line("ab"), None, "too short to be a barcode");
        let long = "x".repeat(MAX_SCAN_LEN + 1);
        assert_eq!(parse_line(&long), None);
    }

    #[test]
    fn test_unescape_edge_cases() {
        assert_eq!(unescape(r"a\\b"), "a\\b");
        assert_eq!(unescape(r"a\qb"), "a\\qb");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }
}
