//! Picklist payload parsing.
//!
//! A picklist QR code is a multi-line payload: the first line is the order
//! identifier, every following line a `quantity <sep> product-code` pair
//! (separator may be tab, comma, or semicolon). Which of the two fields is
//! the product code is not fixed; it is inferred once from the first row by
//! checking which field matches a catalog code, then applied to every row.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use crate::catalog::Catalog;

/// Row separators, tried in order. A payload containing any of these anywhere
/// is classified as a picklist rather than a single product code.
const SEPARATORS: [char; 3] = ['\t', ',', ';'];

/// Errors that abort a picklist parse (or, for `InvalidRowFormat`, describe a
/// single skipped row).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("cannot tell the product-code column from the quantity column")]
    AmbiguousFieldOrder,
    #[error("no field of the first row matches a known product code")]
    UnknownProductCode,
    #[error("row {line} is not a quantity/product-code pair")]
    InvalidRowFormat { line: usize },
    #[error("picklist contains no pickable rows")]
    EmptyPicklist,
}

/// A row that was skipped without aborting the parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: ParseError,
}

/// Result of a successful parse. `original_order` and `original_counts` are
/// immutable baselines for the whole session; `expanded_codes` seeds the
/// mutable remaining list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPicklist {
    pub order_id: String,
    pub expanded_codes: Vec<String>,
    pub original_order: Vec<String>,
    pub original_counts: HashMap<String, usize>,
    pub skipped: Vec<SkippedRow>,
}

/// True when the payload looks like a picklist rather than a product code.
pub fn is_picklist_payload(payload: &str) -> bool {
    payload.contains(SEPARATORS)
}

/// Split a row on the first separator that yields exactly two fields.
fn split_row(row: &str) -> Option<(&str, &str)> {
    for sep in SEPARATORS {
        let mut parts = row.split(sep);
        if let (Some(a), Some(b), None) = (parts.next(), parts.next(), parts.next()) {
            return Some((a.trim(), b.trim()));
        }
    }
    None
}

/// Index (0 or 1) of the product-code field, inferred from the first row that
/// splits into two fields.
fn infer_code_field(first_row: (&str, &str), catalog: &Catalog) -> Result<usize, ParseError> {
    let (a, b) = first_row;
    match (catalog.contains(a), catalog.contains(b)) {
        (true, true) => Err(ParseError::AmbiguousFieldOrder),
        (true, false) => Ok(0),
        (false, true) => Ok(1),
        (false, false) => Err(ParseError::UnknownProductCode),
    }
}

/// Parse a raw scanned payload into a quantity-expanded picklist.
///
/// Invalid rows are skipped and reported via `skipped`, not fatal; an
/// ambiguous or unmatchable first row aborts the whole parse. A payload with
/// zero valid rows parses to an empty list — the caller decides whether that
/// may start a session.
pub fn parse(raw: &str, catalog: &Catalog) -> Result<ParsedPicklist, ParseError> {
    let mut lines = raw.lines();
    let order_id = lines.next().unwrap_or("").trim().to_string();

    // (1-based line number, row text) for every non-blank candidate row
    let rows: Vec<(usize, &str)> = lines
        .enumerate()
        .map(|(i, l)| (i + 2, l))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();

    let mut expanded: Vec<String> = Vec::new();
    let mut skipped: Vec<SkippedRow> = Vec::new();
    let mut code_field: Option<usize> = None;

    for &(line, row) in &rows {
        let Some(fields) = split_row(row) else {
            warn!(line, row, "picklist row has no recognizable separator, skipping");
            skipped.push(SkippedRow {
                line,
                reason: ParseError::InvalidRowFormat { line },
            });
            continue;
        };

        let code_idx = match code_field {
            Some(idx) => idx,
            None => {
                let idx = infer_code_field(fields, catalog)?;
                code_field = Some(idx);
                idx
            }
        };

        let (code, qty_text) = if code_idx == 0 {
            (fields.0, fields.1)
        } else {
            (fields.1, fields.0)
        };

        let Ok(quantity) = qty_text.parse::<usize>() else {
            warn!(line, qty = qty_text, "picklist row has a non-numeric quantity, skipping");
            skipped.push(SkippedRow {
                line,
                reason: ParseError::InvalidRowFormat { line },
            });
            continue;
        };

        for _ in 0..quantity {
            expanded.push(code.to_string());
        }
    }

    let mut original_counts: HashMap<String, usize> = HashMap::new();
    for code in &expanded {
        *original_counts.entry(code.clone()).or_insert(0) += 1;
    }

    Ok(ParsedPicklist {
        order_id,
        original_order: expanded.clone(),
        expanded_codes: expanded,
        original_counts,
        skipped,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Product};

    fn catalog() -> Catalog {
        Catalog::from_products(vec![
            Product {
                code: "SKU1".into(),
                description: "Blue widget".into(),
                location: "A-2".into(),
            },
            Product {
                code: "SKU2".into(),
                description: "Amber widget".into(),
                location: "A-10".into(),
            },
            // A product whose code is itself numeric
            Product {
                code: "42".into(),
                description: "Numbered bin".into(),
                location: "C-1".into(),
            },
        ])
    }

    #[test]
    fn test_classify_payloads() {
        assert!(is_picklist_payload("ORD-1\n3\tSKU1"));
        assert!(is_picklist_payload("2,SKU1"));
        assert!(is_picklist_payload("2;SKU1"));
        assert!(!is_picklist_payload("SKU1"));
    }

    #[test]
    fn test_parse_quantity_first_rows() {
        let parsed = parse("ORD-77\n3\tSKU1\n1\tSKU2", &catalog()).expect("parse");
        assert_eq!(parsed.order_id, "ORD-77");
        assert_eq!(parsed.expanded_codes, vec!["SKU1", "SKU1", "SKU1", "SKU2"]);
        assert_eq!(parsed.original_order, parsed.expanded_codes);
        assert_eq!(parsed.original_counts["SKU1"], 3);
        assert_eq!(parsed.original_counts["SKU2"], 1);
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_parse_code_first_rows() {
        // Inference flips: the code is in the first column here
        let parsed = parse("ORD-1\nSKU2,2\nSKU1,1", &catalog()).expect("parse");
        assert_eq!(parsed.expanded_codes, vec!["SKU2", "SKU2", "SKU1"]);
    }

    #[test]
    fn test_inferred_order_applies_to_all_rows() {
        // Second row would match the catalog in the other column, but the
        // first row already fixed quantity-first ordering: "SKU1" is not a
        // number, so the row is skipped rather than reinterpreted.
        let parsed = parse("ORD-1\n2\tSKU1\nSKU2\t3", &catalog()).expect("parse");
        assert_eq!(parsed.expanded_codes, vec!["SKU1", "SKU1"]);
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].line, 3);
    }

    #[test]
    fn test_ambiguous_field_order() {
        // Both fields are catalog codes
        let result = parse("ORD-1\n42\tSKU1", &catalog());
        assert_eq!(result.unwrap_err(), ParseError::AmbiguousFieldOrder);
    }

    #[test]
    fn test_unknown_product_code_aborts() {
        let result = parse("ORD-1\n3\tNOPE", &catalog());
        assert_eq!(result.unwrap_err(), ParseError::UnknownProductCode);
    }

    #[test]
    fn test_separator_priority_and_mixed_rows() {
        // Comma rows after a tab row still parse: separators are tried per row
        let parsed = parse("ORD-1\n1\tSKU1\n2,SKU2", &catalog()).expect("parse");
        assert_eq!(parsed.expanded_codes, vec!["SKU1", "SKU2", "SKU2"]);
    }

    #[test]
    fn test_invalid_rows_are_skipped_not_fatal() {
        let parsed = parse(
            "ORD-1\n2\tSKU1\njust-one-field\n1\t2\t3\nx\tSKU2\n1\tSKU2",
            &catalog(),
        )
        .expect("parse");
        assert_eq!(parsed.expanded_codes, vec!["SKU1", "SKU1", "SKU2"]);
        // Rows 3 (no separator pair), 4 (three fields), 5 (bad quantity)
        let lines: Vec<usize> = parsed.skipped.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let parsed = parse("ORD-1\n\n2\tSKU1\n\n", &catalog()).expect("parse");
        assert_eq!(parsed.expanded_codes, vec!["SKU1", "SKU1"]);
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_zero_quantity_expands_to_nothing() {
        let parsed = parse("ORD-1\n0\tSKU1\n2\tSKU2", &catalog()).expect("parse");
        assert_eq!(parsed.expanded_codes, vec!["SKU2", "SKU2"]);
        assert!(!parsed.original_counts.contains_key("SKU1"));
    }

    #[test]
    fn test_empty_payload_is_ok_but_empty() {
        let parsed = parse("", &catalog()).expect("parse");
        assert_eq!(parsed.order_id, "");
        assert!(parsed.expanded_codes.is_empty());

        let parsed = parse("ORD-1", &catalog()).expect("parse");
        assert_eq!(parsed.order_id, "ORD-1");
        assert!(parsed.expanded_codes.is_empty());
    }

    #[test]
    fn test_expanded_length_matches_quantity_sum() {
        let parsed = parse("ORD-1\n3\tSKU1\n2\tSKU2\n1\tSKU1", &catalog()).expect("parse");
        assert_eq!(parsed.expanded_codes.len(), 6);
        let total: usize = parsed.original_counts.values().sum();
        assert_eq!(total, 6);
        assert_eq!(parsed.original_counts["SKU1"], 4);
    }
}
