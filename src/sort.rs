//! Picklist ordering.
//!
//! The remaining list can be shown in scan order, by warehouse location, or
//! by product description. Location and description sorts use a natural
//! comparator so `AISLE-2` sorts before `AISLE-10`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;

/// How the remaining picklist is ordered on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Original scan order of the picklist payload.
    #[default]
    Original,
    /// By the product's warehouse location.
    Location,
    /// By the product's description.
    Description,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(SortMode::Original),
            "location" => Ok(SortMode::Location),
            "description" => Ok(SortMode::Description),
            other => Err(format!("unknown sort mode: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Natural comparison
// ---------------------------------------------------------------------------

/// A maximal run of digits or non-digits within a string.
#[derive(Debug, PartialEq, Eq)]
enum Run<'a> {
    Number(&'a str),
    Text(&'a str),
}

/// Split a string into alternating digit / non-digit runs.
fn runs(s: &str) -> Vec<Run<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut numeric = None;

    for (i, c) in s.char_indices() {
        let is_digit = c.is_ascii_digit();
        match numeric {
            None => numeric = Some(is_digit),
            Some(n) if n != is_digit => {
                out.push(if n {
                    Run::Number(&s[start..i])
                } else {
                    Run::Text(&s[start..i])
                });
                start = i;
                numeric = Some(is_digit);
            }
            _ => {}
        }
    }

    if let Some(n) = numeric {
        out.push(if n {
            Run::Number(&s[start..])
        } else {
            Run::Text(&s[start..])
        });
    }

    out
}

/// Compare two digit runs by integer value. Runs too long for u128 fall back
/// to length-then-lexicographic comparison, which orders equally-padded
/// numbers correctly.
fn cmp_number_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    match (a.parse::<u128>(), b.parse::<u128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        // Empty string after stripping zeros means the value is zero
        _ if a.is_empty() && b.is_empty() => Ordering::Equal,
        _ if a.is_empty() => Ordering::Less,
        _ if b.is_empty() => Ordering::Greater,
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

/// Natural string comparison: digit runs compare by value, text runs compare
/// case-insensitively, and a strict prefix sorts first.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let ra = runs(a);
    let rb = runs(b);

    for pair in ra.iter().zip(rb.iter()) {
        let ord = match pair {
            (Run::Number(x), Run::Number(y)) => cmp_number_runs(x, y),
            (Run::Text(x), Run::Text(y)) => {
                let xl = x.to_lowercase();
                let yl = y.to_lowercase();
                xl.cmp(&yl)
            }
            // Mixed run kinds at the same position: numbers sort before text
            (Run::Number(_), Run::Text(_)) => Ordering::Less,
            (Run::Text(_), Run::Number(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    ra.len().cmp(&rb.len())
}

// ---------------------------------------------------------------------------
// Picklist sorting
// ---------------------------------------------------------------------------

/// Reorder `codes` by the requested mode. Stable; never changes multiplicity.
///
/// `original_order` is the expanded sequence captured at parse time and is
/// used to restore scan order. Codes missing from the catalog (or from
/// `original_order`) sort first via an empty attribute / index zero.
pub fn sort_codes(
    codes: &[String],
    catalog: &Catalog,
    mode: SortMode,
    original_order: &[String],
) -> Vec<String> {
    let mut sorted: Vec<String> = codes.to_vec();

    match mode {
        SortMode::Original => {
            let mut first_index: HashMap<&str, usize> = HashMap::new();
            for (i, code) in original_order.iter().enumerate() {
                first_index.entry(code.as_str()).or_insert(i);
            }
            sorted.sort_by_key(|code| first_index.get(code.as_str()).copied().unwrap_or(0));
        }
        SortMode::Location => {
            sorted.sort_by(|a, b| natural_cmp(attr_location(catalog, a), attr_location(catalog, b)));
        }
        SortMode::Description => {
            sorted.sort_by(|a, b| {
                natural_cmp(attr_description(catalog, a), attr_description(catalog, b))
            });
        }
    }

    sorted
}

fn attr_location<'a>(catalog: &'a Catalog, code: &str) -> &'a str {
    catalog.get(code).map(|p| p.location.as_str()).unwrap_or("")
}

fn attr_description<'a>(catalog: &'a Catalog, code: &str) -> &'a str {
    catalog
        .get(code)
        .map(|p| p.description.as_str())
        .unwrap_or("")
}

// ===========================================================================
// Tests
// ===========================================================================
