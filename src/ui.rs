//! Presentation seam.
//!
//! The reconciliation engine talks to whatever renders the remaining list
//! through this narrow trait; the engine never touches the display directly.
//! `ConsoleUi` is the terminal implementation used by the binary.

use std::io::{self, BufRead, Write};

use tracing::{error, info};

use crate::catalog::Catalog;

/// What the engine needs from the display layer. Implementations must be
/// shareable across tasks — the reporting client raises notifications from
/// spawned network tasks.
pub trait PickerUi: Send + Sync {
    /// Redraw the remaining picklist.
    fn render(&self, remaining: &[String], catalog: &Catalog);

    /// Short-lived toast; errors are styled distinctly.
    fn notify(&self, message: &str, is_error: bool);

    /// Yes/no prompt, used before replacing an in-progress picklist.
    fn confirm(&self, message: &str) -> bool;

    /// Blocking overlay shown when more of the same product remains.
    fn show_duplicate_overlay(&self, description: &str, remaining: usize, total: usize);

    fn hide_duplicate_overlay(&self);
}

/// Terminal renderer: prints the remaining list as a table and notifications
/// to stdout/stderr.
pub struct ConsoleUi {
    /// Answer picklist-replacement prompts without asking. Used for
    /// non-interactive runs and piped input.
    pub auto_confirm: bool,
}

impl ConsoleUi {
    pub fn new(auto_confirm: bool) -> Self {
        ConsoleUi { auto_confirm }
    }
}

impl PickerUi for ConsoleUi {
    fn render(&self, remaining: &[String], catalog: &Catalog) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "\n  {:<16} {:<32} {:<12}", "CODE", "DESCRIPTION", "LOCATION");
        let _ = writeln!(out, "  {}", "-".repeat(62));
        for code in remaining {
            let (description, location) = match catalog.get(code) {
                Some(p) => (p.description.as_str(), p.location.as_str()),
                None => ("", ""),
            };
            let _ = writeln!(out, "  {code:<16} {description:<32} {location:<12}");
        }
        let _ = writeln!(out, "  {} item(s) remaining\n", remaining.len());
    }

    fn notify(&self, message: &str, is_error: bool) {
        if is_error {
            error!("{message}");
            eprintln!("[!] {message}");
        } else {
            info!("{message}");
            println!("[*] {message}");
        }
    }

    fn confirm(&self, message: &str) -> bool {
        if self.auto_confirm {
            println!("[?] {message} -- auto-confirmed");
            return true;
        }
        print!("[?] {message} [y/N] ");
        let _ = io::stdout().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn show_duplicate_overlay(&self, description: &str, remaining: usize, total: usize) {
        println!("\n  +--------------------------------------------------+");
        println!("  |  {description} -- {remaining} of {total} remaining");
        println!("  |  (scan paused: press Enter to continue)");
        println!("  +--------------------------------------------------+\n");
    }

    fn hide_duplicate_overlay(&self) {
        println!("  overlay dismissed, scanning resumed");
    }
}
