//! Start-up banner and terminal sizing.

use std::env;
use std::io::{self, Write};

use terminal_size::{Width, terminal_size};

/// Width used when nothing better is known.
pub const DEFAULT_WIDTH: usize = 80;

/// Picks the meter width: explicit value, then the size stdout's terminal
/// reports, then `$COLUMNS`, then 80 columns.
pub fn terminal_width(explicit: Option<usize>) -> usize {
    let detected = terminal_size().map(|(Width(w), _)| w as usize);
    let columns = env::var("COLUMNS").ok();
    choose_width(explicit, detected, columns.as_deref())
}

fn choose_width(explicit: Option<usize>, detected: Option<usize>, columns: Option<&str>) -> usize {
    let columns = columns.and_then(|c| c.trim().parse().ok());
    [explicit, detected, columns]
        .into_iter()
        .flatten()
        .find(|&w| w > 0)
        .unwrap_or(DEFAULT_WIDTH)
}

/// Writes `lines` centred between two rules of `=`.
pub fn write_banner<W: Write>(out: &mut W, width: usize, lines: &[&str]) -> io::Result<()> {
    let rule = "=".repeat(width);
    writeln!(out, "{rule}")?;
    for line in lines {
        let pad = width.saturating_sub(line.chars().count()) / 2;
        writeln!(out, "{:pad$}{line}", "")?;
    }
    writeln!(out, "{rule}")?;
    out.flush()
}
