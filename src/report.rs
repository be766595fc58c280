//! Exclusion reporting and plain-text table rendering.
//!
//! Every stage that drops or fails to match rows goes through
//! [`log_excluded`] so an analyst can audit completeness before trusting
//! aggregate statistics. The report is a count plus a bounded sample,
//! enough to spot a systematic key mismatch without flooding the log.

use std::fmt::Write as _;

use log::warn;

const SAMPLE_LIMIT: usize = 5;

pub fn log_excluded(label: &str, keys: &[String]) {
    if keys.is_empty() {
        return;
    }
    let sample = keys
        .iter()
        .take(SAMPLE_LIMIT)
        .map(|k| format!("'{k}'"))
        .collect::<Vec<_>>()
        .join(", ");
    if keys.len() > SAMPLE_LIMIT {
        warn!("{} {label}: {sample}, ...", keys.len());
    } else {
        warn!("{} {label}: {sample}", keys.len());
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths.iter())
        .map(|(value, width)| {
            let padding = width.saturating_sub(value.chars().count());
            format!("{value}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}
