//! Latest-value selection over temporal duplicates.
//!
//! Health extracts carry one row per reporting period with period labels as
//! irregular as `"2020/21"`, bare years, or full sample dates. Each label is
//! reduced to a comparable year ordinal; labels that defy parsing get
//! `i64::MIN` so they can never beat a parseable row, but they stay in the
//! running (and win by tie-break) when a whole group is unparseable.

use std::{collections::HashMap, sync::OnceLock};

use anyhow::Result;
use log::info;
use regex::Regex;

use crate::{
    cli::LatestArgs,
    frame::{self, Frame},
    io_utils, report,
};

fn year_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4})\s*[/\-]\s*(\d{2})$").expect("valid regex"))
}

fn parse_naive_date(value: &str) -> Option<chrono::NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    DATE_FORMATS
        .iter()
        .find_map(|fmt| chrono::NaiveDate::parse_from_str(value, fmt).ok())
}

/// Extraction rule, in order:
/// 1. `YYYY/YY` or `YYYY-YY` ranges take the trailing two-digit year,
///    2000-based, so `"2020/21"` yields 2021.
/// 2. A bare four-digit year is used directly.
/// 3. A parseable date contributes its year.
/// 4. Anything else maps to `i64::MIN`.
pub fn time_ordinal(raw: &str) -> i64 {
    let trimmed = raw.trim();
    if let Some(captures) = year_range_pattern().captures(trimmed) {
        let tail: i64 = captures[2].parse().expect("two digits");
        return 2000 + tail;
    }
    if trimmed.len() == 4
        && let Ok(year) = trimmed.parse::<i64>()
    {
        return year;
    }
    if let Some(date) = parse_naive_date(trimmed) {
        use chrono::Datelike;
        return i64::from(date.year());
    }
    i64::MIN
}

/// Collapses each `(group_by)` combination to the row with the greatest
/// time ordinal. Ties keep the first-encountered row in input order, which
/// matches how the source extracts behave. Returns the selected frame plus
/// the raw time values that failed to parse.
pub fn select_latest(
    frame: &Frame,
    group_by: &[String],
    time_column: &str,
) -> Result<(Frame, Vec<String>)> {
    let group_indices = group_by
        .iter()
        .map(|name| frame.require_column(name))
        .collect::<Result<Vec<_>>>()?;
    let time_idx = frame.require_column(time_column)?;

    // group key -> (winning row index, winning ordinal)
    let mut winners: HashMap<Vec<String>, (usize, i64)> = HashMap::new();
    let mut group_order: Vec<Vec<String>> = Vec::new();
    let mut unparseable = Vec::new();

    for (row_idx, row) in frame.rows.iter().enumerate() {
        let key: Vec<String> = group_indices.iter().map(|&i| row[i].clone()).collect();
        let ordinal = time_ordinal(&row[time_idx]);
        if ordinal == i64::MIN {
            unparseable.push(row[time_idx].clone());
        }
        match winners.get_mut(&key) {
            Some(entry) => {
                if ordinal > entry.1 {
                    *entry = (row_idx, ordinal);
                }
            }
            None => {
                winners.insert(key.clone(), (row_idx, ordinal));
                group_order.push(key);
            }
        }
    }

    let mut out = Frame::new(frame.headers.clone());
    for key in &group_order {
        let (row_idx, _) = winners[key];
        out.rows.push(frame.rows[row_idx].clone());
    }
    Ok((out, unparseable))
}

pub fn execute(args: &LatestArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_delimiter = io_utils::resolve_output_delimiter(
        args.output.as_deref(),
        args.output_delimiter,
        delimiter,
    );

    let frame = frame::read_input(&args.input, delimiter, encoding)?;
    let (selected, unparseable) = select_latest(&frame, &args.group_by, &args.time_column)?;
    report::log_excluded("unparseable time value(s)", &unparseable);

    selected.write_csv(args.output.as_deref(), output_delimiter)?;
    info!(
        "Selected {} latest row(s) from {} input row(s) across {} group column(s)",
        selected.rows.len(),
        frame.rows.len(),
        args.group_by.len()
    );
    Ok(())
}
