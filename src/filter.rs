//! Row predicates for pre-merge cleanup.
//!
//! Supports the filter shapes the source extracts actually need: exact
//! match, exclusion, case-insensitive substring, and a regex operator for
//! indicator patterns like `overw[_ ]?obese`. Syntax: `column = value`,
//! `column != value`, `column contains value`, `column matches pattern`.

use anyhow::{Context, Result, anyhow};
use regex::Regex;

use crate::frame::Frame;

#[derive(Debug, Clone)]
pub enum FilterOp {
    Eq,
    NotEq,
    Contains,
    Matches(Regex),
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

pub fn parse_filters(specs: &[String]) -> Result<Vec<Filter>> {
    specs.iter().map(|spec| parse_filter(spec)).collect()
}

fn parse_filter(spec: &str) -> Result<Filter> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }

    let lowered = trimmed.to_ascii_lowercase();
    for needle in [" contains ", " matches "] {
        if let Some(idx) = lowered.find(needle) {
            let column = trimmed[..idx].trim();
            let value = unquote(trimmed[idx + needle.len()..].trim());
            let op = if needle == " matches " {
                let pattern = Regex::new(&format!("(?i){value}"))
                    .with_context(|| format!("Compiling filter pattern '{value}'"))?;
                FilterOp::Matches(pattern)
            } else {
                FilterOp::Contains
            };
            return Ok(Filter {
                column: column.to_string(),
                op,
                value: value.to_string(),
            });
        }
    }

    for (needle, op) in [("!=", FilterOp::NotEq), ("=", FilterOp::Eq)] {
        if let Some(idx) = trimmed.find(needle) {
            return Ok(Filter {
                column: trimmed[..idx].trim().to_string(),
                op,
                value: unquote(trimmed[idx + needle.len()..].trim()).to_string(),
            });
        }
    }

    Err(anyhow!("Failed to parse filter expression '{trimmed}'"))
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if value.len() >= 2
        && ((bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\''))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Keeps rows matching every filter. Unknown filter columns are an error,
/// not an empty result.
pub fn apply(frame: &Frame, filters: &[Filter]) -> Result<Frame> {
    let bound = filters
        .iter()
        .map(|filter| {
            frame
                .require_column(&filter.column)
                .with_context(|| format!("Binding filter on '{}'", filter.column))
                .map(|idx| (idx, filter))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut out = Frame::new(frame.headers.clone());
    out.rows = frame
        .rows
        .iter()
        .filter(|row| bound.iter().all(|(idx, filter)| matches(filter, &row[*idx])))
        .cloned()
        .collect();
    Ok(out)
}

fn matches(filter: &Filter, cell: &str) -> bool {
    match &filter.op {
        FilterOp::Eq => cell.trim() == filter.value,
        FilterOp::NotEq => cell.trim() != filter.value,
        FilterOp::Contains => cell.to_lowercase().contains(&filter.value.to_lowercase()),
        FilterOp::Matches(pattern) => pattern.is_match(cell),
    }
}
