//! Left-join merger with unmatched-key accounting.
//!
//! Every left row appears exactly once in the output. Left keys with no
//! right-side counterpart keep their row (right columns empty) and land in a
//! side list the caller must surface: aggregate statistics computed over a
//! silently partial join are the known correctness hazard here. Duplicate
//! right keys are fatal in strict mode; lenient mode keeps the first right
//! row in file order.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{JoinArgs, RunMode},
    error::ReconcileError,
    frame::{self, Frame},
    io_utils,
    keys::{self, AliasTable},
    report,
};

#[derive(Debug)]
pub struct JoinOutcome {
    pub frame: Frame,
    /// Left key values with no right-side match, one entry per left row.
    pub unmatched: Vec<String>,
}

pub fn left_join(
    left: &Frame,
    right: &Frame,
    left_key: &str,
    right_key: &str,
    mode: RunMode,
) -> Result<JoinOutcome> {
    let left_idx = left
        .require_column(left_key)
        .context("Resolving left join key")?;
    let right_idx = right
        .require_column(right_key)
        .context("Resolving right join key")?;

    // key -> right row indices, in file order
    let mut lookup: HashMap<&str, Vec<usize>> = HashMap::new();
    for (row_idx, row) in right.rows.iter().enumerate() {
        lookup
            .entry(row[right_idx].as_str())
            .or_default()
            .push(row_idx);
    }

    let (headers, right_columns) = output_headers(&left.headers, &right.headers, right_idx);
    let mut out = Frame::new(headers);
    let mut unmatched = Vec::new();

    for row in &left.rows {
        let key = row[left_idx].as_str();
        let mut combined = row.clone();
        match lookup.get(key) {
            Some(bucket) => {
                if bucket.len() > 1 && matches!(mode, RunMode::Strict) {
                    return Err(ReconcileError::AmbiguousJoin {
                        key: key.to_string(),
                        matches: bucket.len(),
                    }
                    .into());
                }
                let matched = &right.rows[bucket[0]];
                combined.extend(right_columns.iter().map(|&idx| matched[idx].clone()));
            }
            None => {
                unmatched.push(key.to_string());
                combined.extend(right_columns.iter().map(|_| String::new()));
            }
        }
        out.rows.push(combined);
    }

    Ok(JoinOutcome {
        frame: out,
        unmatched,
    })
}

/// Left headers, then right headers minus the key column, with clashes
/// renamed `right_<name>_<n>`.
fn output_headers(
    left_headers: &[String],
    right_headers: &[String],
    right_key_idx: usize,
) -> (Vec<String>, Vec<usize>) {
    let mut headers = left_headers.to_vec();
    let mut seen: HashSet<String> = headers.iter().cloned().collect();
    let mut right_columns = Vec::new();

    for (idx, name) in right_headers.iter().enumerate() {
        if idx == right_key_idx {
            continue;
        }
        let mut candidate = name.clone();
        if seen.contains(&candidate) {
            let base = candidate.clone();
            let mut counter = 1usize;
            while seen.contains(&candidate) {
                candidate = format!("right_{base}_{counter}");
                counter += 1;
            }
        }
        seen.insert(candidate.clone());
        headers.push(candidate);
        right_columns.push(idx);
    }

    (headers, right_columns)
}

fn normalize_keys(
    frame: Frame,
    key: &str,
    code_width: Option<usize>,
    aliases: Option<&AliasTable>,
    mode: RunMode,
    side: &str,
) -> Result<Frame> {
    let mut frame = frame;
    if let Some(width) = code_width {
        let (normalized, excluded) = keys::normalize_code_column(&frame, key, width, None, mode)
            .with_context(|| format!("Normalizing {side} key column '{key}'"))?;
        report::log_excluded(&format!("{side} row(s) with uncoercible key"), &excluded);
        frame = normalized;
    }
    if let Some(table) = aliases {
        frame = keys::normalize_name_column(&frame, key, table)
            .with_context(|| format!("Normalizing {side} key column '{key}'"))?;
    }
    Ok(frame)
}

pub fn execute(args: &JoinArgs) -> Result<()> {
    let left_delimiter = io_utils::resolve_input_delimiter(&args.left, args.delimiter);
    let right_delimiter = io_utils::resolve_input_delimiter(&args.right, args.delimiter);
    let output_delimiter = io_utils::resolve_output_delimiter(
        args.output.as_deref(),
        args.output_delimiter,
        left_delimiter,
    );
    let left_encoding = io_utils::resolve_encoding(args.left_encoding.as_deref())?;
    let right_encoding = io_utils::resolve_encoding(args.right_encoding.as_deref())?;

    let aliases = args
        .aliases
        .as_deref()
        .map(AliasTable::resolve_source)
        .transpose()?;

    let left = frame::read_input(&args.left, left_delimiter, left_encoding)?;
    let right = frame::read_input(&args.right, right_delimiter, right_encoding)?;

    let left = normalize_keys(
        left,
        &args.left_key,
        args.code_width,
        aliases.as_ref(),
        args.mode,
        "left",
    )?;
    let right = normalize_keys(
        right,
        &args.right_key,
        args.code_width,
        aliases.as_ref(),
        args.mode,
        "right",
    )?;

    let outcome = left_join(&left, &right, &args.left_key, &args.right_key, args.mode)?;
    report::log_excluded("unmatched left key(s)", &outcome.unmatched);

    if let Some(path) = &args.unmatched {
        let mut side = Frame::new(vec![args.left_key.clone()]);
        side.rows = outcome.unmatched.iter().map(|k| vec![k.clone()]).collect();
        side.write_csv(Some(path), io_utils::DEFAULT_CSV_DELIMITER)?;
    }

    outcome
        .frame
        .write_csv(args.output.as_deref(), output_delimiter)?;
    info!(
        "Join complete: {} output row(s), {} matched, {} unmatched",
        outcome.frame.rows.len(),
        outcome.frame.rows.len() - outcome.unmatched.len(),
        outcome.unmatched.len()
    );
    Ok(())
}
