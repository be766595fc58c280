//! Group-by mean aggregation.
//!
//! Collapses reconciled tables to one row per group with the mean of each
//! requested value column (mean radiance per health region, mean PM2.5 per
//! year). Cells that fail numeric parsing are excluded from that group's
//! mean and counted for the exclusion report; a group with no numeric cells
//! emits an empty cell rather than a fabricated zero.

use std::collections::HashMap;

use anyhow::Result;
use itertools::Itertools;
use log::info;

use crate::{
    cli::AggregateArgs,
    frame::{self, Frame},
    io_utils, report,
};

struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn render(&self) -> String {
        if self.count == 0 {
            return String::new();
        }
        format_number(self.sum / self.count as f64)
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// One output row per distinct `group_by` combination, sorted by group key
/// for stable re-runs. Returns the aggregated frame plus the raw cells that
/// were excluded as non-numeric.
pub fn group_mean(
    frame: &Frame,
    group_by: &[String],
    value_columns: &[String],
) -> Result<(Frame, Vec<String>)> {
    let group_indices = group_by
        .iter()
        .map(|name| frame.require_column(name))
        .collect::<Result<Vec<_>>>()?;
    let value_indices = value_columns
        .iter()
        .map(|name| frame.require_column(name))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: HashMap<Vec<String>, Vec<MeanAccumulator>> = HashMap::new();
    let mut excluded = Vec::new();

    for row in &frame.rows {
        let key: Vec<String> = group_indices.iter().map(|&i| row[i].clone()).collect();
        let accumulators = groups
            .entry(key)
            .or_insert_with(|| value_indices.iter().map(|_| MeanAccumulator::new()).collect());
        for (slot, &idx) in accumulators.iter_mut().zip(value_indices.iter()) {
            let cell = row[idx].trim();
            match cell.parse::<f64>() {
                Ok(value) if value.is_finite() => slot.push(value),
                _ => excluded.push(row[idx].clone()),
            }
        }
    }

    let mut headers = group_by.to_vec();
    headers.extend(value_columns.iter().cloned());
    let mut out = Frame::new(headers);
    for (key, accumulators) in groups.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        let mut row = key;
        row.extend(accumulators.iter().map(MeanAccumulator::render));
        out.rows.push(row);
    }
    Ok((out, excluded))
}

pub fn execute(args: &AggregateArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_delimiter = io_utils::resolve_output_delimiter(
        args.output.as_deref(),
        args.output_delimiter,
        delimiter,
    );

    let frame = frame::read_input(&args.input, delimiter, encoding)?;
    let (aggregated, excluded) = group_mean(&frame, &args.group_by, &args.values)?;
    report::log_excluded("non-numeric value cell(s)", &excluded);

    aggregated.write_csv(args.output.as_deref(), output_delimiter)?;
    info!(
        "Aggregated {} input row(s) into {} group(s)",
        frame.rows.len(),
        aggregated.rows.len()
    );
    Ok(())
}
