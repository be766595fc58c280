//! YAML-described stage chains.
//!
//! A pipeline document names an input, an output, and an ordered list of
//! stages; each stage is one of the whole-table transforms the individual
//! subcommands expose. Re-running a pipeline over unchanged inputs
//! reproduces the same output rows, so a document is a replayable record of
//! how a merged table was produced.
//!
//! ```yaml
//! input: data_raw/adult_body_size.csv
//! output: data_proc/obesity_by_region_ethnicity.csv
//! steps:
//!   - stage: resolve
//!     roles:
//!       - role: health_region
//!         candidates: [health_region, region, health service area name]
//!   - stage: filter
//!     filters: ["indicator matches overw[_ ]?obese"]
//!   - stage: normalize-name
//!     column: health_region
//!     aliases: health-regions
//!   - stage: latest
//!     group_by: [health_region, ethnicity]
//!     time_column: year
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use crate::{
    aggregate,
    cli::{PipelineArgs, RunMode},
    filter,
    frame::{self, Frame},
    io_utils, join,
    keys::{self, AliasTable},
    latest, report,
    roles::{self, RoleSpec},
};

#[derive(Debug, Deserialize)]
pub struct PipelineDoc {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "stage", rename_all = "kebab-case")]
pub enum Step {
    /// Rename role-resolved columns to their role names.
    Resolve { roles: Vec<RoleSpec> },
    /// Keep rows matching every filter expression.
    Filter { filters: Vec<String> },
    /// Zero-pad a code column, optionally into a derived column.
    NormalizeCode {
        column: String,
        #[serde(default = "default_width")]
        width: usize,
        #[serde(default)]
        into: Option<String>,
        #[serde(default)]
        mode: RunMode,
    },
    /// Canonicalize a name column through an alias table
    /// (built-in name or YAML path).
    NormalizeName { column: String, aliases: String },
    /// Keep the most recent row per group.
    Latest {
        group_by: Vec<String>,
        time_column: String,
    },
    /// Left-join another file onto the working frame.
    Join {
        right: PathBuf,
        left_key: String,
        right_key: String,
        #[serde(default)]
        mode: RunMode,
    },
    /// Group-by mean over numeric columns.
    Aggregate {
        group_by: Vec<String>,
        values: Vec<String>,
    },
}

fn default_width() -> usize {
    3
}

pub fn load(path: &PathBuf) -> Result<PipelineDoc> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Opening pipeline file {path:?}"))?;
    let doc: PipelineDoc =
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing pipeline YAML {path:?}"))?;
    Ok(doc)
}

fn run_step(frame: Frame, step: &Step) -> Result<Frame> {
    match step {
        Step::Resolve { roles: specs } => roles::rename_resolved(&frame, specs),
        Step::Filter { filters: specs } => {
            let filters = filter::parse_filters(specs)?;
            filter::apply(&frame, &filters)
        }
        Step::NormalizeCode {
            column,
            width,
            into,
            mode,
        } => {
            let (out, excluded) =
                keys::normalize_code_column(&frame, column, *width, into.as_deref(), *mode)?;
            report::log_excluded("row(s) with uncoercible code", &excluded);
            Ok(out)
        }
        Step::NormalizeName { column, aliases } => {
            let table = AliasTable::resolve_source(aliases)?;
            keys::normalize_name_column(&frame, column, &table)
        }
        Step::Latest {
            group_by,
            time_column,
        } => {
            let (out, unparseable) = latest::select_latest(&frame, group_by, time_column)?;
            report::log_excluded("unparseable time value(s)", &unparseable);
            Ok(out)
        }
        Step::Join {
            right,
            left_key,
            right_key,
            mode,
        } => {
            let delimiter = io_utils::resolve_input_delimiter(right, None);
            let right_frame = frame::read_input(right, delimiter, encoding_rs::UTF_8)?;
            let outcome = join::left_join(&frame, &right_frame, left_key, right_key, *mode)?;
            report::log_excluded("unmatched left key(s)", &outcome.unmatched);
            Ok(outcome.frame)
        }
        Step::Aggregate { group_by, values } => {
            let (out, excluded) = aggregate::group_mean(&frame, group_by, values)?;
            report::log_excluded("non-numeric value cell(s)", &excluded);
            Ok(out)
        }
    }
}

fn stage_name(step: &Step) -> &'static str {
    match step {
        Step::Resolve { .. } => "resolve",
        Step::Filter { .. } => "filter",
        Step::NormalizeCode { .. } => "normalize-code",
        Step::NormalizeName { .. } => "normalize-name",
        Step::Latest { .. } => "latest",
        Step::Join { .. } => "join",
        Step::Aggregate { .. } => "aggregate",
    }
}

pub fn execute(args: &PipelineArgs) -> Result<()> {
    let doc = load(&args.config)?;
    let delimiter = io_utils::resolve_input_delimiter(&doc.input, None);
    let mut frame = frame::read_input(&doc.input, delimiter, encoding_rs::UTF_8)?;
    info!(
        "Pipeline start: {} row(s) from {:?}, {} step(s)",
        frame.rows.len(),
        doc.input,
        doc.steps.len()
    );

    for (idx, step) in doc.steps.iter().enumerate() {
        frame = run_step(frame, step)
            .with_context(|| format!("Step {} ({})", idx + 1, stage_name(step)))?;
        info!(
            "Step {} ({}): {} row(s)",
            idx + 1,
            stage_name(step),
            frame.rows.len()
        );
    }

    let output_delimiter = io_utils::resolve_output_delimiter(Some(&doc.output), None, delimiter);
    frame.write_csv(Some(&doc.output), output_delimiter)?;
    info!(
        "Pipeline complete: {} row(s) written to {:?}",
        frame.rows.len(),
        doc.output
    );
    Ok(())
}
