//! The `normalize` command: filter, canonicalize names, canonicalize codes.
//!
//! One pass over one file, replacing the per-script cleanup blocks the
//! source analyses repeated: keep the rows of interest, collapse name
//! variants through an alias table, and zero-pad the code key (optionally
//! into a derived column such as `ta_code_str`).

use anyhow::{Result, anyhow};
use log::info;

use crate::{
    cli::NormalizeArgs,
    filter, frame, io_utils,
    keys::{self, AliasTable},
    report,
};

pub fn execute(args: &NormalizeArgs) -> Result<()> {
    if args.code.is_none() && args.name.is_none() && args.filters.is_empty() {
        return Err(anyhow!(
            "Nothing to do: provide --code, --name, and/or --filter"
        ));
    }
    if args.name.is_some() && args.aliases.is_none() {
        return Err(anyhow!("--name requires --aliases (built-in name or YAML path)"));
    }

    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_delimiter = io_utils::resolve_output_delimiter(
        args.output.as_deref(),
        args.output_delimiter,
        delimiter,
    );

    let mut frame = frame::read_input(&args.input, delimiter, encoding)?;
    let input_rows = frame.rows.len();

    if !args.filters.is_empty() {
        let filters = filter::parse_filters(&args.filters)?;
        frame = filter::apply(&frame, &filters)?;
        info!(
            "Filter kept {} of {} row(s)",
            frame.rows.len(),
            input_rows
        );
    }

    if let (Some(column), Some(source)) = (&args.name, &args.aliases) {
        let table = AliasTable::resolve_source(source)?;
        frame = keys::normalize_name_column(&frame, column, &table)?;
    }

    if let Some(column) = &args.code {
        let (normalized, excluded) = keys::normalize_code_column(
            &frame,
            column,
            args.width,
            args.into.as_deref(),
            args.mode,
        )?;
        report::log_excluded("row(s) with uncoercible code", &excluded);
        frame = normalized;
    }

    frame.write_csv(args.output.as_deref(), output_delimiter)?;
    info!(
        "Normalized {} row(s) into {} output row(s)",
        input_rows,
        frame.rows.len()
    );
    Ok(())
}
