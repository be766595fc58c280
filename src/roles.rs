//! Schema role resolution.
//!
//! Source extracts name the same semantic column a dozen different ways
//! (`Health Region`, `health service area name`, `Regional Council`, ...).
//! A role is resolved against a header set through a prioritized candidate
//! list: the first candidate with any match wins, and within one candidate
//! the first matching header in file order wins. No match is a hard error,
//! since guessing a fallback column would hide exactly the upstream drift
//! this tool is meant to catch.

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, anyhow};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    cli::RolesArgs,
    error::ReconcileError,
    frame::{self, Frame},
    io_utils, report,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub role: String,
    pub candidates: Vec<String>,
}

/// Lowercases and collapses non-alphanumeric runs to `_`, so that
/// `"Health Region"`, `"health_region"`, and `"Health-Region "` compare equal.
pub fn normalize_header(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_separator = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    out
}

/// Resolves `role` to an actual column name, honoring candidate order.
pub fn resolve<'a>(
    columns: &'a [String],
    role: &str,
    candidates: &[String],
) -> Result<&'a str, ReconcileError> {
    resolve_index(columns, role, candidates).map(|idx| columns[idx].as_str())
}

/// Resolves `role` to a column index, honoring candidate order.
pub fn resolve_index(
    columns: &[String],
    role: &str,
    candidates: &[String],
) -> Result<usize, ReconcileError> {
    for candidate in candidates {
        let wanted = normalize_header(candidate);
        if let Some(idx) = columns.iter().position(|c| normalize_header(c) == wanted) {
            return Ok(idx);
        }
    }
    Err(ReconcileError::SchemaResolution {
        role: role.to_string(),
        candidates: candidates.to_vec(),
    })
}

/// Candidate lists for the column variants seen across Ministry of Health,
/// LAWA, and Stats NZ extracts.
pub fn builtin_roles() -> Vec<RoleSpec> {
    fn spec(role: &str, candidates: &[&str]) -> RoleSpec {
        RoleSpec {
            role: role.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
        }
    }
    vec![
        spec(
            "region",
            &[
                "health_region",
                "region",
                "regional council",
                "council",
                "health service area",
                "health service area name",
            ],
        ),
        spec("indicator", &["indicator", "measure_name"]),
        spec("year", &["year", "year_ending_june", "year_to", "viirs_year"]),
        spec(
            "ethnicity",
            &["ethnicity_prioritised", "ethnicity prioritised", "ethnicity", "subgroup"],
        ),
        spec("rate", &["estimate", "percent", "percentage", "value", "rate"]),
        spec("code", &["ta_code", "ta_code_str", "code"]),
        spec("name", &["ta_name", "name"]),
    ]
}

pub fn load_roles(path: &Path) -> Result<Vec<RoleSpec>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Opening roles file {path:?}"))?;
    let specs: Vec<RoleSpec> =
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing roles YAML {path:?}"))?;
    Ok(specs)
}

/// Renames each resolved role's column to the role name, leaving all other
/// columns untouched. Fails on the first unresolvable role.
///
/// Every role is resolved against the original headers before any rename is
/// applied, so a role name that happens to equal another role's candidate
/// cannot be picked up mid-rename. Two roles landing on the same column is
/// an error.
pub fn rename_resolved(frame: &Frame, specs: &[RoleSpec]) -> Result<Frame> {
    let mut claimed: HashMap<usize, &str> = HashMap::new();
    for spec in specs {
        let idx = resolve_index(&frame.headers, &spec.role, &spec.candidates)?;
        if let Some(previous) = claimed.insert(idx, &spec.role) {
            return Err(anyhow!(
                "Roles '{previous}' and '{}' both resolve to column '{}'",
                spec.role,
                frame.headers[idx]
            ));
        }
    }
    let mut out = frame.clone();
    for (idx, role) in claimed {
        out.headers[idx] = role.to_string();
    }
    Ok(out)
}

pub fn execute(args: &RolesArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;

    let mut specs = match &args.roles_file {
        Some(path) => load_roles(path)?,
        None => builtin_roles(),
    };
    if !args.roles.is_empty() {
        specs.retain(|spec| args.roles.iter().any(|r| r == &spec.role));
    }

    let frame = frame::read_input(&args.input, delimiter, encoding)?;

    let mut table_rows = Vec::with_capacity(specs.len());
    let mut unresolved = Vec::new();
    for spec in &specs {
        match resolve(&frame.headers, &spec.role, &spec.candidates) {
            Ok(column) => table_rows.push(vec![spec.role.clone(), column.to_string()]),
            Err(err) => {
                if args.require {
                    return Err(err.into());
                }
                table_rows.push(vec![spec.role.clone(), "-".to_string()]);
                unresolved.push(spec.role.clone());
            }
        }
    }

    report::print_table(
        &["role".to_string(), "column".to_string()],
        &table_rows,
    );
    report::log_excluded("unresolved role(s)", &unresolved);

    if let Some(output) = &args.output {
        let resolved_specs: Vec<RoleSpec> = specs
            .iter()
            .filter(|spec| !unresolved.contains(&spec.role))
            .cloned()
            .collect();
        let renamed = rename_resolved(&frame, &resolved_specs)?;
        let output_delimiter =
            io_utils::resolve_output_delimiter(Some(output), args.output_delimiter, delimiter);
        renamed.write_csv(Some(output), output_delimiter)?;
        info!(
            "Wrote {} row(s) with {} renamed column(s) to {:?}",
            renamed.rows.len(),
            resolved_specs.len(),
            output
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn candidates(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn normalize_header_collapses_punctuation_runs() {
        assert_eq!(normalize_header("Health Region"), "health_region");
        assert_eq!(normalize_header("  Year -- ending (June)"), "year_ending_june");
        assert_eq!(normalize_header("estimate"), "estimate");
    }

    #[test]
    fn resolve_honours_candidate_priority_over_header_order() {
        let cols = headers(&["Region", "Health Region"]);
        // "health_region" is the first candidate, so it wins even though
        // "Region" appears earlier in the file.
        let got = resolve(&cols, "region", &candidates(&["health_region", "region"])).unwrap();
        assert_eq!(got, "Health Region");
    }

    #[test]
    fn resolve_is_deterministic() {
        let cols = headers(&["Year_To", "year"]);
        let cands = candidates(&["year", "year_to"]);
        let first = resolve(&cols, "year", &cands).unwrap();
        let second = resolve(&cols, "year", &cands).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "year");
    }

    #[test]
    fn resolve_fails_loudly_with_role_and_candidates() {
        let cols = headers(&["a", "b"]);
        let err = resolve(&cols, "rate", &candidates(&["estimate", "value"])).unwrap_err();
        match err {
            ReconcileError::SchemaResolution { role, candidates } => {
                assert_eq!(role, "rate");
                assert_eq!(candidates, vec!["estimate", "value"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rename_resolved_rewrites_matched_headers() {
        let mut frame = Frame::new(headers(&["Health Service Area", "Estimate"]));
        frame.rows.push(vec!["Northern".into(), "31.5".into()]);
        let specs = vec![
            RoleSpec {
                role: "region".into(),
                candidates: candidates(&["health_region", "health service area"]),
            },
            RoleSpec {
                role: "rate".into(),
                candidates: candidates(&["estimate"]),
            },
        ];
        let renamed = rename_resolved(&frame, &specs).unwrap();
        assert_eq!(renamed.headers, headers(&["region", "rate"]));
        assert_eq!(renamed.rows, frame.rows);
    }

    #[test]
    fn rename_resolved_ignores_columns_renamed_by_earlier_roles() {
        // The first role renames "Estimate" to "value"; the second role
        // lists "value" as a candidate. Resolution must see the original
        // headers only, so the second role fails instead of stealing the
        // freshly renamed column.
        let frame = Frame::new(headers(&["Estimate"]));
        let specs = vec![
            RoleSpec {
                role: "value".into(),
                candidates: candidates(&["estimate"]),
            },
            RoleSpec {
                role: "rate".into(),
                candidates: candidates(&["value"]),
            },
        ];
        let err = rename_resolved(&frame, &specs).unwrap_err();
        assert!(err.to_string().contains("no column found for role 'rate'"));
    }

    #[test]
    fn rename_resolved_rejects_roles_sharing_a_column() {
        let frame = Frame::new(headers(&["Estimate", "Year"]));
        let specs = vec![
            RoleSpec {
                role: "rate".into(),
                candidates: candidates(&["estimate"]),
            },
            RoleSpec {
                role: "value".into(),
                candidates: candidates(&["percent", "estimate"]),
            },
        ];
        let err = rename_resolved(&frame, &specs).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'rate'"));
        assert!(message.contains("'value'"));
        assert!(message.contains("'Estimate'"));
    }
}
