//! Join-key normalization: zero-padded numeric codes and alias-mapped names.
//!
//! Territorial-authority codes arrive as `1`, `"001"`, or `1.0` depending on
//! which tool exported the file; all three must land on the same canonical
//! `"001"`. Free-text region names go through an ordered alias table where
//! the first matching rule wins, and unknown names pass through unchanged so
//! they stay visible downstream instead of vanishing.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    cli::RunMode,
    error::ReconcileError,
    frame::Frame,
};

/// Canonicalizes a numeric code to a fixed-width zero-padded string.
///
/// Already-padded strings re-parse to the same integer and re-pad to the
/// same output, so the function is idempotent.
pub fn normalize_code(raw: &str, width: usize) -> Result<String, ReconcileError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ReconcileError::KeyFormat {
            value: raw.to_string(),
            reason: "empty value".to_string(),
        });
    }
    let parsed = match trimmed.parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            let as_float: f64 = trimmed.parse().map_err(|_| ReconcileError::KeyFormat {
                value: raw.to_string(),
                reason: "not numeric".to_string(),
            })?;
            if !as_float.is_finite() {
                return Err(ReconcileError::KeyFormat {
                    value: raw.to_string(),
                    reason: "not a finite number".to_string(),
                });
            }
            if as_float.fract() != 0.0 {
                return Err(ReconcileError::KeyFormat {
                    value: raw.to_string(),
                    reason: "fractional code".to_string(),
                });
            }
            // `as i64` saturates; require an exact round-trip so codes
            // outside i64 (or past f64 integer precision) fail instead of
            // silently landing on a wrong key.
            let truncated = as_float as i64;
            if truncated as f64 != as_float || as_float >= i64::MAX as f64 {
                return Err(ReconcileError::KeyFormat {
                    value: raw.to_string(),
                    reason: "code out of integer range".to_string(),
                });
            }
            truncated
        }
    };
    Ok(format!("{parsed:0width$}"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasRule {
    /// Case-insensitive substring to look for in the raw name.
    pub contains: String,
    pub canonical: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AliasTable {
    pub rules: Vec<AliasRule>,
}

impl AliasTable {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Opening alias file {path:?}"))?;
        let table: AliasTable =
            serde_yaml::from_str(&raw).with_context(|| format!("Parsing alias YAML {path:?}"))?;
        Ok(table)
    }

    /// Built-in tables; `source` is either a built-in name or a YAML path.
    pub fn resolve_source(source: &str) -> Result<Self> {
        match source {
            "health-regions" => Ok(health_regions()),
            "ethnicities" => Ok(ethnicities()),
            other => Self::load(Path::new(other)),
        }
    }
}

/// Trims, then applies the first alias rule whose substring matches.
/// No match returns the trimmed input unchanged.
pub fn normalize_name(raw: &str, table: &AliasTable) -> String {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();
    for rule in &table.rules {
        if lowered.contains(&rule.contains.to_lowercase()) {
            return rule.canonical.clone();
        }
    }
    trimmed.to_string()
}

/// Collapses the long Te Whatu Ora region names to the short canonical
/// labels used in the health statistics extracts. Each canonical label also
/// matches itself, keeping normalization idempotent.
pub fn health_regions() -> AliasTable {
    fn rule(contains: &str, canonical: &str) -> AliasRule {
        AliasRule {
            contains: contains.to_string(),
            canonical: canonical.to_string(),
        }
    }
    AliasTable {
        rules: vec![
            rule("taitokerau", "Taitokerau"),
            rule("northern", "Taitokerau"),
            rule("manawa taki", "Te Manawa Taki"),
            rule("midland", "Te Manawa Taki"),
            rule("ikaroa", "Te Ikaroa"),
            rule("central", "Te Ikaroa"),
            rule("waipounamu", "Te Waipounamu"),
            rule("southern", "Te Waipounamu"),
        ],
    }
}

/// Collapses prioritised-ethnicity label variants to one canonical set.
pub fn ethnicities() -> AliasTable {
    fn rule(contains: &str, canonical: &str) -> AliasRule {
        AliasRule {
            contains: contains.to_string(),
            canonical: canonical.to_string(),
        }
    }
    AliasTable {
        rules: vec![
            rule("european", "European/Other"),
            rule("māori", "Māori"),
            rule("maori", "Māori"),
            rule("pacific", "Pacific"),
            rule("asian", "Asian"),
        ],
    }
}

/// Normalizes one code column across a frame.
///
/// In lenient mode, rows whose code cannot be coerced are excluded and their
/// raw values returned for reporting; strict mode fails on the first bad
/// row. When `into` is given the padded key lands in a new trailing column
/// and the source column is left as-is.
pub fn normalize_code_column(
    frame: &Frame,
    column: &str,
    width: usize,
    into: Option<&str>,
    mode: RunMode,
) -> Result<(Frame, Vec<String>)> {
    let idx = frame.require_column(column)?;
    let mut out = Frame::new(frame.headers.clone());
    if let Some(new_column) = into {
        out.headers.push(new_column.to_string());
    }
    let mut excluded = Vec::new();
    for (row_idx, row) in frame.rows.iter().enumerate() {
        match normalize_code(&row[idx], width) {
            Ok(code) => {
                let mut row = row.clone();
                match into {
                    Some(_) => row.push(code),
                    None => row[idx] = code,
                }
                out.rows.push(row);
            }
            Err(err) => match mode {
                RunMode::Strict => {
                    return Err(err).with_context(|| format!("Row {}", row_idx + 2));
                }
                RunMode::Lenient => excluded.push(row[idx].clone()),
            },
        }
    }
    Ok((out, excluded))
}

/// Normalizes one name column across a frame. Pass-through on unknown names
/// means this never excludes rows.
pub fn normalize_name_column(frame: &Frame, column: &str, table: &AliasTable) -> Result<Frame> {
    let idx = frame.require_column(column)?;
    let mut out = frame.clone();
    for row in &mut out.rows {
        row[idx] = normalize_name(&row[idx], table);
    }
    Ok(out)
}
