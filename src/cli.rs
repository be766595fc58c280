use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile join keys and merge heterogeneous CSV datasets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve semantic column roles against a file's headers
    Roles(RolesArgs),
    /// Canonicalize code/name key columns and filter rows
    Normalize(NormalizeArgs),
    /// Keep the most recent row per group
    Latest(LatestArgs),
    /// Left-join two files on a key column, reporting unmatched keys
    Join(JoinArgs),
    /// Group-by mean over numeric columns
    Aggregate(AggregateArgs),
    /// Run a YAML-described chain of stages
    Pipeline(PipelineArgs),
}

/// Failure policy for per-row data errors and duplicate join keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Abort on the first bad row or ambiguous key
    Strict,
    /// Exclude bad rows (reported) and keep the first of duplicate keys
    Lenient,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Strict
    }
}

#[derive(Debug, Args)]
pub struct RolesArgs {
    /// Input CSV/TSV/GeoJSON file ('-' for stdin CSV)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Restrict to these roles (defaults to all known roles)
    #[arg(short = 'r', long = "role", action = clap::ArgAction::Append)]
    pub roles: Vec<String>,
    /// YAML file of role candidate lists (overrides the built-ins)
    #[arg(long = "roles-file")]
    pub roles_file: Option<PathBuf>,
    /// Fail if any requested role cannot be resolved
    #[arg(long)]
    pub require: bool,
    /// Write a copy of the input with resolved columns renamed to role names
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct NormalizeArgs {
    /// Input CSV/TSV/GeoJSON file ('-' for stdin CSV)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Code column to zero-pad
    #[arg(long)]
    pub code: Option<String>,
    /// Zero-pad width for --code
    #[arg(long, default_value_t = 3)]
    pub width: usize,
    /// Write the padded code to this new column instead of in place
    #[arg(long)]
    pub into: Option<String>,
    /// Name column to canonicalize through an alias table
    #[arg(long)]
    pub name: Option<String>,
    /// Alias table: built-in name (health-regions, ethnicities) or YAML path
    #[arg(long)]
    pub aliases: Option<String>,
    /// Row filters such as `sex = All` or `indicator contains obese`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Failure policy for rows whose code cannot be coerced
    #[arg(long, value_enum, default_value = "lenient")]
    pub mode: RunMode,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct LatestArgs {
    /// Input CSV/TSV/GeoJSON file ('-' for stdin CSV)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Columns that identify a group, comma-separated
    #[arg(short = 'g', long = "group-by", value_delimiter = ',', required = true)]
    pub group_by: Vec<String>,
    /// Column holding the time period label
    #[arg(short = 't', long = "time-column")]
    pub time_column: String,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct JoinArgs {
    /// Left input file
    #[arg(long = "left")]
    pub left: PathBuf,
    /// Right input file
    #[arg(long = "right")]
    pub right: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Key column in the left file
    #[arg(long = "left-key")]
    pub left_key: String,
    /// Key column in the right file
    #[arg(long = "right-key")]
    pub right_key: String,
    /// Duplicate-key policy (strict fails, lenient keeps the first)
    #[arg(long, value_enum, default_value = "strict")]
    pub mode: RunMode,
    /// Zero-pad both key columns to this width before joining
    #[arg(long = "code-width")]
    pub code_width: Option<usize>,
    /// Alias table applied to both key columns before joining
    #[arg(long)]
    pub aliases: Option<String>,
    /// Also write unmatched left keys to this CSV file
    #[arg(long)]
    pub unmatched: Option<PathBuf>,
    /// CSV delimiter character for inputs
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to the left input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding for the left input file (defaults to utf-8)
    #[arg(long = "left-encoding")]
    pub left_encoding: Option<String>,
    /// Character encoding for the right input file (defaults to utf-8)
    #[arg(long = "right-encoding")]
    pub right_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct AggregateArgs {
    /// Input CSV/TSV/GeoJSON file ('-' for stdin CSV)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Columns that identify a group, comma-separated
    #[arg(short = 'g', long = "group-by", value_delimiter = ',', required = true)]
    pub group_by: Vec<String>,
    /// Numeric columns to average, comma-separated
    #[arg(short = 'v', long = "values", value_delimiter = ',', required = true)]
    pub values: Vec<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter to use for output (defaults to input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PipelineArgs {
    /// Pipeline YAML document
    #[arg(short = 'c', long = "config")]
    pub config: PathBuf,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
