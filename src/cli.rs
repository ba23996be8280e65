use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Profile delimited files and bulk-load them into tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Profile a delimited file and report the inferred column types
    Probe(ProbeArgs),
    /// Profile a file and emit the full bulk-load SQL script
    Load(LoadArgs),
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input file to profile
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Write the resolved profile to this JSON file
    #[arg(short, long)]
    pub meta: Option<PathBuf>,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long, default_value_t = 10)]
    pub sample_rows: usize,
    /// Field separator (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Type overrides of the form `column=type`
    #[arg(long = "hint", action = clap::ArgAction::Append)]
    pub hints: Vec<String>,
    /// Longest string still classified as `string` rather than `text`
    #[arg(long, default_value_t = 255)]
    pub short_string_limit: usize,
    /// Classify every non-blank string as `text` regardless of length
    #[arg(long)]
    pub text_only: bool,
    /// Infer date-only values as `date` instead of `datetime`
    #[arg(long)]
    pub infer_dates: bool,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// File to load, resolved against the configured folder; the default
    /// extension is appended when none is given
    #[arg(short = 'i', long = "input")]
    pub file: String,
    /// Target table name (derived from the file name if omitted)
    #[arg(short, long)]
    pub table: Option<String>,
    /// YAML loader configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Write the generated SQL script here (stdout if omitted)
    #[arg(short = 'o', long = "script")]
    pub script: Option<PathBuf>,
    /// Type overrides of the form `column=type`
    #[arg(long = "hint", action = clap::ArgAction::Append)]
    pub hints: Vec<String>,
    /// Field separator (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long)]
    pub sample_rows: Option<usize>,
    /// Base folder for relative input files
    #[arg(long)]
    pub folder: Option<PathBuf>,
    /// Prefix applied to the target table name (empty disables prefixing)
    #[arg(long)]
    pub table_prefix: Option<String>,
    /// Connection identifier to run the load under
    #[arg(long)]
    pub connection: Option<String>,
    /// Use LOAD DATA LOCAL INFILE when the server cannot read the file
    #[arg(long)]
    pub local: bool,
    /// Skip the post-load normalization stage
    #[arg(long = "no-normalize")]
    pub no_normalize: bool,
    /// Infer date-only values as `date` instead of `datetime`
    #[arg(long)]
    pub infer_dates: bool,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Append a markdown load report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
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
