use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Append rows into a styled xlsx sheet and re-sort it",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Append source rows to the target sheet, keeping its column styles and formulas, then sort
    Merge(MergeArgs),
    /// List the target's column templates (and optionally the source headers)
    Columns(ColumnsArgs),
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Workbook supplying the new rows
    #[arg(short = 's', long = "source")]
    pub source: PathBuf,
    /// Workbook to append to; rewritten in place unless --output is given
    #[arg(short = 't', long = "target")]
    pub target: PathBuf,
    /// Write the result here instead of overwriting the target
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Column mapping `TARGET=SOURCE`; an empty SOURCE leaves the column empty
    #[arg(long = "map", value_parser = parse_mapping_pair, action = clap::ArgAction::Append)]
    pub maps: Vec<(String, String)>,
    /// Sort keys of the form `column[:asc|desc]` (at most two)
    #[arg(long = "sort", action = clap::ArgAction::Append)]
    pub sort: Vec<String>,
    /// YAML file with `mappings` and `sort` entries
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Never prompt; unmapped columns take exact-name matches
    #[arg(short = 'y', long = "non-interactive")]
    pub non_interactive: bool,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Workbook whose header and template row are listed
    #[arg(short = 't', long = "target")]
    pub target: PathBuf,
    /// Optional source workbook whose headers are listed as well
    #[arg(short = 's', long = "source")]
    pub source: Option<PathBuf>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Parses a `TARGET=SOURCE` pair. An empty source leaves the target unset.
pub fn parse_mapping_pair(value: &str) -> Result<(String, String), String> {
    let (target, source) = value
        .split_once('=')
        .ok_or_else(|| format!("Mapping '{value}' must look like TARGET=SOURCE"))?;
    let target = target.trim();
    if target.is_empty() {
        return Err(format!("Mapping '{value}' is missing a target column"));
    }
    Ok((target.to_string(), source.trim().to_string()))
}
