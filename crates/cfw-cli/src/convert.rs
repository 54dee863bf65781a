//! # Convert Subcommand
//!
//! Reads a two-sheet `.xlsx` workbook and writes the equivalent framework
//! JSON, ready for editing and `POST /import`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use cfw_core::ingest::{workbook, xlsx};
use cfw_core::validate;

/// Arguments for the convert subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Workbook with "Framework Info" and "Structure" sheets.
    pub workbook: PathBuf,

    /// Output path. Prints to stdout when omitted.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Execute the convert subcommand.
pub fn run_convert(args: &ConvertArgs) -> Result<u8> {
    convert(&args.workbook, args.out.as_deref())
}

pub fn convert(input: &Path, out: Option<&Path>) -> Result<u8> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let data = xlsx::read_workbook(&bytes).with_context(|| format!("parsing {}", input.display()))?;
    let framework = workbook::assemble(&data);

    if let Err(issues) = validate(&framework) {
        tracing::warn!(issues = issues.len(), "converted framework will not pass validation as-is");
        for issue in &issues {
            eprintln!("  - {issue}");
        }
    }

    let json = serde_json::to_string_pretty(&framework)?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n")).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(out = %path.display(), items = framework.leaf_count(), "workbook converted");
        }
        None => println!("{json}"),
    }
    Ok(0)
}
