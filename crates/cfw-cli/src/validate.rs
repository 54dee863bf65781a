//! # Validate Subcommand
//!
//! Runs a framework file through the same normalizer and structural
//! validator the service uses, and reports every issue at once.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use cfw_core::{normalize, validate, FrameworkSource};

/// Arguments for the validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Framework file: `.json` or `.xlsx`.
    pub path: PathBuf,
}

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    validate_file(&args.path)
}

pub fn validate_file(path: &Path) -> Result<u8> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    let normalized = if crate::is_workbook(path) {
        normalize(FrameworkSource::Xlsx(&bytes))
    } else {
        let text = std::str::from_utf8(&bytes).with_context(|| format!("{} is not UTF-8", path.display()))?;
        normalize(FrameworkSource::Json(text))
    };

    let framework = match normalized {
        Ok(normalized) => normalized.framework,
        Err(e) => {
            println!("FAIL {}: {e}", path.display());
            return Ok(1);
        }
    };

    match validate(&framework) {
        Ok(()) => {
            let (categories, controls, subs) = framework.level_counts();
            println!(
                "OK   {}: \"{}\" ({}) {categories} categories, {controls} controls, {subs} sub-controls, {} trackable items",
                path.display(),
                framework.name.trim(),
                framework.hierarchy.kind,
                framework.leaf_count()
            );
            Ok(0)
        }
        Err(issues) => {
            println!("FAIL {}: {} issue(s)", path.display(), issues.len());
            for issue in &issues {
                println!("  - {issue}");
            }
            Ok(1)
        }
    }
}
