//! # Template Subcommands
//!
//! `cfw template` writes the blank import workbook; `cfw templates` browses
//! the bundled framework library.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use cfw_core::ingest::{templates, xlsx};

/// Arguments for the template subcommand.
#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Where to write the `.xlsx` file.
    #[arg(long)]
    pub out: PathBuf,
}

/// Template library subcommand arguments.
#[derive(Args, Debug)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    pub command: TemplatesCommand,
}

#[derive(Subcommand, Debug)]
pub enum TemplatesCommand {
    /// List bundled templates.
    List,
    /// Print a template's framework JSON.
    Show {
        /// Template ID (see `cfw templates list`).
        id: String,
    },
}

/// Execute the template subcommand.
pub fn run_template(args: &TemplateArgs) -> Result<u8> {
    write_template(&args.out)
}

pub fn write_template(out: &Path) -> Result<u8> {
    let bytes = xlsx::template_xlsx()?;
    std::fs::write(out, bytes).with_context(|| format!("writing {}", out.display()))?;
    println!("Wrote import template to {}", out.display());
    Ok(0)
}

/// Execute the templates subcommand.
pub fn run_templates(args: &TemplatesArgs) -> Result<u8> {
    match &args.command {
        TemplatesCommand::List => {
            for t in templates::list() {
                println!("  {:<16} {}", t.id, t.title);
            }
            println!();
            println!("Total: {} templates", templates::list().len());
            Ok(0)
        }
        TemplatesCommand::Show { id } => match templates::find(id) {
            Some(template) => {
                println!("{}", template.source.trim_end());
                Ok(0)
            }
            None => {
                let available: Vec<&str> = templates::list().iter().map(|t| t.id).collect();
                anyhow::bail!("unknown template '{id}'. Available: {}", available.join(", "))
            }
        },
    }
}
