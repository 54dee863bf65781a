//! # cfw CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cfw_cli::convert::{run_convert, ConvertArgs};
use cfw_cli::template::{run_template, run_templates, TemplateArgs, TemplatesArgs};
use cfw_cli::validate::{run_validate, ValidateArgs};

/// Compliance framework tooling.
///
/// Validates framework files, converts workbooks to JSON, and exports the
/// import template and bundled framework library.
#[derive(Parser, Debug)]
#[command(name = "cfw", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a framework file (JSON or .xlsx).
    Validate(ValidateArgs),

    /// Convert a two-sheet workbook to framework JSON.
    Convert(ConvertArgs),

    /// Write the blank .xlsx import template.
    Template(TemplateArgs),

    /// Browse the bundled template library.
    Templates(TemplatesArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
        Commands::Convert(args) => run_convert(&args),
        Commands::Template(args) => run_template(&args),
        Commands::Templates(args) => run_templates(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use cfw_cli::template::TemplatesCommand;

    #[test]
    fn cli_parse_validate() {
        let cli = Cli::try_parse_from(["cfw", "validate", "fw.json"]).unwrap();
        match cli.command {
            Commands::Validate(args) => assert_eq!(args.path, PathBuf::from("fw.json")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_parse_convert_with_out() {
        let cli = Cli::try_parse_from(["cfw", "convert", "in.xlsx", "--out", "out.json"]).unwrap();
        match cli.command {
            Commands::Convert(args) => {
                assert_eq!(args.workbook, PathBuf::from("in.xlsx"));
                assert_eq!(args.out, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_parse_template_requires_out() {
        assert!(Cli::try_parse_from(["cfw", "template"]).is_err());
        assert!(Cli::try_parse_from(["cfw", "template", "--out", "t.xlsx"]).is_ok());
    }

    #[test]
    fn cli_parse_templates_show() {
        let cli = Cli::try_parse_from(["cfw", "-v", "templates", "show", "dora"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Templates(args) => {
                assert!(matches!(args.command, TemplatesCommand::Show { ref id } if id == "dora"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["cfw", "lock"]).is_err());
    }
}
