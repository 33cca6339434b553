//! cluefin-xbrl CLI - parse DART XBRL filings and print their statements

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use cluefin_xbrl::{
    statement_to_dicts_with, ParseOptions, ParsedDocument, Parser, ValueScaling,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// XBRL parser and financial statement projector for DART filings
#[derive(ClapParser)]
#[command(name = "cluefin-xbrl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a filing (instance file or filing directory)
    Parse {
        input: PathBuf,

        /// Show statistics
        #[arg(short, long)]
        stats: bool,

        /// Drop unresolvable linkbase locators instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Print the financial statements as JSON rows
    Statements {
        input: PathBuf,

        /// Label languages in preference order
        #[arg(short, long, value_delimiter = ',', default_value = "ko,en")]
        lang: Vec<String>,

        /// Drop unresolvable linkbase locators instead of failing
        #[arg(long)]
        lenient: bool,

        /// Round values to their reported decimals
        #[arg(long)]
        rounded: bool,
    },

    /// Print the concept dictionary as JSON
    Taxonomy {
        input: PathBuf,

        #[arg(long)]
        lenient: bool,
    },
}

fn parse(input: &Path, options: ParseOptions) -> Result<ParsedDocument> {
    let parser = Parser::new().with_options(options);
    let doc = if input.is_dir() {
        parser.parse_directory(input)
    } else {
        parser.parse_file(input)
    };
    doc.with_context(|| format!("Failed to parse {}", input.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            input,
            stats,
            lenient,
        } => {
            let start = Instant::now();
            let doc = parse(&input, ParseOptions::default().with_lenient_locators(lenient))?;
            let elapsed = start.elapsed();

            println!("{} {}", "✓".green().bold(), input.display());
            println!("  Facts: {}", doc.instance.facts.len());
            println!("  Contexts: {}", doc.instance.contexts.len());
            println!("  Units: {}", doc.instance.units.len());
            println!("  Concepts: {}", doc.taxonomy.len());
            println!("  Presentation roles: {}", doc.linkbases.presentation.len());

            if !doc.warnings.is_empty() {
                println!("  {} {}", "Warnings:".yellow(), doc.warnings.len());
                for warning in doc.warnings.iter().take(5) {
                    println!("  {} {}", "WARN:".yellow(), warning);
                }
                if doc.warnings.len() > 5 {
                    println!("  ... and {} more warnings", doc.warnings.len() - 5);
                }
            }

            if stats {
                println!("  Time: {:.2}ms", elapsed.as_secs_f64() * 1000.0);
                println!(
                    "  Throughput: {:.0} facts/sec",
                    doc.instance.facts.len() as f64 / elapsed.as_secs_f64()
                );
            }
        }

        Commands::Statements {
            input,
            lang,
            lenient,
            rounded,
        } => {
            let options = ParseOptions::default()
                .with_lenient_locators(lenient)
                .with_preferred_languages(lang);
            let doc = parse(&input, options)?;
            let statements = doc.financial_statements();
            let scaling = if rounded {
                ValueScaling::Decimals
            } else {
                ValueScaling::None
            };

            let output: Vec<serde_json::Value> = statements
                .iter()
                .map(|statement| {
                    serde_json::json!({
                        "statement_type": statement.statement_type,
                        "scope": statement.scope,
                        "role": statement.role,
                        "title": statement.title,
                        "reporting_period": statement.reporting_period,
                        "comparative_periods": statement.comparative_periods,
                        "rows": statement_to_dicts_with(statement, scaling),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Taxonomy { input, lenient } => {
            let doc = parse(&input, ParseOptions::default().with_lenient_locators(lenient))?;
            println!("{}", serde_json::to_string_pretty(&doc.taxonomy_info())?);
        }
    }

    Ok(())
}
