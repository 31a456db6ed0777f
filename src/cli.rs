//! Command line interface definition

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::infrastructure::SheetVariant;

#[derive(Parser, Debug)]
#[command(name = "enquiry-sync")]
#[command(about = "Scrapes the Motorist back office into a local SQLite dataset")]
#[command(version)]
pub struct Cli {
    /// Path to the config file (defaults to the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging (use -v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one sync pass over every target
    Run {
        /// Also write the run report as JSON to this file
        #[arg(long, value_name = "FILE")]
        report_json: Option<PathBuf>,
    },

    /// Create the config file and the dataset schema, then exit
    Init,

    /// Show dataset statistics and sync progress
    Status,

    /// Export one sheet as CSV
    Export {
        /// Sheet name, e.g. "consignment New" or "Week 2024-03-18"
        sheet: String,

        /// Which sheet variant to read
        #[arg(long, value_enum, default_value = "filtered")]
        variant: VariantArg,

        /// Output file (stdout when omitted)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

/// Sheet variant selector for `export`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantArg {
    Raw,
    Filtered,
}

impl From<VariantArg> for SheetVariant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::Raw => SheetVariant::Raw,
            VariantArg::Filtered => SheetVariant::Filtered,
        }
    }
}
