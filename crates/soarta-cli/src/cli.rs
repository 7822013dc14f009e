//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "soarta")]
#[command(about = "Translate Soar production rules into UPPAAL timed automata")]
#[command(version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Translate a Soar rule file into an UPPAAL model
    Translate {
        /// Path to the .soar rule file
        input: PathBuf,

        /// Output model path (default: the input with an .xml extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rule firings allowed per scheduler wave
        #[arg(long, default_value_t = 10)]
        max_firings: u32,

        /// Also write the verifier queries to this .q file
        #[arg(long)]
        queries: Option<PathBuf>,

        /// Leave verifier queries out of the model
        #[arg(long, conflicts_with = "queries")]
        no_queries: bool,
    },

    /// Print the sizing report of a Soar rule file
    Analyze {
        /// Path to the .soar rule file
        input: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ReportFormat {
    Text,
    Json,
}
