use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ncx-inspect", about = "Consistency checks for partitioned collection indexes", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging on stderr
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress all logging
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a TOML inspector config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report records stored under variables that are not dominant collection-wide
    Misplaced {
        /// Root index file of the collection
        root: PathBuf,

        /// Dominance threshold; a variable is dominant when its total exceeds it
        #[arg(long)]
        threshold: Option<u64>,

        /// List at most this many records per misplaced variable
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_records: Option<u64>,

        /// Report misplaced counts without listing records
        #[arg(long)]
        counts_only: bool,
    },

    /// Summarize the datasets, groups and files of one index
    Summary {
        /// Index file to summarize
        index: PathBuf,

        /// Also list every cell of this variable's record arrays
        #[arg(long, value_name = "VARIABLE")]
        records: Option<String>,
    },

    /// Count duplicate message references in every leaf
    Duplicates {
        /// Root index file of the collection
        root: PathBuf,
    },

    /// Write the effective configuration as TOML
    WriteConfig {
        /// Destination file
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
