use clap::{Parser, Subcommand};
use std::path::PathBuf;

use segforge::logging::LogFormat;

#[derive(Parser)]
#[command(name = "segforge")]
#[command(author, version, about = "Parallel segment-based video transcoder")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Also append logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcode a single file
    Run {
        /// Input file to transcode
        #[arg(required = true)]
        input: PathBuf,
    },

    /// Transcode every matching file under a directory
    Batch {
        /// Directory to scan (defaults to batch.root from the config)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Probe a media file and show the segment plan
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
