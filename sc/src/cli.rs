//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// SatClient - SatEval pipeline client
#[derive(Debug, Parser)]
#[command(
    name = "sc",
    about = "Build, validate and run SatEval pipelines",
    version,
    after_help = "Pipeline files are YAML or JSON lists of steps:\n\n  \
                  - module: filter\n    \
                    method: blur\n    \
                    parameters:\n      \
                      - { field: radius, type: int, value: \"5\" }"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Backend base URL (overrides config and SATCLIENT_BASE_URL)
    #[arg(short = 'u', long = "base-url", global = true)]
    pub base_url: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the backend is up
    Status,

    /// List dataset directories
    Dirs {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List run ids
    Runs,

    /// List the image fields evaluation results refer to
    Fields,

    /// List available modules
    Modules,

    /// List the methods of a module
    Methods {
        /// Module name
        module: String,
    },

    /// Show evaluation results for a run
    Results {
        /// Run id
        run_id: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List evaluation ids for a run
    Evals {
        /// Run id
        run_id: String,
    },

    /// Fetch an image by its backend path
    Image {
        /// Image path on the backend
        path: String,

        /// Write the base64 payload to this file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the backend's config template
    Template {
        /// Show the pipeline template instead of the single-step one
        #[arg(short, long)]
        pipeline: bool,
    },

    /// Coerce a pipeline file and print the request body (no network)
    Build {
        /// Pipeline file (YAML or JSON)
        file: PathBuf,
    },

    /// Build a pipeline and have the backend validate it
    Validate {
        /// Pipeline file (YAML or JSON)
        file: PathBuf,

        /// Also validate each step on its own
        #[arg(short, long)]
        each: bool,
    },

    /// Build, validate and run a pipeline, streaming its output
    Run {
        /// Pipeline file (YAML or JSON)
        file: PathBuf,

        /// Run id (generated from the file name if omitted)
        #[arg(short, long)]
        run_id: Option<String>,

        /// Submit without remote validation
        #[arg(long)]
        skip_validation: bool,

        /// Print raw chunks instead of decoded events
        #[arg(long)]
        raw: bool,
    },
}

/// Output format for listing commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text, json", s)),
        }
    }
}
