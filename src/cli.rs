// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `synthtrack`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "synthtrack",
    version,
    about = "Submit synthetic-data generation jobs and track them to completion.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Synthtrack.toml` in the current working directory; built-in
    /// defaults are used when that file does not exist.
    #[arg(long, value_name = "PATH", default_value = "Synthtrack.toml")]
    pub config: String,

    /// Override `[backend].base_url`.
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SYNTHTRACK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Submit a generation job and track it.
    Submit {
        /// Name of the uploaded source file to generate from.
        #[arg(long, value_name = "NAME")]
        file: String,

        /// Number of rows to generate.
        #[arg(long, value_name = "N")]
        rows: u64,

        /// Columns to include (comma separated); all when omitted.
        #[arg(long, value_name = "COLS", value_delimiter = ',')]
        columns: Vec<String>,

        /// Print the task id and exit without tracking.
        #[arg(long)]
        detach: bool,
    },

    /// Track one or more already submitted tasks.
    Track {
        #[arg(required = true, value_name = "TASK_ID")]
        task_ids: Vec<String>,

        /// Display name used until the backend reports one.
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },

    /// Show the failed-task history.
    Failed {
        #[arg(long, value_name = "N")]
        limit: Option<u32>,

        #[arg(long, value_name = "N", default_value_t = 0)]
        offset: u32,

        /// Also list entries already resolved by a successful retry.
        #[arg(long)]
        all: bool,
    },

    /// Retry a failed task and track the new task.
    Retry {
        #[arg(value_name = "FAILED_TASK_ID")]
        failed_task_id: String,

        /// Print the new task id and exit without tracking.
        #[arg(long)]
        detach: bool,
    },

    /// Ask the backend to cancel a task.
    Cancel {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },

    /// Parse + validate the config and print the effective settings.
    CheckConfig,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
