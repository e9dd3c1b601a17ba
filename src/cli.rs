//! Command-line interface for caseflow, built on clap.
//!
//! [`Cli`] holds the subcommands ([`Command`]) and the global flags
//! (`--config`, `--verbose`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Pull-based case pipeline: classification, extraction, processing.
#[derive(Debug, Parser)]
#[command(name = "caseflow", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the engine configuration file.
    #[arg(long, global = true, default_value = caseflow::config::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pipeline engine until Ctrl-C.
    Run {
        /// JSON file with cases to create before starting.
        #[arg(long)]
        seed: Option<PathBuf>,
    },

    /// Show the stage order and what each stage does.
    Stages,

    /// Show how many cases wait in each stage.
    Queue,

    /// Run one cycle of a stage processor now.
    Trigger {
        /// Stage the processor reports as, e.g. `classification` or `data_extraction`.
        stage: String,
    },

    /// Move a case one stage forward, skipping its processing.
    Advance {
        /// Case id.
        id: String,
    },

    /// Manage the classification pipeline configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the latest version.
    Show,

    /// List published versions, newest first.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Publish a JSON draft as the next version.
    Publish {
        /// File with `lob_prompt`, `process_prompt`, `lob_process_pairs` and optional `llm_params`.
        file: PathBuf,
    },

    /// Delete every published version.
    Reset,
}
