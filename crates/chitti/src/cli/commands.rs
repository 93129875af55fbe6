//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Single-cycle command arguments.
#[derive(Debug, Args)]
pub struct CycleCommand {
    /// Output the cycle record as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Continuous-mode command arguments.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Stop after this many recorded cycles (overrides `cycle.max_cycles`; 0 = unlimited)
    #[arg(short = 'n', long, value_name = "N")]
    pub max_cycles: Option<u64>,

    /// Pause between cycles in milliseconds (overrides `cycle.delay_ms`)
    #[arg(short, long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Print each cycle record as a JSON line
    #[arg(short, long)]
    pub json: bool,
}

/// Standalone audit command arguments.
#[derive(Debug, Args)]
pub struct AuditCommand {
    /// Output the audit record as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
