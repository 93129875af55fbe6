//! Command-line interface for chitti.
//!
//! This module provides the CLI structure and the report formatting used by
//! the `chitti` binary.

mod commands;
mod report;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::logging::{LogFormat, Verbosity};

pub use commands::{AuditCommand, ConfigCommand, CycleCommand, RunCommand, StatusCommand};
pub use report::{format_audit, format_cycle, format_summary};

/// chitti - A perception loop that forgets what it sees
///
/// Captures a camera frame into RAM, describes it with a vision-language
/// model, speaks the description, deletes the frame and proves that nothing
/// was written to persistent storage.
#[derive(Debug, Parser)]
#[command(name = "chitti")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit log lines as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one perception cycle
    Cycle(CycleCommand),

    /// Run perception cycles until stopped
    Run(RunCommand),

    /// Purge the frame slot and certify zero retention
    Audit(AuditCommand),

    /// Show device, storage and service status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }

    /// Get the log line format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        if self.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}
