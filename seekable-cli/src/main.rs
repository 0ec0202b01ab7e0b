//! Seekable CLI - Command-line interface
//!
//! Inspects and extracts packets from local or remote media files.

mod commands;

use clap::Parser;
use seekable_core::tracing_setup::{LogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "seekable")]
#[command(about = "Inspect and demux media over seekable byte sources")]
struct Cli {
    /// Diagnostic output level
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Working buffer size in bytes for the byte-source adapter
    #[arg(long, global = true)]
    buffer_size: Option<usize>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level)?;

    commands::handle_command(cli.command, cli.buffer_size).await
}
