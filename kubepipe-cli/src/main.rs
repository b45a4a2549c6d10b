//! Kubepipe CLI
//!
//! Command-line entry point for running pipeline files against a cluster.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};

#[derive(Parser)]
#[command(name = "kubepipe")]
#[command(about = "Run container pipelines on Kubernetes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    handle_command(cli.command).await
}
