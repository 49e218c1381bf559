//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scripted scenario against a logging transport and print the final state
    Demo {
        /// Seed for generated names and addresses
        #[arg(short, long)]
        seed: Option<u64>,
        /// Print the snapshot on a single line
        #[arg(long)]
        compact: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}
