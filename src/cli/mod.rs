pub mod commands;
pub mod info;
pub mod login;
pub mod output;
pub mod plan;

use clap::Parser;

use commands::Commands;
use output::OutputFormat;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Output format
    #[arg(short, long, default_value = "human")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}
