use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use passage_cli::cli::commands::Commands;
use passage_cli::cli::{info, login, plan, CliArgs};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_tracing(&args.log_level);

    match run(&args).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run(args: &CliArgs) -> Result<i32> {
    match &args.command {
        Commands::Login(login_args) => login::cmd_login(login_args, &args.output).await,
        Commands::CheckPlan(check_args) => plan::cmd_check_plan(check_args),
        Commands::Info => {
            info::cmd_info();
            Ok(0)
        }
    }
}

fn init_tracing(log_level: &str) {
    // RUST_LOG wins over the flag so per-module filters keep working.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
