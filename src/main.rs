use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

mod cli;
mod commands;

use metrics_probe::init_tracing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let args = cli::Cli::parse();

    init_tracing();

    // Dispatch to appropriate command handler
    let result = match args.command {
        cli::Commands::Config { action } => {
            match action {
                cli::ConfigCommands::Show => commands::config::show(&args.config)?,
                cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
            }
            return Ok(ExitCode::SUCCESS);
        }
        cli::Commands::Kube(probe) => commands::kube::execute(&args.config, probe).await,
        cli::Commands::EtcdMetrics(probe) => {
            commands::etcd_metrics::execute(&args.config, probe).await
        }
        cli::Commands::EtcdStats(probe) => {
            commands::etcd_stats::execute(&args.config, probe).await
        }
    };

    Ok(commands::report(result))
}
