use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wdl_runner::cancel::cancellation;
use wdl_runner::config::AppConfig;
use wdl_runner::session::Session;
use wdl_runner::shutdown::cancel_on_shutdown;

#[derive(Parser)]
#[command(name = "wdl-runner", about = "Run WDL workflows on a Cromwell-style engine")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Override the engine base URI
    #[arg(long, global = true)]
    base_uri: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a workflow and track it to completion
    Run {
        /// Path to the .wdl source file
        wdl: PathBuf,

        /// Poll interval in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },
    /// Print the current status of a workflow
    Status { id: String },
    /// Request that a workflow be aborted
    Abort { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(base_uri) = cli.base_uri {
        config.engine.base_uri = base_uri;
    }
    if let Command::Run {
        poll_interval_ms: Some(interval_ms),
        ..
    } = &cli.command
    {
        config.polling.interval_ms = *interval_ms;
    }
    config.validate()?;

    tracing::info!(
        base_uri = %config.engine.base_uri,
        poll_interval_ms = config.polling.interval_ms,
        "Starting wdl-runner"
    );

    let session = Session::new(config)?;

    match cli.command {
        Command::Run { wdl, .. } => {
            let (source, signal) = cancellation();
            let mut shutdown = tokio::spawn(cancel_on_shutdown(source));

            let result = tokio::select! {
                result = session.run(&wdl, signal) => result,
                _ = &mut shutdown => {
                    tracing::warn!(wdl = %wdl.display(), "Exiting before the workflow settled");
                    return Ok(ExitCode::from(130));
                }
            };
            shutdown.abort();

            match result {
                Ok(outcome) => {
                    println!("{} {}", outcome.status, outcome.id);
                    Ok(if outcome.succeeded() {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    })
                }
                Err(e) => {
                    tracing::error!(error = %e, "Workflow run failed");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Status { id } => {
            let response = session.status(&id).await?;
            println!("{} {}", response.status, response.id);
            Ok(ExitCode::SUCCESS)
        }
        Command::Abort { id } => {
            let response = session.abort(&id).await?;
            println!("{} {}", response.status, response.id);
            Ok(ExitCode::SUCCESS)
        }
    }
}
