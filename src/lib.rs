pub mod commands;
pub mod config;
pub mod pipeline;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::ConfigOverrides;

#[derive(Parser)]
#[command(name = "risklens", version, about = "Personal-information leak risk analysis")]
struct Cli {
    /// Completion endpoint base URL (overrides RISKLENS_ENDPOINT_URL)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Model name (overrides RISKLENS_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Per-call timeout in seconds (overrides RISKLENS_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a JSON array of content items and print the combined report
    Analyze {
        /// Path to the items file
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Send items as-is, without filtering or deduplication
        #[arg(long)]
        raw: bool,
    },
    /// Verify the endpoint, API key and model
    Check,
}

pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(dispatch(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<(), String> {
    let overrides = ConfigOverrides {
        endpoint_url: cli.endpoint,
        model_name: cli.model,
        timeout_secs: cli.timeout,
    };

    match cli.command {
        Commands::Analyze { input, output, raw } => {
            let report = commands::analyze_file(&input, &overrides, raw).await?;
            let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
            match output {
                Some(path) => tokio::fs::write(&path, json)
                    .await
                    .map_err(|e| format!("cannot write {}: {e}", path.display())),
                None => {
                    println!("{json}");
                    Ok(())
                }
            }
        }
        Commands::Check => {
            let message = commands::check_connection(&overrides).await?;
            println!("{message}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_analyze_with_global_overrides() {
        let cli = Cli::try_parse_from([
            "risklens", "analyze", "posts.json", "--raw", "--model", "m1", "-o", "out.json",
        ])
        .unwrap();
        assert_eq!(cli.model.as_deref(), Some("m1"));
        match cli.command {
            Commands::Analyze { input, output, raw } => {
                assert_eq!(input, PathBuf::from("posts.json"));
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert!(raw);
            }
            Commands::Check => panic!("expected analyze"),
        }
    }
}
