//! k6-tester
//!
//! Renders k6 scripts and runs them, either as an MCP server over stdio or
//! directly from the command line. The k6 executable can be overridden
//! with `K6_TESTER_CLI_PATH`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use k6_tester::{
    build_script, mcp, Config, ExecutionOutcome, LoadTestConfig, RunRequest, Runner, SystemLauncher,
};

#[derive(Parser, Debug)]
#[command(name = "k6-tester")]
#[command(about = "Generate and run k6 load-test scripts")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the k6 tools over MCP
    Serve {
        /// Run in stdio mode (for MCP clients)
        #[arg(long)]
        stdio: bool,
    },

    /// Print the script rendered from a JSON load-test config
    Script {
        /// Path to the load-test config (JSON)
        config: PathBuf,

        /// Print the full result (script, suggested file name, command) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a script with k6 and stream its output to stdout
    Run {
        /// Script to run
        #[arg(required_unless_present = "config", conflicts_with = "config")]
        script: Option<PathBuf>,

        /// Render the script from this JSON load-test config instead
        #[arg(long)]
        config: Option<PathBuf>,

        /// File name hint for the temporary script
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging (stderr so stdout is free for MCP protocol and run output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    info!(executable = %config.executable, temp_dir = %config.temp_dir.display(), "Loaded configuration");

    match args.command {
        Command::Serve { stdio } => {
            if !stdio {
                anyhow::bail!("Only --stdio mode is currently supported");
            }
            mcp::serve_stdio(Runner::new(SystemLauncher::new(), config)).await?;
        }
        Command::Script { config: path, json } => {
            let load_test = read_load_test(&path)?;
            load_test.validate()?;
            let result = build_script(&load_test);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", result.script);
            }
        }
        Command::Run {
            script,
            config: config_path,
            name,
        } => {
            let request = match (script, config_path) {
                (Some(path), _) => RunRequest {
                    file_name: name.or_else(|| file_name_of(&path)),
                    script: Some(
                        tokio::fs::read_to_string(&path)
                            .await
                            .with_context(|| format!("Failed to read script {}", path.display()))?,
                    ),
                    config: None,
                },
                (None, Some(path)) => RunRequest {
                    config: Some(read_load_test(&path)?),
                    script: None,
                    file_name: name,
                },
                (None, None) => RunRequest::default(),
            };

            let outcome = run(Runner::new(SystemLauncher::new(), config), &request).await?;
            return Ok(ExitCode::from(exit_status(&outcome)));
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Stream one run to stdout.
async fn run(runner: Runner<SystemLauncher>, request: &RunRequest) -> Result<ExecutionOutcome> {
    let (script, hint) = request.resolve()?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_ctrl_c.cancel();
        }
    });

    Ok(runner
        .run(&script, hint.as_deref(), tokio::io::stdout(), &cancel)
        .await?)
}

/// Process status for a finished run.
///
/// k6's own code when it fits in a status byte, 130 after Ctrl-C, and 1
/// for everything else, including signal exits.
fn exit_status(outcome: &ExecutionOutcome) -> u8 {
    match outcome {
        ExecutionOutcome::Exited(code) => u8::try_from(*code).unwrap_or(1),
        ExecutionOutcome::Cancelled => 130,
        _ => 1,
    }
}

fn read_load_test(path: &Path) -> Result<LoadTestConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse config {}", path.display()))
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}
