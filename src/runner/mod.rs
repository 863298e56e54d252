//! Run orchestration.
//!
//! A run materializes the script, starts `k6 run <file>`, drains stdout and
//! stderr concurrently into the caller's sink while waiting for exit, and
//! finishes with exactly one terminal status line. The temp file and the
//! process handle are released on every path.

pub mod pump;
pub mod sink;
pub mod temp_script;

pub use pump::Channel;
pub use sink::LineSink;
pub use temp_script::TempScript;

use std::io;

use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::launcher::{LaunchError, LaunchSpec, ProcessHandle, ProcessLauncher};
use pump::pump_optional;

/// Rejections raised before any resource is acquired.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("Script cannot be null or whitespace.")]
    BlankScript,
}

/// How a run ended. Determines the terminal line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Both channels drained and the process exited with this code.
    Exited(i32),
    /// The OS refused to start the process.
    LaunchFailed,
    /// The executable could not be found.
    ExecutableNotFound,
    /// The caller cancelled the run.
    Cancelled,
    /// Anything else went wrong.
    Failed(String),
}

impl ExecutionOutcome {
    /// The status line that ends the stream.
    pub fn terminal_line(&self) -> String {
        match self {
            Self::Exited(code) => format!("[exit] k6 exited with code {code}."),
            Self::LaunchFailed => "[error] Failed to start k6 process.".into(),
            Self::ExecutableNotFound => {
                "[error] k6 executable not found in PATH. Install k6 to enable running scripts."
                    .into()
            }
            Self::Cancelled => "[cancelled] Execution cancelled.".into(),
            Self::Failed(message) => format!("[error] {message}"),
        }
    }

    /// Whether k6 ran to completion with a zero exit code.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

/// Executes k6 scripts and streams their output.
#[derive(Debug, Clone)]
pub struct Runner<L> {
    launcher: L,
    config: Config,
}

impl<L: ProcessLauncher> Runner<L> {
    /// Create a runner over the given launcher.
    pub const fn new(launcher: L, config: Config) -> Self {
        Self { launcher, config }
    }

    /// Configuration in use.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Launcher in use.
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Run `script` and stream its output into `output`.
    ///
    /// Every line written is newline-terminated: `[out] ...` and `[err] ...`
    /// for process output, then exactly one terminal line. Only a blank
    /// script is reported as an `Err`; it is rejected before any file or
    /// process is created and nothing is written.
    #[instrument(skip(self, script, output, cancel), fields(script_len = script.len()))]
    pub async fn run<W>(
        &self,
        script: &str,
        file_name_hint: Option<&str>,
        output: W,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, RunError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if script.trim().is_empty() {
            return Err(RunError::BlankScript);
        }

        let sink = LineSink::new(output);
        let outcome = self.execute(script, file_name_hint, &sink, cancel).await;

        sink.write_line(&outcome.terminal_line()).await;

        info!(?outcome, sink_broken = sink.is_broken(), "Run finished");
        Ok(outcome)
    }

    async fn execute<W>(
        &self,
        script: &str,
        file_name_hint: Option<&str>,
        sink: &LineSink<W>,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome
    where
        W: AsyncWrite + Unpin + Send,
    {
        let materialized = tokio::select! {
            biased;
            () = cancel.cancelled() => return ExecutionOutcome::Cancelled,
            result = TempScript::materialize(&self.config.temp_dir, file_name_hint, script) => result,
        };

        let temp = match materialized {
            Ok(temp) => temp,
            Err(e) => {
                warn!(error = %e, dir = %self.config.temp_dir.display(), "Failed to write temp script");
                return ExecutionOutcome::Failed(e.to_string());
            }
        };

        let outcome = self.launch_and_stream(&temp, sink, cancel).await;
        temp.close();
        outcome
    }

    async fn launch_and_stream<W>(
        &self,
        temp: &TempScript,
        sink: &LineSink<W>,
        cancel: &CancellationToken,
    ) -> ExecutionOutcome
    where
        W: AsyncWrite + Unpin + Send,
    {
        if cancel.is_cancelled() {
            return ExecutionOutcome::Cancelled;
        }

        let spec = LaunchSpec::k6_run(&self.config.executable, temp.path());
        let mut process = match self.launcher.try_start(&spec) {
            Ok(process) => process,
            Err(LaunchError::NotFound(program)) => {
                warn!(%program, "k6 executable not found");
                return ExecutionOutcome::ExecutableNotFound;
            }
            Err(e) => {
                warn!(error = %e, "Failed to start k6");
                return ExecutionOutcome::LaunchFailed;
            }
        };

        info!(program = %spec.program, script = %temp.path().display(), "k6 started");

        let outcome = match stream(process.as_mut(), sink, cancel).await {
            Ok(Some(code)) => ExecutionOutcome::Exited(code),
            Ok(None) => ExecutionOutcome::Cancelled,
            Err(e) => ExecutionOutcome::Failed(e.to_string()),
        };

        drop(process);
        outcome
    }
}

/// Drain both channels and wait for exit. `None` means cancelled.
///
/// Cancellation wins at any point before both channels are drained and the
/// exit code is known, including after k6 itself has exited while
/// something it spawned still holds a pipe open.
async fn stream<W>(
    process: &mut dyn ProcessHandle,
    sink: &LineSink<W>,
    cancel: &CancellationToken,
) -> io::Result<Option<i32>>
where
    W: AsyncWrite + Unpin + Send,
{
    let stdout = process.take_stdout();
    let stderr = process.take_stderr();

    let finished = {
        let out = pump_optional(stdout, Channel::Stdout, sink, cancel);
        let err = pump_optional(stderr, Channel::Stderr, sink, cancel);
        let exit = process.wait();

        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            joined = async move { tokio::join!(out, err, exit) } => Some(joined),
        }
    };

    let Some((out, err, exit)) = finished else {
        kill_tree(process);
        return Ok(None);
    };

    // The pumps stop quietly on cancel, so a late token still wins here.
    if cancel.is_cancelled() {
        kill_tree(process);
        return Ok(None);
    }

    let code = exit?;
    out?;
    err?;
    Ok(Some(code))
}

/// Kill everything in the process tree, even when k6 itself is gone.
fn kill_tree(process: &mut dyn ProcessHandle) {
    let exited = process.has_exited();
    match process.kill_tree() {
        Ok(()) => debug!(exited, "Killed k6 process tree"),
        Err(e) => debug!(exited, error = %e, "Failed to kill k6 process tree"),
    }
}
