//! Process launcher trait and implementations.
//!
//! The launcher only starts programs and hands back a handle to the live
//! process. It never interprets output; the runner does that.

mod system;
#[cfg(test)]
pub(crate) mod testing;

pub use system::SystemLauncher;

use std::ffi::OsString;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

/// One of the two redirected output channels of a process.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Program and arguments to start. No shell is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<OsString>,
}

impl LaunchSpec {
    /// Create a spec for an arbitrary program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// `<executable> run <script>`
    pub fn k6_run(executable: &str, script: &Path) -> Self {
        Self::new(executable).arg("run").arg(script)
    }
}

/// Why a process could not be started.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The OS could not find the executable.
    #[error("executable not found: {0}")]
    NotFound(String),

    /// The OS refused to create the process for any other reason.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// A live external process owned by a single run.
///
/// Dropping the handle releases it. Implementations must not leave the
/// process running unattended once dropped.
#[async_trait]
pub trait ProcessHandle: Send {
    /// Take the standard output reader. Returns `None` after the first call.
    fn take_stdout(&mut self) -> Option<OutputStream>;

    /// Take the standard error reader. Returns `None` after the first call.
    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Whether the process has already exited.
    fn has_exited(&mut self) -> bool;

    /// Wait for the process to exit and return its exit code.
    ///
    /// A process terminated by a signal reports `-1`.
    async fn wait(&mut self) -> io::Result<i32>;

    /// Forcibly terminate the process and everything it spawned.
    fn kill_tree(&mut self) -> io::Result<()>;
}

/// Starts external processes with both output channels redirected.
///
/// The production adapter is [`SystemLauncher`]; tests substitute a fake
/// that returns canned output without touching the OS.
pub trait ProcessLauncher: Send + Sync {
    /// Start the program described by `spec`.
    fn try_start(&self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>, LaunchError>;
}
