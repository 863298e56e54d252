//! Launcher backed by `tokio::process`.
//!
//! Children are started without a shell, with stdin closed and both
//! output channels piped. On Unix each child leads its own process group
//! so cancellation can take down everything k6 spawned.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, instrument};

use super::{LaunchError, LaunchSpec, OutputStream, ProcessHandle, ProcessLauncher};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Launcher that starts real OS processes.
#[derive(Debug, Default, Clone)]
pub struct SystemLauncher {}

impl SystemLauncher {
    /// Create a new system launcher.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

impl ProcessLauncher for SystemLauncher {
    #[instrument(skip(self, spec), fields(program = %spec.program))]
    fn try_start(&self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = cmd.spawn().map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LaunchError::NotFound(spec.program.clone()),
            _ => LaunchError::Spawn {
                program: spec.program.clone(),
                source,
            },
        })?;

        debug!(pid = ?child.id(), "Process started");

        Ok(Box::new(SystemProcess::new(child)))
    }
}

/// Handle over a spawned `tokio::process::Child`.
struct SystemProcess {
    child: Child,
    pid: Option<u32>,
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
}

impl SystemProcess {
    fn new(mut child: Child) -> Self {
        let stdout = child
            .stdout
            .take()
            .map(|pipe| Box::new(pipe) as OutputStream);
        let stderr = child
            .stderr
            .take()
            .map(|pipe| Box::new(pipe) as OutputStream);

        Self {
            pid: child.id(),
            child,
            stdout,
            stderr,
        }
    }
}

#[async_trait]
impl ProcessHandle for SystemProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    async fn wait(&mut self) -> io::Result<i32> {
        let status = self.child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }

    fn kill_tree(&mut self) -> io::Result<()> {
        let Some(pid) = self.pid else {
            // Already reaped by tokio; nothing left to signal.
            return Ok(());
        };
        debug!(pid, "Killing process tree");
        kill_process_tree(&mut self.child, pid)
    }
}

#[cfg(unix)]
fn kill_process_tree(_child: &mut Child, pid: u32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        // Group already gone.
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(windows)]
fn kill_process_tree(_child: &mut Child, pid: u32) -> io::Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID"])
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("taskkill exited with {status}")))
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_process_tree(child: &mut Child, _pid: u32) -> io::Result<()> {
    child.start_kill()
}
