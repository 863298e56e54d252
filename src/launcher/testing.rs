//! Test doubles for the launcher boundary.

use std::io::{self, Cursor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{LaunchError, LaunchSpec, OutputStream, ProcessHandle, ProcessLauncher};

fn reader(lines: &[&str]) -> OutputStream {
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    Box::new(Cursor::new(text.into_bytes()))
}

/// Launcher that hands out canned output and exit codes.
#[derive(Debug, Default)]
pub struct FakeLauncher {
    stdout: Vec<String>,
    stderr: Vec<String>,
    exit_code: i32,
    /// Every spec passed to `try_start`.
    pub started: Mutex<Vec<LaunchSpec>>,
    /// Number of handles dropped so far.
    pub released: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(stdout: &[&str], stderr: &[&str]) -> Self {
        Self {
            stdout: stdout.iter().map(|s| (*s).to_string()).collect(),
            stderr: stderr.iter().map(|s| (*s).to_string()).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn last_spec(&self) -> Option<LaunchSpec> {
        self.started.lock().unwrap().last().cloned()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn try_start(&self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        self.started.lock().unwrap().push(spec.clone());
        let stdout: Vec<&str> = self.stdout.iter().map(String::as_str).collect();
        let stderr: Vec<&str> = self.stderr.iter().map(String::as_str).collect();
        Ok(Box::new(FakeProcess {
            stdout: Some(reader(&stdout)),
            stderr: Some(reader(&stderr)),
            exit_code: self.exit_code,
            released: Arc::clone(&self.released),
        }))
    }
}

/// Canned process that has already exited.
struct FakeProcess {
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
    exit_code: i32,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl ProcessHandle for FakeProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    fn has_exited(&mut self) -> bool {
        true
    }

    async fn wait(&mut self) -> io::Result<i32> {
        Ok(self.exit_code)
    }

    fn kill_tree(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FakeProcess {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Launcher whose processes never start.
#[derive(Debug)]
pub enum FailingLauncher {
    /// OS refused to create the process.
    Refused,
    /// Executable is missing.
    Missing,
}

impl ProcessLauncher for FailingLauncher {
    fn try_start(&self, spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        match self {
            Self::Refused => Err(LaunchError::Spawn {
                program: spec.program.clone(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "refused"),
            }),
            Self::Missing => Err(LaunchError::NotFound(spec.program.clone())),
        }
    }
}

/// Process whose wait fails after its output drains.
pub struct BrokenWaitLauncher;

impl ProcessLauncher for BrokenWaitLauncher {
    fn try_start(&self, _spec: &LaunchSpec) -> Result<Box<dyn ProcessHandle>, LaunchError> {
        Ok(Box::new(BrokenWaitProcess {
            stdout: Some(reader(&["partial"])),
        }))
    }
}

struct BrokenWaitProcess {
    stdout: Option<OutputStream>,
}

#[async_trait]
impl ProcessHandle for BrokenWaitProcess {
    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        None
    }

    fn has_exited(&mut self) -> bool {
        false
    }

    async fn wait(&mut self) -> io::Result<i32> {
        Err(io::Error::other("wait failed"))
    }

    fn kill_tree(&mut self) -> io::Result<()> {
        Ok(())
    }
}
