//! Runtime configuration for k6 execution.
//!
//! The k6 executable can be overridden with the `K6_TESTER_CLI_PATH`
//! environment variable; otherwise the bare `k6` command is resolved
//! through `PATH`.

use std::path::PathBuf;

use tracing::debug;

/// Environment variable that overrides the k6 executable.
pub const EXECUTABLE_ENV: &str = "K6_TESTER_CLI_PATH";

/// Executable used when no override is configured.
pub const DEFAULT_EXECUTABLE: &str = "k6";

/// Configuration shared by every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Program invoked as `<executable> run <script>`.
    pub executable: String,

    /// Directory that receives materialized scripts.
    pub temp_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.into(),
            temp_dir: std::env::temp_dir(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// A blank override is treated the same as an unset one.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let executable = lookup(EXECUTABLE_ENV)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_EXECUTABLE.into());

        debug!(executable = %executable, "Resolved k6 executable");

        Self {
            executable,
            ..Self::default()
        }
    }

    /// Use a different directory for materialized scripts.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Use a different k6 executable.
    #[must_use]
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }
}
