//! k6-tester library
//!
//! This crate provides the core functionality for the k6-tester binary:
//! - Rendering k6 scripts from declarative load-test configuration
//! - Launching k6 behind a mockable process boundary
//! - Streaming tagged stdout/stderr lines and a terminal status line to a sink
//! - MCP server implementation using rmcp

pub mod config;
pub mod launcher;
pub mod mcp;
pub mod runner;
pub mod script;

pub use config::Config;
pub use launcher::{LaunchError, LaunchSpec, ProcessHandle, ProcessLauncher, SystemLauncher};
pub use runner::{ExecutionOutcome, RunError, Runner};
pub use script::{build_script, LoadTestConfig, RunRequest, ScriptError, ScriptResult};
