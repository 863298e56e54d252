//! k6 script generation from declarative load-test configuration.

mod builder;
mod model;

pub use builder::{build_script, scenario_name};
pub use model::{LoadTestConfig, RunRequest, ScriptResult, Stage};

use thiserror::Error;

/// Problems with a load-test configuration or run request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("targetUrl must be an absolute URI.")]
    InvalidTargetUrl,

    #[error("Test script is required to run k6.")]
    MissingScript,
}
