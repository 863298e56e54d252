//! Wire types for script generation and run requests.
//!
//! All fields are camelCase on the wire and every field has a default,
//! so partial JSON documents are accepted.

use std::collections::BTreeMap;

use rmcp::schemars;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{build_script, ScriptError};

/// Declarative description of a single-endpoint load test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadTestConfig {
    /// Scenario name; also used for the suggested file name.
    pub test_name: String,

    /// Absolute URL the virtual users hit.
    pub target_url: String,

    /// GET, POST, PUT, PATCH or DELETE. Anything else falls back to GET.
    pub http_method: String,

    /// Test duration for the constant-VU executor (e.g. `1m`).
    pub duration: String,

    /// Number of virtual users for the constant-VU executor.
    pub virtual_users: i32,

    /// Ramping stages. When non-empty the ramping-VU executor is used.
    pub stages: Vec<Stage>,

    /// Seconds each iteration sleeps after its request.
    pub sleep_seconds: i32,

    /// Request headers.
    pub headers: Option<BTreeMap<String, String>>,

    /// Request body for POST, PUT and PATCH.
    pub payload: Option<String>,

    /// Fail the run when p95 request duration exceeds this many milliseconds.
    #[serde(rename = "p95ThresholdMs")]
    pub p95_threshold_ms: Option<i32>,

    /// Scenario tags.
    pub tags: Option<BTreeMap<String, String>>,

    /// Add a `status is 200` check.
    pub check_response: bool,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            test_name: "sample_test".into(),
            target_url: "https://test.k6.io".into(),
            http_method: "GET".into(),
            duration: "1m".into(),
            virtual_users: 10,
            stages: Vec::new(),
            sleep_seconds: 1,
            headers: None,
            payload: None,
            p95_threshold_ms: None,
            tags: None,
            check_response: true,
        }
    }
}

impl LoadTestConfig {
    /// Require `target_url` to be an absolute URI.
    pub fn validate(&self) -> Result<(), ScriptError> {
        url::Url::parse(self.target_url.trim())
            .map(|_| ())
            .map_err(|_| ScriptError::InvalidTargetUrl)
    }
}

/// One ramping stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Stage {
    pub duration: String,
    pub target: i32,
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            duration: "30s".into(),
            target: 1,
        }
    }
}

/// Rendered script plus how to run it by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResult {
    pub script: String,
    pub suggested_file_name: String,
    pub command: String,
}

/// Request to run either a ready script or one generated from `config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RunRequest {
    /// Configuration to render when no script is given.
    pub config: Option<LoadTestConfig>,

    /// Script source; takes precedence over `config`.
    pub script: Option<String>,

    /// File name hint for the materialized script.
    pub file_name: Option<String>,
}

impl RunRequest {
    /// Pick the script to run and its file name hint.
    pub fn resolve(&self) -> Result<(String, Option<String>), ScriptError> {
        if let Some(script) = self.script.as_deref().filter(|s| !s.trim().is_empty()) {
            return Ok((script.to_string(), self.file_name.clone()));
        }

        let config = self.config.as_ref().ok_or(ScriptError::MissingScript)?;
        config.validate()?;

        let result = build_script(config);
        let hint = self
            .file_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(result.suggested_file_name);
        Ok((result.script, Some(hint)))
    }
}
