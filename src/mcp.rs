//! MCP server implementation using rmcp.
//!
//! Exposes script generation and k6 runs as MCP tools.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::transport::stdio;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::launcher::ProcessLauncher;
use crate::runner::Runner;
use crate::script::{build_script, LoadTestConfig, RunRequest};

/// MCP server for k6 script generation and execution.
pub struct K6Server<L> {
    runner: Arc<Runner<L>>,
    /// Parent of every run's cancellation token.
    shutdown: CancellationToken,
    tool_router: ToolRouter<Self>,
}

impl<L> Clone for K6Server<L> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            shutdown: self.shutdown.clone(),
            tool_router: self.tool_router.clone(),
        }
    }
}

#[tool_router]
impl<L: ProcessLauncher + 'static> K6Server<L> {
    /// Create a new server. Cancelling `shutdown` cancels in-flight runs.
    pub fn new(runner: Runner<L>, shutdown: CancellationToken) -> Self {
        Self {
            runner: Arc::new(runner),
            shutdown,
            tool_router: Self::tool_router(),
        }
    }

    /// Render a k6 script from a load-test configuration.
    #[tool(description = "Generate a k6 load-test script from a declarative configuration")]
    async fn generate_script(
        &self,
        Parameters(config): Parameters<LoadTestConfig>,
    ) -> Result<CallToolResult, McpError> {
        config
            .validate()
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let result = build_script(&config);
        info!(file = %result.suggested_file_name, "Generated script");

        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(format!("Failed to encode script: {e}"), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    /// Run a script with k6 and return the streamed output.
    #[tool(
        description = "Run a k6 script, or one generated from `config`, and return its output lines"
    )]
    async fn run_script(
        &self,
        Parameters(request): Parameters<RunRequest>,
    ) -> Result<CallToolResult, McpError> {
        let (script, hint) = request
            .resolve()
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        info!(hint = ?hint, script_len = script.len(), "Running script");

        let cancel = self.shutdown.child_token();
        let mut output = Vec::new();
        let outcome = self
            .runner
            .run(&script, hint.as_deref(), &mut output, &cancel)
            .await
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;

        let text = String::from_utf8_lossy(&output).into_owned();
        if outcome.is_success() {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            warn!(?outcome, "k6 run did not succeed");
            Ok(CallToolResult::error(vec![Content::text(text)]))
        }
    }
}

#[tool_handler]
impl<L: ProcessLauncher + 'static> ServerHandler for K6Server<L> {
    fn get_info(&self) -> ServerInfo {
        let executable = &self.runner.config().executable;

        ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "k6-tester".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Generate and run k6 load tests (executable: {executable}).\n\
                 \n\
                 - generate_script: render a script from a load-test config\n\
                 - run_script: run `script` (or a script rendered from `config`) and\n\
                   return lines tagged [out], [err] and a final [exit], [error] or [cancelled] line"
            )),
        }
    }
}

/// Serve the k6 tools over stdio.
pub async fn serve_stdio<L: ProcessLauncher + 'static>(runner: Runner<L>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let server = K6Server::new(runner, shutdown.clone());

    // In-flight runs are cancelled once the server stops.
    let _shutdown_guard = shutdown.drop_guard();

    info!("Starting MCP server on stdio");

    let service = server
        .serve(stdio())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {e}"))?;

    service
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;

    Ok(())
}
