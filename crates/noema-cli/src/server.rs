use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::orchestrator::{Orchestrator, Percept, SessionContext};

const DEFAULT_SESSION: &str = "default";

#[derive(Clone)]
pub struct NoemaServer {
    orchestrator: Arc<Orchestrator>,
    tool_router: ToolRouter<Self>,
}

impl NoemaServer {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            tool_router: Self::tool_router(),
        }
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn session_or_default(session_id: Option<String>) -> String {
    session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string())
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct ProcessRequest {
    /// Percept content to run through the pipeline
    content: String,
    /// Session to process in. Defaults to "default".
    session_id: Option<String>,
    /// Where the percept came from (default "user")
    source: Option<String>,
    /// Percept type (default "text")
    kind: Option<String>,
    /// Optional user id recorded on the session context
    user_id: Option<String>,
    /// Context tags woven into state narratives
    tags: Option<Vec<String>>,
    /// Goal text used to rank candidate solutions
    goal: Option<String>,
    /// Solver rules such as "not:wait" or "require:explore"
    constraints: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct StartFlowRequest {
    /// Session whose background loop to start
    session_id: String,
    /// Context tags applied to every autonomous cycle
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SessionRequest {
    /// Session id
    session_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SampleRequest {
    /// Sample size in bytes (defaults to the configured chunk size)
    size: Option<usize>,
    /// Use the deterministic seed instead of the system CSPRNG
    use_seed: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ValidateRequest {
    /// Text to check against the safety policy
    text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct StatsRequest {
    /// Session to report on. Omit to list every known session.
    session_id: Option<String>,
}

#[tool_router]
impl NoemaServer {
    #[tool(
        description = "Process one percept through the noise-to-affect pipeline for a session. Returns the session summary: validated subjective states, thought and solution counts, the new I-point position, processing time and the reproducibility key."
    )]
    async fn noema_process(
        &self,
        Parameters(req): Parameters<ProcessRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut percept = Percept::new(
            req.source.unwrap_or_else(|| "user".to_string()),
            req.kind.unwrap_or_else(|| "text".to_string()),
            req.content,
        );
        if let Some(goal) = req.goal {
            percept = percept.with_meta("goal", goal);
        }
        if let Some(constraints) = req.constraints
            && !constraints.is_empty()
        {
            percept = percept.with_meta("constraints", constraints.join(";"));
        }
        let context = SessionContext {
            session_id: session_or_default(req.session_id),
            user_id: req.user_id,
            tags: req.tags.unwrap_or_default(),
        };

        let outcome = self
            .orchestrator
            .process_percept(&percept, &context)
            .await
            .map_err(|e| McpError::internal_error(format!("{e:#}"), None))?;
        json_result(&outcome.summary())
    }

    #[tool(
        description = "Start the autonomous background cycle for a session. Replaces a loop that is already running."
    )]
    async fn noema_start_flow(
        &self,
        Parameters(req): Parameters<StartFlowRequest>,
    ) -> Result<CallToolResult, McpError> {
        if req.session_id.trim().is_empty() {
            return Err(McpError::invalid_params("session_id must not be empty", None));
        }
        let context = SessionContext::new(req.session_id.clone()).with_tags(req.tags.unwrap_or_default());
        let replaced = self
            .orchestrator
            .start_flow(context)
            .await
            .map_err(|e| McpError::internal_error(format!("{e:#}"), None))?;
        json_result(&serde_json::json!({
            "sessionId": req.session_id,
            "running": true,
            "replaced": replaced,
        }))
    }

    #[tool(description = "Stop the background cycle for a session. Safe to call when none is running.")]
    async fn noema_stop_flow(
        &self,
        Parameters(req): Parameters<SessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let stopped = self.orchestrator.stop_flow(&req.session_id).await;
        json_result(&serde_json::json!({
            "sessionId": req.session_id,
            "stopped": stopped,
        }))
    }

    #[tool(
        description = "Current I-point for a session: axis position, region flags, determinism and entropy factors, velocity, phase and history length. Returns null for an unknown session."
    )]
    async fn noema_ipoint(
        &self,
        Parameters(req): Parameters<SessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.orchestrator.ipoint_snapshot(&req.session_id).await)
    }

    #[tool(
        description = "Context window for a session: active tags, embedding dimension and recent percept count. Returns null for an unknown session."
    )]
    async fn noema_context(
        &self,
        Parameters(req): Parameters<SessionRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.orchestrator.context_snapshot(&req.session_id).await)
    }

    #[tool(description = "Generate one noise chunk and report its hash and Shannon entropy.")]
    async fn noema_sample_entropy(
        &self,
        Parameters(req): Parameters<SampleRequest>,
    ) -> Result<CallToolResult, McpError> {
        if req.size == Some(0) {
            return Err(McpError::invalid_params("size must be positive", None));
        }
        json_result(
            &self
                .orchestrator
                .sample_entropy(req.size, req.use_seed.unwrap_or(false)),
        )
    }

    #[tool(description = "Estimate entropy source quality as a score in [0, 1].")]
    async fn noema_entropy_quality(&self) -> Result<CallToolResult, McpError> {
        json_result(&serde_json::json!({ "score": self.orchestrator.entropy_quality() }))
    }

    #[tool(
        description = "Check text against the safety policy. Returns validity, a safety score, whether it should be sandboxed and the violations found."
    )]
    async fn noema_validate(
        &self,
        Parameters(req): Parameters<ValidateRequest>,
    ) -> Result<CallToolResult, McpError> {
        json_result(&self.orchestrator.validate_content(&req.text))
    }

    #[tool(
        description = "Persisted memory statistics: per-storage counts, version and last I-point position for one session, or for every known session when none is given."
    )]
    async fn noema_stats(
        &self,
        Parameters(req): Parameters<StatsRequest>,
    ) -> Result<CallToolResult, McpError> {
        match req.session_id {
            Some(id) => json_result(&self.orchestrator.memory_stats(&id)),
            None => {
                let mut sessions = Vec::new();
                for id in self.orchestrator.list_sessions() {
                    sessions.push(serde_json::json!({
                        "sessionId": id,
                        "flowRunning": self.orchestrator.flow_running(&id).await,
                        "memory": self.orchestrator.memory_stats(&id),
                    }));
                }
                json_result(&serde_json::json!({ "sessions": sessions }))
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for NoemaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "noema turns cryptographic noise into affect-labelled subjective states and keeps a \
                 decaying per-session memory of them.\n\n\
                 - noema_process runs one cycle for a percept and returns the session summary.\n\
                 - noema_start_flow / noema_stop_flow control the autonomous background cycle.\n\
                 - noema_ipoint and noema_context inspect live session state; noema_stats reads \
                   persisted memory.\n\
                 - noema_validate checks text against the safety policy before you act on it."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
