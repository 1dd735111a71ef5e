pub mod claude_cli;
pub mod console;
pub mod mock;
pub mod workspace_tools;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use stepwise_core::{Purpose, ToolSpec};
use stepwise_db::Store;
use stepwise_prompts::ReasoningContext;

/// Request/response contract to the reasoning backend.
///
/// Implementations are stateless from the core's point of view. Timeouts are
/// the implementation's business; a timeout is reported like any other
/// error.
#[async_trait]
pub trait ReasoningPort: Send + Sync {
    /// Human-readable backend name for logging.
    fn name(&self) -> &str;

    /// Run once before a run starts.
    async fn preflight_check(&self) -> Result<()> {
        Ok(())
    }

    /// Return the raw response text for `purpose`. Parsing is the caller's
    /// job.
    async fn complete(&self, purpose: Purpose, context: &ReasoningContext) -> Result<String>;
}

/// Outcome of a tool invocation. A failed outcome is a tool-side failure,
/// not a port error.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub success: bool,
    pub payload: Option<String>,
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(payload: impl Into<String>) -> Self {
        Self {
            success: true,
            payload: Some(payload.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}

/// Request/response contract to the tool gateway.
#[async_trait]
pub trait ToolPort: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>>;

    async fn invoke(&self, tool: &str, params: &Map<String, Value>) -> Result<ToolOutcome>;
}

/// Synchronous human interaction.
#[async_trait]
pub trait ConfirmationPort: Send + Sync {
    async fn prompt(&self, text: &str) -> Result<String>;

    async fn confirm(&self, text: &str) -> Result<bool>;

    /// Returns one of `options`.
    async fn select(&self, text: &str, options: &[String]) -> Result<String>;

    async fn display(&self, payload: &str) -> Result<()>;
}

/// Every collaborator the orchestration core talks to.
#[derive(Clone)]
pub struct Ports {
    pub reasoning: Arc<dyn ReasoningPort>,
    pub tools: Arc<dyn ToolPort>,
    pub confirmation: Arc<dyn ConfirmationPort>,
    pub store: Arc<dyn Store>,
}
