use serde_json::Value;
use stepwise_core::lifecycle::{Executing, Lifecycle};
use stepwise_core::{ExecutionMode, ExecutionResult, Purpose, ToolCall, ToolSpec};
use stepwise_prompts::ReasoningContext;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::OrchestrationError;
use crate::parse::{parse_free_text, parse_mode, parse_tool_call};
use crate::ports::Ports;

/// Carries out one execution attempt for a subtask.
///
/// `Err(Dispatch)` means the backend could not pick a mode or produce a
/// usable tool call. `Err(ToolExecution)` means the Tool Port itself failed.
/// Failures reported by a tool and generation failures come back as a failed
/// [`ExecutionResult`] so the runner can decide about retries.
pub struct Dispatcher<'a> {
    ports: &'a Ports,
    cancel: &'a CancellationToken,
}

impl<'a> Dispatcher<'a> {
    pub fn new(ports: &'a Ports, cancel: &'a CancellationToken) -> Self {
        Self { ports, cancel }
    }

    pub async fn execute(
        &self,
        requirement: &str,
        lifecycle: &mut Lifecycle<Executing>,
    ) -> Result<ExecutionResult, OrchestrationError> {
        let ctx = ReasoningContext::for_subtask(requirement, lifecycle.subtask());

        let mode = match lifecycle.subtask().mode() {
            Some(mode) => {
                debug!("subtask {} reusing mode {}", lifecycle.subtask().id, mode);
                mode
            }
            None => {
                let mode = self.choose_mode(&ctx).await?;
                lifecycle.record_mode(mode)?;
                info!("subtask {} dispatched as {}", lifecycle.subtask().id, mode);
                mode
            }
        };

        match mode {
            ExecutionMode::Tool => self.run_tool(ctx).await,
            ExecutionMode::Generated => self.generate(&ctx).await,
        }
    }

    fn checkpoint(&self) -> Result<(), OrchestrationError> {
        if self.cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        Ok(())
    }

    async fn choose_mode(
        &self,
        ctx: &ReasoningContext,
    ) -> Result<ExecutionMode, OrchestrationError> {
        self.checkpoint()?;
        let text = self
            .ports
            .reasoning
            .complete(Purpose::ChooseMode, ctx)
            .await
            .map_err(|e| OrchestrationError::Dispatch(format!("choose_mode: {e:#}")))?;
        parse_mode(&text).map_err(|e| OrchestrationError::Dispatch(e.to_string()))
    }

    async fn run_tool(&self, ctx: ReasoningContext) -> Result<ExecutionResult, OrchestrationError> {
        self.checkpoint()?;
        let tools = self.ports.tools.list_tools().await.map_err(|e| {
            warn!("tool discovery failed: {e:#}");
            OrchestrationError::ToolExecution(format!("list_tools: {e:#}"))
        })?;

        self.checkpoint()?;
        let ctx = ctx.with_tools(tools.clone());
        let text = self
            .ports
            .reasoning
            .complete(Purpose::GenToolCall, &ctx)
            .await
            .map_err(|e| OrchestrationError::Dispatch(format!("gen_tool_call: {e:#}")))?;
        let call = parse_tool_call(&text).map_err(|e| OrchestrationError::Dispatch(e.to_string()))?;

        let Some(spec) = tools.iter().find(|t| t.name == call.tool) else {
            let message = format!("unknown tool `{}`", call.tool);
            return Ok(ExecutionResult::failed(ExecutionMode::Tool, message).with_tool_call(call));
        };
        let missing = missing_parameters(spec, &call);
        if !missing.is_empty() {
            let message = format!(
                "`{}` is missing required parameters: {}",
                call.tool,
                missing.join(", ")
            );
            return Ok(ExecutionResult::failed(ExecutionMode::Tool, message).with_tool_call(call));
        }

        self.checkpoint()?;
        debug!("invoking tool {}", call.tool);
        let outcome = self
            .ports
            .tools
            .invoke(&call.tool, &call.parameters)
            .await
            .map_err(|e| OrchestrationError::ToolExecution(format!("{}: {e:#}", call.tool)))?;
        let result = if outcome.success {
            ExecutionResult::succeeded(ExecutionMode::Tool, outcome.payload.unwrap_or_default())
        } else {
            ExecutionResult::failed(
                ExecutionMode::Tool,
                outcome
                    .error
                    .unwrap_or_else(|| format!("`{}` failed", call.tool)),
            )
        };
        Ok(result.with_tool_call(call))
    }

    async fn generate(
        &self,
        ctx: &ReasoningContext,
    ) -> Result<ExecutionResult, OrchestrationError> {
        self.checkpoint()?;
        let result = match self.ports.reasoning.complete(Purpose::Generate, ctx).await {
            Ok(text) => match parse_free_text(Purpose::Generate, &text) {
                Ok(content) => ExecutionResult::succeeded(ExecutionMode::Generated, content),
                Err(e) => ExecutionResult::failed(ExecutionMode::Generated, e.to_string()),
            },
            Err(e) => ExecutionResult::failed(ExecutionMode::Generated, format!("{e:#}")),
        };
        Ok(result)
    }
}

/// Required parameters from the tool's JSON schema that the call omits.
fn missing_parameters(spec: &ToolSpec, call: &ToolCall) -> Vec<String> {
    match spec.parameters.get("required") {
        Some(Value::Array(required)) => required
            .iter()
            .filter_map(Value::as_str)
            .filter(|name| !call.parameters.contains_key(*name))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn spec() -> ToolSpec {
        ToolSpec {
            name: "write_file".into(),
            description: String::new(),
            parameters: json!({"type": "object", "required": ["path", "content"]}),
        }
    }

    fn call(params: Value) -> ToolCall {
        let parameters: Map<String, Value> = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ToolCall {
            tool: "write_file".into(),
            parameters,
        }
    }

    #[test]
    fn reports_missing_required() {
        let missing = missing_parameters(&spec(), &call(json!({"path": "a.txt"})));
        assert_eq!(missing, vec!["content"]);
    }

    #[test]
    fn complete_call_has_nothing_missing() {
        let missing =
            missing_parameters(&spec(), &call(json!({"path": "a.txt", "content": "hi"})));
        assert!(missing.is_empty());
    }

    #[test]
    fn schema_without_required_accepts_anything() {
        let mut s = spec();
        s.parameters = json!({"type": "object"});
        assert!(missing_parameters(&s, &call(json!({}))).is_empty());
    }
}
