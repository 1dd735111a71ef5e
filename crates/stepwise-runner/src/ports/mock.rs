//! Scripted port doubles for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use stepwise_core::{Purpose, ToolSpec};
use stepwise_prompts::ReasoningContext;

use super::workspace_tools::WorkspaceTools;
use super::{ConfirmationPort, ReasoningPort, ToolOutcome, ToolPort};

/// One recorded reasoning call.
#[derive(Debug, Clone)]
pub struct ReasoningCall {
    pub purpose: Purpose,
    pub context: ReasoningContext,
}

/// A reasoning backend that answers each purpose from its own FIFO queue.
///
/// An exhausted queue is a port error, so tests notice unexpected calls.
#[derive(Default)]
pub struct ScriptedReasoning {
    responses: Mutex<HashMap<Purpose, VecDeque<Result<String, String>>>>,
    calls: Mutex<Vec<ReasoningCall>>,
}

impl ScriptedReasoning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `purpose`.
    pub fn respond(self, purpose: Purpose, text: &str) -> Self {
        self.push(purpose, Ok(text.to_string()));
        self
    }

    /// Queue the same response `times` times.
    pub fn respond_times(self, purpose: Purpose, text: &str, times: usize) -> Self {
        for _ in 0..times {
            self.push(purpose, Ok(text.to_string()));
        }
        self
    }

    /// Queue a port failure for `purpose`.
    pub fn fail(self, purpose: Purpose, message: &str) -> Self {
        self.push(purpose, Err(message.to_string()));
        self
    }

    fn push(&self, purpose: Purpose, response: Result<String, String>) {
        if let Ok(mut map) = self.responses.lock() {
            map.entry(purpose).or_default().push_back(response);
        }
    }

    pub fn calls(&self) -> Vec<ReasoningCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, purpose: Purpose) -> usize {
        self.calls().iter().filter(|c| c.purpose == purpose).count()
    }

    /// Purposes in call order.
    pub fn purposes(&self) -> Vec<Purpose> {
        self.calls().iter().map(|c| c.purpose).collect()
    }
}

#[async_trait]
impl ReasoningPort for ScriptedReasoning {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, purpose: Purpose, context: &ReasoningContext) -> Result<String> {
        self.calls
            .lock()
            .map_err(|_| anyhow!("call log poisoned"))?
            .push(ReasoningCall {
                purpose,
                context: context.clone(),
            });
        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow!("responses poisoned"))?
            .get_mut(&purpose)
            .and_then(|q| q.pop_front());
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted response for {purpose}")),
        }
    }
}

/// A tool gateway that records invocations and returns scripted outcomes.
///
/// Advertises the workspace tools by default. Invoking an advertised tool
/// with no scripted outcome succeeds with `"ok"`; invoking anything else is
/// a tool-side failure.
pub struct MockTools {
    tools: Vec<ToolSpec>,
    outcomes: Mutex<HashMap<String, VecDeque<ToolOutcome>>>,
    invocations: Mutex<Vec<(String, Map<String, Value>)>>,
    port_error: Option<String>,
}

impl Default for MockTools {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTools {
    pub fn new() -> Self {
        Self {
            tools: WorkspaceTools::specs(),
            outcomes: Mutex::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
            port_error: None,
        }
    }

    /// Queue an outcome for the next call to `tool`.
    pub fn with_outcome(self, tool: &str, outcome: ToolOutcome) -> Self {
        if let Ok(mut map) = self.outcomes.lock() {
            map.entry(tool.to_string()).or_default().push_back(outcome);
        }
        self
    }

    /// Every call fails at the port level.
    pub fn unreachable(mut self, message: &str) -> Self {
        self.port_error = Some(message.to_string());
        self
    }

    pub fn invocations(&self) -> Vec<(String, Map<String, Value>)> {
        self.invocations
            .lock()
            .map(|i| i.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ToolPort for MockTools {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        if let Some(ref message) = self.port_error {
            return Err(anyhow!(message.clone()));
        }
        Ok(self.tools.clone())
    }

    async fn invoke(&self, tool: &str, params: &Map<String, Value>) -> Result<ToolOutcome> {
        if let Some(ref message) = self.port_error {
            return Err(anyhow!(message.clone()));
        }
        self.invocations
            .lock()
            .map_err(|_| anyhow!("invocation log poisoned"))?
            .push((tool.to_string(), params.clone()));
        let scripted = self
            .outcomes
            .lock()
            .map_err(|_| anyhow!("outcomes poisoned"))?
            .get_mut(tool)
            .and_then(|q| q.pop_front());
        if let Some(outcome) = scripted {
            return Ok(outcome);
        }
        if self.tools.iter().any(|t| t.name == tool) {
            Ok(ToolOutcome::ok("ok"))
        } else {
            Ok(ToolOutcome::err(format!("unknown tool `{tool}`")))
        }
    }
}

/// A human operator answering from scripted queues.
///
/// Exhausted queues are port errors.
#[derive(Default)]
pub struct ScriptedConfirmation {
    prompts: Mutex<VecDeque<Result<String, String>>>,
    confirms: Mutex<VecDeque<Result<bool, String>>>,
    selects: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
    displayed: Mutex<Vec<String>>,
}

impl ScriptedConfirmation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, text: &str) -> Self {
        if let Ok(mut q) = self.prompts.lock() {
            q.push_back(Ok(text.to_string()));
        }
        self
    }

    pub fn fail_prompt(self, message: &str) -> Self {
        if let Ok(mut q) = self.prompts.lock() {
            q.push_back(Err(message.to_string()));
        }
        self
    }

    pub fn confirm_with(self, value: bool) -> Self {
        if let Ok(mut q) = self.confirms.lock() {
            q.push_back(Ok(value));
        }
        self
    }

    pub fn fail_confirm(self, message: &str) -> Self {
        if let Ok(mut q) = self.confirms.lock() {
            q.push_back(Err(message.to_string()));
        }
        self
    }

    pub fn choose(self, option: &str) -> Self {
        if let Ok(mut q) = self.selects.lock() {
            q.push_back(option.to_string());
        }
        self
    }

    /// Texts of every prompt, confirm and select, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    pub fn displayed(&self) -> Vec<String> {
        self.displayed.lock().map(|d| d.clone()).unwrap_or_default()
    }

    fn record(&self, text: &str) -> Result<()> {
        self.asked
            .lock()
            .map_err(|_| anyhow!("ask log poisoned"))?
            .push(text.to_string());
        Ok(())
    }
}

#[async_trait]
impl ConfirmationPort for ScriptedConfirmation {
    async fn prompt(&self, text: &str) -> Result<String> {
        self.record(text)?;
        let next = self
            .prompts
            .lock()
            .map_err(|_| anyhow!("prompts poisoned"))?
            .pop_front();
        match next {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted answer for prompt")),
        }
    }

    async fn confirm(&self, text: &str) -> Result<bool> {
        self.record(text)?;
        let next = self
            .confirms
            .lock()
            .map_err(|_| anyhow!("confirms poisoned"))?
            .pop_front();
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted answer for confirm")),
        }
    }

    async fn select(&self, text: &str, options: &[String]) -> Result<String> {
        self.record(text)?;
        let choice = self
            .selects
            .lock()
            .map_err(|_| anyhow!("selects poisoned"))?
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted answer for select"))?;
        if !options.contains(&choice) {
            return Err(anyhow!("`{choice}` is not one of {options:?}"));
        }
        Ok(choice)
    }

    async fn display(&self, payload: &str) -> Result<()> {
        self.displayed
            .lock()
            .map_err(|_| anyhow!("display log poisoned"))?
            .push(payload.to_string());
        Ok(())
    }
}
