use stepwise_core::{Purpose, SubtaskSpec};
use stepwise_prompts::ReasoningContext;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::OrchestrationError;
use crate::parse::parse_todo_list;
use crate::ports::ReasoningPort;

/// Turn a requirement into an ordered, non-empty list of subtask specs.
///
/// One reasoning call, no retries. A port failure or an unparseable todo
/// list is a decomposition failure.
pub async fn decompose(
    reasoning: &dyn ReasoningPort,
    requirement: &str,
    max_subtasks: usize,
    cancel: &CancellationToken,
) -> Result<Vec<SubtaskSpec>, OrchestrationError> {
    if requirement.trim().is_empty() {
        return Err(OrchestrationError::InvalidInput(
            "requirement must not be empty".into(),
        ));
    }
    if cancel.is_cancelled() {
        return Err(OrchestrationError::Cancelled);
    }

    let ctx = ReasoningContext::for_requirement(requirement).with_max_subtasks(max_subtasks);
    let text = reasoning
        .complete(Purpose::Decompose, &ctx)
        .await
        .map_err(|e| {
            warn!("decompose call to {} failed: {e:#}", reasoning.name());
            OrchestrationError::Decomposition(format!("{e:#}"))
        })?;

    let specs = parse_todo_list(&text, max_subtasks)
        .map_err(|e| OrchestrationError::Decomposition(e.to_string()))?;
    info!("decomposed requirement into {} subtasks", specs.len());
    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mock::ScriptedReasoning;

    const PLAN: &str = "<update_todo_list>\n<todos>\n1. [ ] Create the project layout => a directory tree\n2. [ ] Write hello.txt\n</todos>\n</update_todo_list>";

    #[tokio::test]
    async fn returns_ordered_specs() {
        let r = ScriptedReasoning::new().respond(Purpose::Decompose, PLAN);
        let specs = decompose(&r, "make a hello world project", 20, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].description, "Create the project layout");
        assert_eq!(specs[0].expected_output, "a directory tree");
        assert_eq!(specs[1].description, "Write hello.txt");
    }

    #[tokio::test]
    async fn empty_requirement_is_rejected_without_a_call() {
        let r = ScriptedReasoning::new();
        let err = decompose(&r, "   ", 20, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidInput(_)));
        assert!(r.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_list_is_a_decomposition_error() {
        let r = ScriptedReasoning::new()
            .respond(Purpose::Decompose, "<todos>\n</todos>");
        let err = decompose(&r, "anything", 20, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Decomposition(_)));
    }

    #[tokio::test]
    async fn prose_is_a_decomposition_error() {
        let r = ScriptedReasoning::new()
            .respond(Purpose::Decompose, "Sure! First you should create a file.");
        let err = decompose(&r, "anything", 20, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Decomposition(_)));
    }

    #[tokio::test]
    async fn port_failure_is_a_decomposition_error() {
        let r = ScriptedReasoning::new().fail(Purpose::Decompose, "connection refused");
        let err = decompose(&r, "anything", 20, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            OrchestrationError::Decomposition(msg) => assert!(msg.contains("connection refused")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_before_the_call() {
        let r = ScriptedReasoning::new().respond(Purpose::Decompose, PLAN);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = decompose(&r, "anything", 20, &cancel).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Cancelled));
        assert!(r.calls().is_empty());
    }
}
