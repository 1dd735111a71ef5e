use stepwise_core::lifecycle::{Lifecycle, Validating};
use stepwise_core::{ErrorKind, Purpose, ValidationReport};
use stepwise_prompts::ReasoningContext;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::OrchestrationError;
use crate::parse::parse_validation;
use crate::ports::Ports;

/// Which checks run after a successful execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub automated: bool,
    pub human: bool,
}

impl ValidationPolicy {
    pub fn is_off(&self) -> bool {
        !self.automated && !self.human
    }
}

/// Outcome of validating one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// `None` when both checks are configured off.
    Pass(Option<ValidationReport>),
    Fail(ValidationReport),
}

impl Verdict {
    fn from_report(report: ValidationReport) -> Self {
        if report.is_valid {
            Verdict::Pass(Some(report))
        } else {
            Verdict::Fail(report)
        }
    }
}

pub const VERDICT_QUESTION: &str = "Does this result pass?";
pub const PASS: &str = "pass";
pub const FAIL: &str = "fail";

pub struct Validator<'a> {
    ports: &'a Ports,
    policy: ValidationPolicy,
    cancel: &'a CancellationToken,
}

impl<'a> Validator<'a> {
    pub fn new(ports: &'a Ports, policy: ValidationPolicy, cancel: &'a CancellationToken) -> Self {
        Self {
            ports,
            policy,
            cancel,
        }
    }

    /// Validate the subtask's current result. Infrastructure failures never
    /// fail the subtask: they are recorded and validation counts as skipped.
    /// When the human check runs, its answer is the verdict.
    pub async fn validate(
        &self,
        requirement: &str,
        lifecycle: &mut Lifecycle<Validating>,
    ) -> Result<Verdict, OrchestrationError> {
        if self.policy.is_off() {
            return Ok(Verdict::Pass(None));
        }
        let attempt = lifecycle.subtask().attempts();
        let payload = lifecycle.subtask().payload().unwrap_or_default().to_string();

        let automated = if self.policy.automated {
            Some(self.automated(requirement, lifecycle, attempt, &payload).await?)
        } else {
            None
        };

        if !self.policy.human {
            return Ok(Verdict::from_report(
                automated.unwrap_or_else(|| ValidationReport::skipped(attempt, "no checks ran")),
            ));
        }

        match self.ask_human(&payload, automated.as_ref()).await {
            Ok(accepted) => {
                info!(
                    "subtask {}: human {} the result",
                    lifecycle.subtask().id,
                    if accepted { "accepted" } else { "rejected" }
                );
                let report = match automated {
                    Some(report) => report.with_human_decision(accepted),
                    None => ValidationReport::human(attempt, accepted),
                };
                Ok(Verdict::from_report(report))
            }
            Err(OrchestrationError::Cancelled) => Err(OrchestrationError::Cancelled),
            Err(e) => {
                warn!(
                    "subtask {}: human validation unavailable: {}",
                    lifecycle.subtask().id,
                    e
                );
                lifecycle.record_error(ErrorKind::Validation, e.to_string());
                let report = automated.unwrap_or_else(|| {
                    ValidationReport::skipped(attempt, "human confirmation unavailable")
                });
                Ok(Verdict::from_report(report))
            }
        }
    }

    async fn automated(
        &self,
        requirement: &str,
        lifecycle: &mut Lifecycle<Validating>,
        attempt: u32,
        payload: &str,
    ) -> Result<ValidationReport, OrchestrationError> {
        if self.cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        let ctx =
            ReasoningContext::for_subtask(requirement, lifecycle.subtask()).with_result(payload);
        let parsed = match self.ports.reasoning.complete(Purpose::Validate, &ctx).await {
            Ok(text) => parse_validation(&text, attempt).map_err(|e| e.to_string()),
            Err(e) => Err(format!("{e:#}")),
        };
        match parsed {
            Ok(report) => {
                info!(
                    "subtask {} attempt {}: automated validation valid={} score={:.2}",
                    lifecycle.subtask().id,
                    attempt,
                    report.is_valid,
                    report.score
                );
                Ok(report)
            }
            Err(message) => {
                warn!(
                    "subtask {}: automated validation skipped: {}",
                    lifecycle.subtask().id,
                    message
                );
                let error = OrchestrationError::Validation(message.clone());
                lifecycle.record_error(ErrorKind::Validation, error.to_string());
                Ok(ValidationReport::skipped(attempt, message))
            }
        }
    }

    async fn ask_human(
        &self,
        payload: &str,
        automated: Option<&ValidationReport>,
    ) -> Result<bool, OrchestrationError> {
        let port_err = |e: anyhow::Error| OrchestrationError::Validation(format!("{e:#}"));
        if self.cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        self.ports
            .confirmation
            .display(&render_for_human(payload, automated))
            .await
            .map_err(port_err)?;
        if self.cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        let options = vec![PASS.to_string(), FAIL.to_string()];
        let choice = self
            .ports
            .confirmation
            .select(VERDICT_QUESTION, &options)
            .await
            .map_err(port_err)?;
        Ok(choice.trim().eq_ignore_ascii_case(PASS))
    }
}

/// The result, followed by the automated assessment when one ran.
pub fn render_for_human(payload: &str, automated: Option<&ValidationReport>) -> String {
    let mut out = format!("Result:\n{payload}\n");
    if let Some(report) = automated {
        out.push_str(&format!(
            "\nAutomated assessment: {} (score {:.2})\n",
            if report.is_valid { "valid" } else { "invalid" },
            report.score
        ));
        for finding in &report.findings {
            out.push_str(&format!("  - {finding}\n"));
        }
        if !report.suggestions.is_empty() {
            out.push_str("Suggestions:\n");
            for suggestion in &report.suggestions {
                out.push_str(&format!("  - {suggestion}\n"));
            }
        }
        if !report.narrative.is_empty() {
            out.push_str(&format!("{}\n", report.narrative));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_report() {
        assert_eq!(render_for_human("hello", None), "Result:\nhello\n");
    }

    #[test]
    fn render_with_report() {
        let report = ValidationReport::automated(
            1,
            false,
            0.25,
            vec!["missing newline".into()],
            vec!["append \\n".into()],
            "close but not quite",
        );
        let text = render_for_human("hello", Some(&report));
        assert!(text.contains("Automated assessment: invalid (score 0.25)"));
        assert!(text.contains("  - missing newline"));
        assert!(text.contains("Suggestions:\n  - append \\n"));
        assert!(text.ends_with("close but not quite\n"));
    }

    #[test]
    fn verdict_follows_validity() {
        let pass = Verdict::from_report(ValidationReport::human(1, true));
        assert!(matches!(pass, Verdict::Pass(Some(_))));
        let fail = Verdict::from_report(ValidationReport::human(1, false));
        assert!(matches!(fail, Verdict::Fail(_)));
    }

    #[test]
    fn policy_off() {
        assert!(ValidationPolicy { automated: false, human: false }.is_off());
        assert!(!ValidationPolicy { automated: true, human: false }.is_off());
    }
}
