use chrono::Utc;
use serde_json::{Map, Value};
use stepwise_core::lifecycle::{InfoGathering, Lifecycle};
use stepwise_core::{
    Attempts, ContextEntry, ErrorKind, InfoExchange, InfoKind, InfoRequest, InfoResponse, Purpose,
};
use stepwise_prompts::ReasoningContext;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::OrchestrationError;
use crate::parse::parse_info_need;
use crate::ports::Ports;

/// How a gathering loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatherSummary {
    /// Reasoning round-trips made.
    pub rounds: u32,
    /// Rounds that attached an entry (a value or a decline) to context.
    pub entries_added: u32,
    /// The backend still wanted more when the round cap was hit.
    pub capped: bool,
}

/// Asks the reasoning backend whether a subtask needs more context and
/// collects it from the operator, at most `max_rounds` times.
pub struct InfoGatherer<'a> {
    ports: &'a Ports,
    max_rounds: u32,
    cancel: &'a CancellationToken,
}

impl<'a> InfoGatherer<'a> {
    pub fn new(ports: &'a Ports, max_rounds: u32, cancel: &'a CancellationToken) -> Self {
        Self {
            ports,
            max_rounds,
            cancel,
        }
    }

    /// Run the loop. A round whose port call fails is abandoned and recorded
    /// on the subtask; the loop moves on. Only cancellation and store
    /// failures end it early with an error.
    pub async fn gather(
        &self,
        requirement: &str,
        lifecycle: &mut Lifecycle<InfoGathering>,
    ) -> Result<GatherSummary, OrchestrationError> {
        let mut summary = GatherSummary {
            rounds: 0,
            entries_added: 0,
            capped: false,
        };
        let mut satisfied = false;

        for round in Attempts::up_to(self.max_rounds) {
            self.checkpoint()?;
            summary.rounds = round;
            let ctx = ReasoningContext::for_subtask(requirement, lifecycle.subtask())
                .with_round(round, self.max_rounds);

            let text = match self
                .ports
                .reasoning
                .complete(Purpose::CheckInfoNeed, &ctx)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    self.abandon(lifecycle, round, format!("{e:#}"));
                    continue;
                }
            };
            let request = match parse_info_need(&text, round) {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!(
                        "subtask {} needs no more information after round {}",
                        lifecycle.subtask().id,
                        round
                    );
                    satisfied = true;
                    break;
                }
                Err(e) => {
                    self.abandon(lifecycle, round, e.to_string());
                    continue;
                }
            };

            let response = match self.obtain(&request).await {
                Ok(response) => response,
                Err(OrchestrationError::Cancelled) => return Err(OrchestrationError::Cancelled),
                Err(e) => {
                    self.abandon(lifecycle, round, e.to_string());
                    continue;
                }
            };

            let entry = match response.value {
                Some(ref value) if !response.declined => {
                    ContextEntry::gathered(round, request.kind, value.clone())
                }
                _ => ContextEntry::declined(round, request.kind, &request.question),
            };
            lifecycle.append_context(entry);
            summary.entries_added += 1;

            let exchange = InfoExchange {
                subtask_id: lifecycle.subtask().id.clone(),
                request,
                response,
                recorded_at: Utc::now(),
            };
            self.ports.store.append_info_exchange(&exchange).await?;
            self.ports.store.save_subtask(lifecycle.subtask()).await?;
        }

        if !satisfied && summary.rounds == self.max_rounds && self.max_rounds > 0 {
            summary.capped = true;
            info!(
                "subtask {}: info round cap ({}) reached, proceeding with gathered context",
                lifecycle.subtask().id,
                self.max_rounds
            );
        }
        Ok(summary)
    }

    fn checkpoint(&self) -> Result<(), OrchestrationError> {
        if self.cancel.is_cancelled() {
            return Err(OrchestrationError::Cancelled);
        }
        Ok(())
    }

    fn abandon(&self, lifecycle: &mut Lifecycle<InfoGathering>, round: u32, message: String) {
        warn!(
            "subtask {}: info round {} abandoned: {}",
            lifecycle.subtask().id,
            round,
            message
        );
        lifecycle.record_error(ErrorKind::InfoGathering, format!("round {round}: {message}"));
    }

    /// One human interaction, plus a tool fetch for approved directory and
    /// file requests.
    async fn obtain(&self, request: &InfoRequest) -> Result<InfoResponse, OrchestrationError> {
        let port_err = |e: anyhow::Error| OrchestrationError::InfoGathering(format!("{e:#}"));
        self.checkpoint()?;

        if !request.kind.requires_approval() {
            let answer = self
                .ports
                .confirmation
                .prompt(&question_text(request))
                .await
                .map_err(port_err)?;
            let answer = answer.trim();
            return Ok(if answer.is_empty() {
                InfoResponse::declined(request.round, None)
            } else {
                InfoResponse::provided(request.round, answer, None)
            });
        }

        let target = request.target.as_deref().unwrap_or(".");
        let approved = self
            .ports
            .confirmation
            .confirm(&approval_text(request, target))
            .await
            .map_err(port_err)?;
        if !approved {
            info!("operator declined disclosure of {}", target);
            return Ok(InfoResponse::declined(request.round, Some(false)));
        }

        self.checkpoint()?;
        let tool = match request.kind {
            InfoKind::DirectoryListing => "list_directory",
            _ => "read_file",
        };
        let mut params = Map::new();
        params.insert("path".into(), Value::String(target.to_string()));
        let outcome = self
            .ports
            .tools
            .invoke(tool, &params)
            .await
            .map_err(port_err)?;
        if !outcome.success {
            return Err(OrchestrationError::InfoGathering(format!(
                "{tool} {target}: {}",
                outcome.error.unwrap_or_else(|| "failed".into())
            )));
        }
        Ok(InfoResponse::provided(
            request.round,
            outcome.payload.unwrap_or_default(),
            Some(true),
        ))
    }
}

fn question_text(request: &InfoRequest) -> String {
    if request.justification.is_empty() || request.justification == request.question {
        request.question.clone()
    } else {
        format!("{}\n({})", request.question, request.justification)
    }
}

fn approval_text(request: &InfoRequest, target: &str) -> String {
    let what = match request.kind {
        InfoKind::DirectoryListing => "list the directory",
        _ => "read the file",
    };
    let mut text = format!("Allow the assistant to {what} `{target}`?");
    if !request.justification.is_empty() {
        text.push_str(&format!("\nReason: {}", request.justification));
    }
    text
}
