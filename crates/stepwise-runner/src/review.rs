//! Human review of a decomposed plan.
//!
//! The operator answers with an edit script: commands separated by `;`,
//! indices 1-based and resolved against the plan as it stands after the
//! previous command.
//!
//! ```text
//! move 3 1; merge 1 2; delete 4; add write a README; edit 2 compile the binary
//! ```

use stepwise_core::SubtaskSpec;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::OrchestrationError;
use crate::ports::ConfirmationPort;

#[derive(Debug, Clone, PartialEq)]
pub enum PlanEdit {
    Move { from: usize, to: usize },
    Merge { into: usize, from: usize },
    Delete(usize),
    Add(String),
    Edit(usize, String),
}

fn invalid(msg: impl Into<String>) -> OrchestrationError {
    OrchestrationError::InvalidEdit(msg.into())
}

fn index(token: Option<&str>, command: &str) -> Result<usize, OrchestrationError> {
    let token = token.ok_or_else(|| invalid(format!("`{command}` needs an item number")))?;
    match token.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(format!("`{token}` is not an item number"))),
    }
}

/// Parse an edit script. An empty script parses to no edits.
pub fn parse_edits(script: &str) -> Result<Vec<PlanEdit>, OrchestrationError> {
    let mut edits = Vec::new();
    for command in script.split(';').map(str::trim).filter(|c| !c.is_empty()) {
        let (verb, rest) = match command.split_once(char::is_whitespace) {
            Some((v, r)) => (v, r.trim()),
            None => (command, ""),
        };
        let mut args = rest.split_whitespace();
        let edit = match verb.to_ascii_lowercase().as_str() {
            "move" => PlanEdit::Move {
                from: index(args.next(), command)?,
                to: index(args.next(), command)?,
            },
            "merge" => PlanEdit::Merge {
                into: index(args.next(), command)?,
                from: index(args.next(), command)?,
            },
            "delete" => PlanEdit::Delete(index(args.next(), command)?),
            "add" => {
                if rest.is_empty() {
                    return Err(invalid("`add` needs a description"));
                }
                PlanEdit::Add(rest.to_string())
            }
            "edit" => {
                let (n, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| invalid(format!("`{command}` needs a number and text")))?;
                PlanEdit::Edit(index(Some(n), command)?, text.trim().to_string())
            }
            other => return Err(invalid(format!("unknown command `{other}`"))),
        };
        let fixed_arity = matches!(
            edit,
            PlanEdit::Move { .. } | PlanEdit::Merge { .. } | PlanEdit::Delete(_)
        );
        if fixed_arity && args.next().is_some() {
            return Err(invalid(format!("too many arguments in `{command}`")));
        }
        edits.push(edit);
    }
    Ok(edits)
}

fn check(n: usize, len: usize) -> Result<usize, OrchestrationError> {
    if n == 0 || n > len {
        return Err(invalid(format!("item {n} is out of range (plan has {len})")));
    }
    Ok(n - 1)
}

fn join(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a}; {b}"),
    }
}

/// Apply an edit script to a plan. Edits are authoritative and applied once.
pub fn apply_edits(
    mut specs: Vec<SubtaskSpec>,
    script: &str,
) -> Result<Vec<SubtaskSpec>, OrchestrationError> {
    for edit in parse_edits(script)? {
        match edit {
            PlanEdit::Move { from, to } => {
                let from = check(from, specs.len())?;
                let to = check(to, specs.len())?;
                let item = specs.remove(from);
                specs.insert(to, item);
            }
            PlanEdit::Merge { into, from } => {
                let into = check(into, specs.len())?;
                let from = check(from, specs.len())?;
                if into == from {
                    return Err(invalid("cannot merge an item into itself"));
                }
                let other = specs.remove(from);
                let target = if from < into { into - 1 } else { into };
                let item = &mut specs[target];
                item.description = join(&item.description, &other.description);
                item.expected_output = join(&item.expected_output, &other.expected_output);
            }
            PlanEdit::Delete(n) => {
                let n = check(n, specs.len())?;
                specs.remove(n);
            }
            PlanEdit::Add(text) => specs.push(SubtaskSpec::new(text)),
            PlanEdit::Edit(n, text) => {
                let n = check(n, specs.len())?;
                specs[n].description = text;
            }
        }
    }
    if specs.is_empty() {
        return Err(invalid("edits left the plan empty"));
    }
    Ok(specs)
}

/// Numbered plan as shown to the operator.
pub fn render_plan(specs: &[SubtaskSpec]) -> String {
    let mut out = String::from("Proposed plan:\n");
    for (i, spec) in specs.iter().enumerate() {
        out.push_str(&format!("{:>3}. {}", i + 1, spec.description));
        if !spec.expected_output.is_empty() {
            out.push_str(&format!(" => {}", spec.expected_output));
        }
        out.push('\n');
    }
    out
}

pub const EDIT_PROMPT: &str =
    "Edit the plan (move A B; merge A B; delete A; add TEXT; edit A TEXT), or press enter to accept:";

/// Show the plan and apply whatever the operator types. A confirmation
/// port failure keeps the plan unchanged.
pub async fn review_plan(
    confirmation: &dyn ConfirmationPort,
    specs: Vec<SubtaskSpec>,
    cancel: &CancellationToken,
) -> Result<Vec<SubtaskSpec>, OrchestrationError> {
    if cancel.is_cancelled() {
        return Err(OrchestrationError::Cancelled);
    }
    if let Err(e) = confirmation.display(&render_plan(&specs)).await {
        warn!("could not display plan, keeping it as proposed: {e:#}");
        return Ok(specs);
    }
    if cancel.is_cancelled() {
        return Err(OrchestrationError::Cancelled);
    }
    let script = match confirmation.prompt(EDIT_PROMPT).await {
        Ok(script) => script,
        Err(e) => {
            warn!("plan review unavailable, keeping it as proposed: {e:#}");
            return Ok(specs);
        }
    };
    let before = specs.len();
    let edited = apply_edits(specs, &script)?;
    if !script.trim().is_empty() {
        info!("plan edited: {} -> {} subtasks", before, edited.len());
    }
    Ok(edited)
}
