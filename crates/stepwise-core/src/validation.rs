use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which check produced the final verdict of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Automated,
    Human,
    /// Validation infrastructure was unavailable; treated as a pass.
    Skipped,
}

impl VerdictSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictSource::Automated => "automated",
            VerdictSource::Human => "human",
            VerdictSource::Skipped => "skipped",
        }
    }
}

impl fmt::Display for VerdictSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Execution attempt this report belongs to (1-based).
    pub attempt: u32,
    pub is_valid: bool,
    pub score: f64,
    pub findings: Vec<String>,
    pub suggestions: Vec<String>,
    pub narrative: String,
    pub source: VerdictSource,
    /// The machine verdict, kept even when a human overrides it.
    #[serde(default)]
    pub automated_valid: Option<bool>,
    pub created_at: DateTime<Utc>,
}

impl ValidationReport {
    pub fn automated(
        attempt: u32,
        is_valid: bool,
        score: f64,
        findings: Vec<String>,
        suggestions: Vec<String>,
        narrative: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            is_valid,
            score: clamp_score(score),
            findings,
            suggestions,
            narrative: narrative.into(),
            source: VerdictSource::Automated,
            automated_valid: Some(is_valid),
            created_at: Utc::now(),
        }
    }

    /// Report for a run where only the human check is configured.
    pub fn human(attempt: u32, accepted: bool) -> Self {
        Self {
            attempt,
            is_valid: accepted,
            score: if accepted { 1.0 } else { 0.0 },
            findings: Vec::new(),
            suggestions: Vec::new(),
            narrative: human_note(accepted).to_string(),
            source: VerdictSource::Human,
            automated_valid: None,
            created_at: Utc::now(),
        }
    }

    pub fn skipped(attempt: u32, reason: impl Into<String>) -> Self {
        Self {
            attempt,
            is_valid: true,
            score: 0.0,
            findings: Vec::new(),
            suggestions: Vec::new(),
            narrative: format!("validation skipped: {}", reason.into()),
            source: VerdictSource::Skipped,
            automated_valid: None,
            created_at: Utc::now(),
        }
    }

    /// Apply a human decision on top of an automated report. The human
    /// decision becomes the verdict; the automated flag is preserved.
    pub fn with_human_decision(mut self, accepted: bool) -> Self {
        self.is_valid = accepted;
        self.source = VerdictSource::Human;
        if !self.narrative.is_empty() {
            self.narrative.push_str("\n\n");
        }
        self.narrative.push_str(human_note(accepted));
        self
    }
}

fn human_note(accepted: bool) -> &'static str {
    if accepted {
        "human decision: accepted"
    } else {
        "human decision: rejected"
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}
