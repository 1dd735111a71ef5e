use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::info::InfoKind;

/// Where a context entry came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContextSource {
    Requirement,
    PriorResult {
        subtask_id: String,
    },
    Gathered {
        round: u32,
        info_kind: InfoKind,
        declined: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub source: ContextSource,
    pub content: String,
    pub recorded_at: DateTime<Utc>,
}

impl ContextEntry {
    pub fn requirement(text: impl Into<String>) -> Self {
        Self::new(ContextSource::Requirement, text)
    }

    pub fn prior_result(subtask_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(
            ContextSource::PriorResult {
                subtask_id: subtask_id.into(),
            },
            payload,
        )
    }

    pub fn gathered(round: u32, info_kind: InfoKind, value: impl Into<String>) -> Self {
        Self::new(
            ContextSource::Gathered {
                round,
                info_kind,
                declined: false,
            },
            value,
        )
    }

    /// Explicit marker that the operator declined to answer a round.
    pub fn declined(round: u32, info_kind: InfoKind, question: &str) -> Self {
        Self::new(
            ContextSource::Gathered {
                round,
                info_kind,
                declined: true,
            },
            format!("declined: {question}"),
        )
    }

    fn new(source: ContextSource, content: impl Into<String>) -> Self {
        Self {
            source,
            content: content.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn is_declined(&self) -> bool {
        matches!(self.source, ContextSource::Gathered { declined: true, .. })
    }
}

/// Ordered, append-only log of context entries.
///
/// There is no way to remove or overwrite an entry once pushed; the only
/// mutation is `push`, which is crate-private so that appends happen through
/// the subtask lifecycle or the run's memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextLog {
    entries: Vec<ContextEntry>,
}

impl ContextLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: ContextEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContextEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ContextEntry> {
        self.entries.last()
    }
}

impl<'a> IntoIterator for &'a ContextLog {
    type Item = &'a ContextEntry;
    type IntoIter = std::slice::Iter<'a, ContextEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
