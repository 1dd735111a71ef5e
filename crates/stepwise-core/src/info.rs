use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of information a subtask asks for during an info-gathering round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoKind {
    /// Free-text clarification typed by the operator.
    Clarification,
    /// Data the operator submits (a value, a snippet, a table).
    UserData,
    /// Listing of a directory. Needs explicit approval first.
    DirectoryListing,
    /// Contents of a file. Needs explicit approval first.
    FileContent,
}

impl InfoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfoKind::Clarification => "natural_language",
            InfoKind::UserData => "user_data",
            InfoKind::DirectoryListing => "folder_content",
            InfoKind::FileContent => "open_file",
        }
    }

    /// Accepts the wire names plus the descriptive aliases.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "natural_language" | "clarification" => Some(InfoKind::Clarification),
            "user_data" | "data" => Some(InfoKind::UserData),
            "folder_content" | "directory_listing" | "directory" => {
                Some(InfoKind::DirectoryListing)
            }
            "open_file" | "file_content" | "file" => Some(InfoKind::FileContent),
            _ => None,
        }
    }

    /// Directory and file requests disclose local content, so the operator
    /// has to approve them before anything is fetched.
    pub fn requires_approval(&self) -> bool {
        matches!(self, InfoKind::DirectoryListing | InfoKind::FileContent)
    }
}

impl fmt::Display for InfoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoRequest {
    /// 1-based round number.
    pub round: u32,
    pub kind: InfoKind,
    pub question: String,
    pub justification: String,
    /// Path for directory/file requests.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub round: u32,
    pub value: Option<String>,
    /// Only set for kinds that require approval.
    pub approved: Option<bool>,
    pub declined: bool,
}

impl InfoResponse {
    pub fn provided(round: u32, value: impl Into<String>, approved: Option<bool>) -> Self {
        Self {
            round,
            value: Some(value.into()),
            approved,
            declined: false,
        }
    }

    pub fn declined(round: u32, approved: Option<bool>) -> Self {
        Self {
            round,
            value: None,
            approved,
            declined: true,
        }
    }
}

/// One complete round: what was asked and what came back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoExchange {
    pub subtask_id: String,
    pub request: InfoRequest,
    pub response: InfoResponse,
    pub recorded_at: DateTime<Utc>,
}
