use std::fmt;

use serde::{Deserialize, Serialize};

/// Why the core is calling the Reasoning Port. Each purpose expects a
/// different response shape back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Decompose,
    CheckInfoNeed,
    ChooseMode,
    Generate,
    GenToolCall,
    Validate,
    Integrate,
}

impl Purpose {
    pub const ALL: &[Purpose] = &[
        Purpose::Decompose,
        Purpose::CheckInfoNeed,
        Purpose::ChooseMode,
        Purpose::Generate,
        Purpose::GenToolCall,
        Purpose::Validate,
        Purpose::Integrate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Decompose => "decompose",
            Purpose::CheckInfoNeed => "check_info_need",
            Purpose::ChooseMode => "choose_mode",
            Purpose::Generate => "generate",
            Purpose::GenToolCall => "gen_tool_call",
            Purpose::Validate => "validate",
            Purpose::Integrate => "integrate",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "decompose" => Some(Purpose::Decompose),
            "check_info_need" => Some(Purpose::CheckInfoNeed),
            "choose_mode" => Some(Purpose::ChooseMode),
            "generate" => Some(Purpose::Generate),
            "gen_tool_call" => Some(Purpose::GenToolCall),
            "validate" => Some(Purpose::Validate),
            "integrate" => Some(Purpose::Integrate),
            _ => None,
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
