use serde::Serialize;
use stepwise_core::{ContextEntry, ContextSource, ResultSection, Subtask, ToolSpec};

/// The subtask a reasoning call is about.
#[derive(Debug, Clone, Serialize)]
pub struct SubtaskBrief {
    pub position: u32,
    pub description: String,
    pub expected_output: String,
}

/// Where an info-gathering call sits in the loop.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RoundInfo {
    pub round: u32,
    pub max_rounds: u32,
}

/// Everything handed to the Reasoning Port for one call.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningContext {
    pub requirement: String,
    pub subtask: Option<SubtaskBrief>,
    /// The subtask's accumulated context, in append order.
    pub entries: Vec<ContextEntry>,
    pub round: Option<RoundInfo>,
    pub tools: Vec<ToolSpec>,
    /// Result under validation.
    pub result: Option<String>,
    /// Per-subtask results to integrate, in original order.
    pub sections: Vec<ResultSection>,
    pub max_subtasks: Option<usize>,
}

impl ReasoningContext {
    pub fn for_requirement(requirement: impl Into<String>) -> Self {
        Self {
            requirement: requirement.into(),
            subtask: None,
            entries: Vec::new(),
            round: None,
            tools: Vec::new(),
            result: None,
            sections: Vec::new(),
            max_subtasks: None,
        }
    }

    pub fn for_subtask(requirement: impl Into<String>, subtask: &Subtask) -> Self {
        let mut ctx = Self::for_requirement(requirement);
        ctx.subtask = Some(SubtaskBrief {
            position: subtask.position,
            description: subtask.description.clone(),
            expected_output: subtask.expected_output.clone(),
        });
        ctx.entries = subtask.context().entries().to_vec();
        ctx
    }

    pub fn with_round(mut self, round: u32, max_rounds: u32) -> Self {
        self.round = Some(RoundInfo { round, max_rounds });
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_sections(mut self, sections: Vec<ResultSection>) -> Self {
        self.sections = sections;
        self
    }

    pub fn with_max_subtasks(mut self, max: usize) -> Self {
        self.max_subtasks = Some(max);
        self
    }

    /// Render the shared preamble: requirement, subtask, context, tools,
    /// result and sections, skipping whatever is absent.
    pub fn append_preamble(&self, prompt: &mut String) {
        prompt.push_str(&format!("# Requirement\n\n{}\n\n", self.requirement.trim()));

        if let Some(ref subtask) = self.subtask {
            prompt.push_str(&format!(
                "# Subtask {}: {}\n\n",
                subtask.position + 1,
                subtask.description
            ));
            if !subtask.expected_output.is_empty() {
                prompt.push_str(&format!("Expected output: {}\n\n", subtask.expected_output));
            }
        }

        // The seeded requirement entry repeats the heading above.
        let entries: Vec<&ContextEntry> = self
            .entries
            .iter()
            .filter(|e| {
                !(e.source == ContextSource::Requirement
                    && e.content.trim() == self.requirement.trim())
            })
            .collect();
        if !entries.is_empty() {
            prompt.push_str("## Context\n\n");
            for (i, entry) in entries.iter().enumerate() {
                prompt.push_str(&format!(
                    "{}. [{}] {}\n",
                    i + 1,
                    source_label(&entry.source),
                    entry.content
                ));
            }
            prompt.push('\n');
        }

        if let Some(round) = self.round {
            prompt.push_str(&format!(
                "Information round {} of {}.\n\n",
                round.round, round.max_rounds
            ));
        }

        if !self.tools.is_empty() {
            prompt.push_str("## Available Tools\n\n");
            for tool in &self.tools {
                prompt.push_str(&format!("- `{}`: {}\n", tool.name, tool.description));
                prompt.push_str(&format!("  parameters: {}\n", tool.parameters));
            }
            prompt.push('\n');
        }

        if let Some(ref result) = self.result {
            prompt.push_str("## Result\n\n");
            prompt.push_str(result);
            prompt.push_str("\n\n");
        }

        if !self.sections.is_empty() {
            prompt.push_str("## Subtask Results\n\n");
            for (i, section) in self.sections.iter().enumerate() {
                prompt.push_str(&format!("### {}. {}\n\n", i + 1, section.description));
                match (&section.payload, &section.failure) {
                    (Some(payload), _) => prompt.push_str(payload),
                    (None, Some(failure)) => prompt.push_str(&format!("(no result: {failure})")),
                    (None, None) => prompt.push_str("(no result)"),
                }
                prompt.push_str("\n\n");
            }
        }
    }

    /// The preamble on its own, as the structured text of a port call.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.append_preamble(&mut out);
        out
    }
}

fn source_label(source: &ContextSource) -> String {
    match source {
        ContextSource::Requirement => "requirement".into(),
        ContextSource::PriorResult { .. } => "previous result".into(),
        ContextSource::Gathered {
            round,
            info_kind,
            declined: true,
        } => format!("round {round} {info_kind}, declined"),
        ContextSource::Gathered {
            round, info_kind, ..
        } => format!("round {round} {info_kind}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::{InfoKind, Lifecycle, SubtaskSpec};

    #[test]
    fn preamble_minimal() {
        let out = ReasoningContext::for_requirement("Write a haiku").render();
        assert!(out.contains("# Requirement"));
        assert!(out.contains("Write a haiku"));
        assert!(!out.contains("# Subtask"));
        assert!(!out.contains("## Context"));
        assert!(!out.contains("## Available Tools"));
    }

    #[test]
    fn preamble_with_subtask() {
        let st = Subtask::new(
            "run-1",
            2,
            &SubtaskSpec::new("Draft the outline").with_expected_output("markdown list"),
        );
        let out = ReasoningContext::for_subtask("Write a report", &st).render();
        assert!(out.contains("# Subtask 3: Draft the outline"));
        assert!(out.contains("Expected output: markdown list"));
    }

    #[test]
    fn preamble_labels_context_entries() {
        let mut ctx = ReasoningContext::for_requirement("req");
        ctx.entries = vec![
            ContextEntry::requirement("req"),
            ContextEntry::prior_result("st-0", "outline done"),
            ContextEntry::gathered(1, InfoKind::UserData, "42"),
            ContextEntry::declined(2, InfoKind::FileContent, "open notes.txt?"),
        ];
        let out = ctx.with_round(3, 5).render();
        assert!(!out.contains("[requirement]"));
        assert!(out.contains("1. [previous result] outline done"));
        assert!(out.contains("2. [round 1 user_data] 42"));
        assert!(out.contains("3. [round 2 open_file, declined] declined: open notes.txt?"));
        assert!(out.contains("Information round 3 of 5."));
    }

    #[test]
    fn seeded_requirement_is_rendered_once() {
        let st = Subtask::new("run-1", 0, &SubtaskSpec::new("Write hello.txt"));
        let mut lifecycle = Lifecycle::new(st, 1).unwrap();
        lifecycle.seed(ContextEntry::requirement("Produce a hello-world file"));
        let requirement = "Produce a hello-world file";
        let out = ReasoningContext::for_subtask(requirement, lifecycle.subtask()).render();
        assert_eq!(out.matches(requirement).count(), 1);
        assert!(!out.contains("## Context"));
    }

    #[test]
    fn differing_requirement_entry_is_kept() {
        let mut ctx = ReasoningContext::for_requirement("req");
        ctx.entries = vec![ContextEntry::requirement("an earlier wording")];
        let out = ctx.render();
        assert!(out.contains("1. [requirement] an earlier wording"));
    }

    #[test]
    fn preamble_with_tools() {
        let ctx = ReasoningContext::for_requirement("req").with_tools(vec![ToolSpec {
            name: "write_file".into(),
            description: "Write a file".into(),
            parameters: serde_json::json!({"type": "object"}),
        }]);
        let out = ctx.render();
        assert!(out.contains("## Available Tools"));
        assert!(out.contains("- `write_file`: Write a file"));
        assert!(out.contains(r#"{"type":"object"}"#));
    }

    #[test]
    fn preamble_with_sections_in_order() {
        let ctx = ReasoningContext::for_requirement("req").with_sections(vec![
            ResultSection {
                subtask_id: "a".into(),
                description: "first".into(),
                payload: Some("alpha".into()),
                failure: None,
            },
            ResultSection {
                subtask_id: "b".into(),
                description: "second".into(),
                payload: None,
                failure: Some("cancelled".into()),
            },
        ]);
        let out = ctx.render();
        let a = out.find("### 1. first").unwrap();
        let b = out.find("### 2. second").unwrap();
        assert!(a < b);
        assert!(out.contains("(no result: cancelled)"));
    }
}
