//! Parsers for Reasoning Port responses, one per purpose.

use serde::Deserialize;
use stepwise_core::{
    ExecutionMode, InfoKind, InfoRequest, Purpose, SubtaskSpec, TodoMarker, ToolCall,
    ValidationReport,
};

use crate::error::FormatError;

/// Parse a decomposition todo list.
///
/// Expects:
/// ```text
/// <update_todo_list>
/// <todos>
/// 1. [ ] description => expected output
/// 2. [-] description
/// </todos>
/// </update_todo_list>
/// ```
pub fn parse_todo_list(text: &str, max_items: usize) -> Result<Vec<SubtaskSpec>, FormatError> {
    let err = |msg: String| FormatError::new(Purpose::Decompose, msg);

    let start = text
        .find("<todos>")
        .ok_or_else(|| err("missing <todos> element".into()))?;
    let body = &text[start + "<todos>".len()..];
    let end = body
        .find("</todos>")
        .ok_or_else(|| err("missing </todos> element".into()))?;
    let body = &body[..end];

    let mut specs = Vec::new();
    for (n, line) in body.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let item = strip_number(trimmed);
        let (marker, rest) = split_marker(item)
            .ok_or_else(|| err(format!("line {}: missing status marker: {trimmed}", n + 1)))?;

        let (description, expected) = match rest.split_once("=>") {
            Some((d, e)) => (d.trim(), e.trim()),
            None => (rest.trim(), ""),
        };
        if description.is_empty() {
            return Err(err(format!("line {}: empty description", n + 1)));
        }
        specs.push(SubtaskSpec {
            description: description.to_string(),
            expected_output: expected.to_string(),
            marker,
        });
    }

    if specs.is_empty() {
        return Err(err("todo list has no items".into()));
    }
    if specs.len() > max_items {
        return Err(err(format!(
            "todo list has {} items, limit is {max_items}",
            specs.len()
        )));
    }
    Ok(specs)
}

/// Strip a leading `N.` / `N)` / `-` list prefix.
fn strip_number(line: &str) -> &str {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
        return line;
    }
    match line.strip_prefix("- [") {
        Some(_) => line[2..].trim_start(),
        None => line,
    }
}

fn split_marker(item: &str) -> Option<(TodoMarker, &str)> {
    let rest = item.strip_prefix('[')?;
    let mut chars = rest.char_indices();
    let (_, c) = chars.next()?;
    let (close, bracket) = chars.next()?;
    if bracket != ']' {
        return None;
    }
    let marker = TodoMarker::from_char(c)?;
    Some((marker, &rest[close + 1..]))
}

#[derive(Deserialize)]
struct RawInfoNeed {
    need_info: bool,
    #[serde(default)]
    info_type: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

/// Parse a check_info_need response. `None` means no more information is
/// needed.
pub fn parse_info_need(text: &str, round: u32) -> Result<Option<InfoRequest>, FormatError> {
    let err = |msg: String| FormatError::new(Purpose::CheckInfoNeed, msg);

    let raw: RawInfoNeed =
        serde_json::from_str(extract_json(text)).map_err(|e| err(e.to_string()))?;
    if !raw.need_info {
        return Ok(None);
    }

    let kind_str = raw
        .info_type
        .ok_or_else(|| err("need_info is true but info_type is missing".into()))?;
    let kind = InfoKind::parse_str(&kind_str)
        .ok_or_else(|| err(format!("unknown info_type `{kind_str}`")))?;

    let reason = raw.reason.unwrap_or_default().trim().to_string();
    let question = match raw.question.map(|q| q.trim().to_string()) {
        Some(q) if !q.is_empty() => q,
        _ if !reason.is_empty() => reason.clone(),
        _ => return Err(err("need_info is true but no question was given".into())),
    };

    let target = raw
        .target
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let target = match kind {
        InfoKind::DirectoryListing => Some(target.unwrap_or_else(|| ".".into())),
        InfoKind::FileContent => Some(
            target.ok_or_else(|| err("open_file request without a target path".into()))?,
        ),
        InfoKind::Clarification | InfoKind::UserData => target,
    };

    Ok(Some(InfoRequest {
        round,
        kind,
        question,
        justification: reason,
        target,
    }))
}

/// Parse a choose_mode response: exactly `tool` or `generated`.
pub fn parse_mode(text: &str) -> Result<ExecutionMode, FormatError> {
    let token = text
        .trim()
        .trim_end_matches('.')
        .trim_matches(|c| c == '`' || c == '"' || c == '\'')
        .trim()
        .to_lowercase();
    ExecutionMode::parse_str(&token).ok_or_else(|| {
        FormatError::new(
            Purpose::ChooseMode,
            format!("expected `tool` or `generated`, got `{}`", text.trim()),
        )
    })
}

/// Parse a gen_tool_call response into a tool name and parameters.
pub fn parse_tool_call(text: &str) -> Result<ToolCall, FormatError> {
    let err = |msg: String| FormatError::new(Purpose::GenToolCall, msg);
    let call: ToolCall = serde_json::from_str(extract_json(text)).map_err(|e| err(e.to_string()))?;
    if call.tool.trim().is_empty() {
        return Err(err("empty tool name".into()));
    }
    Ok(call)
}

#[derive(Deserialize)]
struct RawValidation {
    is_valid: bool,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    findings: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    narrative: String,
}

/// Parse a validate response into an automated report for `attempt`.
pub fn parse_validation(text: &str, attempt: u32) -> Result<ValidationReport, FormatError> {
    let raw: RawValidation = serde_json::from_str(extract_json(text))
        .map_err(|e| FormatError::new(Purpose::Validate, e.to_string()))?;
    let score = raw
        .score
        .unwrap_or(if raw.is_valid { 1.0 } else { 0.0 });
    Ok(ValidationReport::automated(
        attempt,
        raw.is_valid,
        score,
        raw.findings,
        raw.suggestions,
        raw.narrative,
    ))
}

/// Free-text responses (generate, integrate) only need to be non-empty.
pub fn parse_free_text(purpose: Purpose, text: &str) -> Result<String, FormatError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(FormatError::new(purpose, "empty response"));
    }
    Ok(trimmed.to_string())
}

/// Pull a JSON object out of a response that may wrap it in a fenced code
/// block or surrounding prose.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(open), Some(close)) if open < close => &trimmed[open..=close],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TODOS: &str = "<update_todo_list>
<todos>
1. [ ] Create the file hello.txt => a file containing Hello, world!
2. [-] Check the file exists
3. [x] Report back
</todos>
</update_todo_list>";

    #[test]
    fn todo_list_basic() {
        let specs = parse_todo_list(TODOS, 20).unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].description, "Create the file hello.txt");
        assert_eq!(specs[0].expected_output, "a file containing Hello, world!");
        assert_eq!(specs[0].marker, TodoMarker::Pending);
        assert_eq!(specs[1].marker, TodoMarker::InProgress);
        assert_eq!(specs[1].expected_output, "");
        assert_eq!(specs[2].marker, TodoMarker::Done);
    }

    #[test]
    fn todo_list_without_numbers() {
        let text = "<update_todo_list><todos>[ ] only task</todos></update_todo_list>";
        let specs = parse_todo_list(text, 20).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].description, "only task");
    }

    #[test]
    fn todo_list_with_dash_bullets() {
        let text = "<todos>\n- [ ] one\n- [x] two\n</todos>";
        let specs = parse_todo_list(text, 20).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].marker, TodoMarker::Done);
    }

    #[test]
    fn todo_list_missing_todos() {
        let err = parse_todo_list("1. [ ] something", 20).unwrap_err();
        assert_eq!(err.purpose, Purpose::Decompose);
        assert!(err.message.contains("<todos>"));
    }

    #[test]
    fn todo_list_empty_is_error() {
        let err = parse_todo_list("<todos>\n\n</todos>", 20).unwrap_err();
        assert!(err.message.contains("no items"));
    }

    #[test]
    fn todo_list_line_without_marker_is_error() {
        let err = parse_todo_list("<todos>\n1. do the thing\n</todos>", 20).unwrap_err();
        assert!(err.message.contains("missing status marker"));
    }

    #[test]
    fn todo_list_unknown_marker_is_error() {
        assert!(parse_todo_list("<todos>[?] maybe</todos>", 20).is_err());
    }

    #[test]
    fn todo_list_over_limit_is_error() {
        let err = parse_todo_list(TODOS, 2).unwrap_err();
        assert!(err.message.contains("limit is 2"));
    }

    #[test]
    fn info_need_false() {
        assert!(parse_info_need(r#"{"need_info": false}"#, 1).unwrap().is_none());
    }

    #[test]
    fn info_need_in_fenced_block() {
        let text = "Sure.\n```json\n{\"need_info\": true, \"info_type\": \"user_data\", \
                    \"reason\": \"need a name\", \"question\": \"What file name?\"}\n```";
        let req = parse_info_need(text, 2).unwrap().unwrap();
        assert_eq!(req.round, 2);
        assert_eq!(req.kind, InfoKind::UserData);
        assert_eq!(req.question, "What file name?");
        assert_eq!(req.justification, "need a name");
        assert!(req.target.is_none());
    }

    #[test]
    fn info_need_question_falls_back_to_reason() {
        let text = r#"{"need_info": true, "info_type": "natural_language", "reason": "Which language?"}"#;
        let req = parse_info_need(text, 1).unwrap().unwrap();
        assert_eq!(req.question, "Which language?");
    }

    #[test]
    fn info_need_directory_defaults_to_root() {
        let text = r#"{"need_info": true, "info_type": "folder_content", "reason": "see files", "question": "list?"}"#;
        let req = parse_info_need(text, 1).unwrap().unwrap();
        assert_eq!(req.target.as_deref(), Some("."));
    }

    #[test]
    fn info_need_file_requires_target() {
        let text = r#"{"need_info": true, "info_type": "open_file", "reason": "r", "question": "q"}"#;
        assert!(parse_info_need(text, 1).is_err());
    }

    #[test]
    fn info_need_unknown_kind_is_error() {
        let text = r#"{"need_info": true, "info_type": "database", "question": "q"}"#;
        let err = parse_info_need(text, 1).unwrap_err();
        assert!(err.message.contains("database"));
    }

    #[test]
    fn info_need_garbage_is_error() {
        assert!(parse_info_need("I think we need more info", 1).is_err());
    }

    #[test]
    fn mode_tokens() {
        assert_eq!(parse_mode("tool").unwrap(), ExecutionMode::Tool);
        assert_eq!(parse_mode("  Generated.\n").unwrap(), ExecutionMode::Generated);
        assert_eq!(parse_mode("`tool`").unwrap(), ExecutionMode::Tool);
        assert_eq!(parse_mode("\"generated\"").unwrap(), ExecutionMode::Generated);
    }

    #[test]
    fn mode_rejects_anything_else() {
        assert!(parse_mode("both").is_err());
        assert!(parse_mode("use a tool").is_err());
        assert!(parse_mode("").is_err());
    }

    #[test]
    fn tool_call_with_parameters() {
        let text = r#"```json
{"tool": "write_file", "parameters": {"path": "hello.txt", "content": "Hello, world!"}}
```"#;
        let call = parse_tool_call(text).unwrap();
        assert_eq!(call.tool, "write_file");
        assert_eq!(call.parameters["path"], "hello.txt");
    }

    #[test]
    fn tool_call_missing_name_is_error() {
        assert!(parse_tool_call(r#"{"parameters": {}}"#).is_err());
        assert!(parse_tool_call(r#"{"tool": " "}"#).is_err());
    }

    #[test]
    fn validation_report_fields() {
        let text = r#"{"is_valid": false, "score": 1.4, "findings": ["no greeting"],
                       "suggestions": ["add greeting"], "narrative": "incomplete"}"#;
        let report = parse_validation(text, 2).unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.score, 1.0);
        assert_eq!(report.attempt, 2);
        assert_eq!(report.findings, vec!["no greeting".to_string()]);
        assert_eq!(report.narrative, "incomplete");
    }

    #[test]
    fn validation_score_defaults_from_flag() {
        let report = parse_validation(r#"{"is_valid": true}"#, 1).unwrap();
        assert_eq!(report.score, 1.0);
        assert!(report.findings.is_empty());
    }

    #[test]
    fn free_text_must_be_non_empty() {
        assert_eq!(parse_free_text(Purpose::Generate, "  text \n").unwrap(), "text");
        let err = parse_free_text(Purpose::Integrate, "   ").unwrap_err();
        assert_eq!(err.purpose, Purpose::Integrate);
    }
}
