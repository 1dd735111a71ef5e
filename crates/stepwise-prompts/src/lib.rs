pub mod context;
pub mod decompose;
pub mod dispatch;
pub mod info_need;
pub mod integrate;
pub mod validate;

pub use context::{ReasoningContext, RoundInfo, SubtaskBrief};
use stepwise_core::Purpose;

/// Assemble the full prompt for a given purpose and context.
pub fn assemble_prompt(purpose: Purpose, ctx: &ReasoningContext) -> String {
    let mut prompt = String::new();
    ctx.append_preamble(&mut prompt);

    match purpose {
        Purpose::Decompose => decompose::append_instructions(&mut prompt, ctx.max_subtasks),
        Purpose::CheckInfoNeed => info_need::append_instructions(&mut prompt),
        Purpose::ChooseMode => dispatch::append_mode_instructions(&mut prompt),
        Purpose::GenToolCall => dispatch::append_tool_call_instructions(&mut prompt),
        Purpose::Generate => dispatch::append_generate_instructions(&mut prompt),
        Purpose::Validate => validate::append_instructions(&mut prompt),
        Purpose::Integrate => integrate::append_instructions(&mut prompt),
    }

    prompt
}
