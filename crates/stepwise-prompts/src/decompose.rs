/// Append decomposition instructions to the prompt.
pub fn append_instructions(prompt: &mut String, max_subtasks: Option<usize>) {
    prompt.push_str("## Instructions\n\n");
    prompt.push_str(
        "Break the requirement above into an ordered list of subtasks. \
         Each subtask must be small enough to finish with a single tool call \
         or a single piece of generated content.\n\n\
         Return ONLY the todo list, in exactly this format:\n\n\
         <update_todo_list>\n\
         <todos>\n\
         1. [ ] first subtask description => expected output\n\
         2. [ ] second subtask description => expected output\n\
         </todos>\n\
         </update_todo_list>\n\n\
         Every line needs a status marker: `[ ]` pending, `[-]` in progress, `[x]` done. \
         The `=> expected output` part is optional but preferred.\n",
    );
    if let Some(max) = max_subtasks {
        prompt.push_str(&format!("Use at most {max} subtasks.\n"));
    }
}
