/// Append integration instructions to the prompt.
pub fn append_instructions(prompt: &mut String) {
    prompt.push_str("## Instructions\n\n");
    prompt.push_str(
        "Combine the subtask results above into one deliverable that answers the \
         requirement. Keep the order of the results. Mention any subtask that has \
         no result. Respond with the final document only.\n",
    );
}
