/// Append validation instructions to the prompt.
pub fn append_instructions(prompt: &mut String) {
    prompt.push_str("## Instructions\n\n");
    prompt.push_str(
        "Assess whether the result above fulfils the subtask and its expected output.\n\n\
         Respond with a single JSON object and nothing else:\n\n\
         ```json\n\
         {\"is_valid\": true, \"score\": 0.9, \"findings\": [\"...\"], \
         \"suggestions\": [\"...\"], \"narrative\": \"short assessment\"}\n\
         ```\n\n\
         `score` is between 0.0 and 1.0. `findings` lists concrete problems; \
         `suggestions` lists improvements. Both may be empty.\n",
    );
}
