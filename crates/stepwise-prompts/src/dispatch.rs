/// Instructions for choosing the execution mode.
pub fn append_mode_instructions(prompt: &mut String) {
    prompt.push_str("## Instructions\n\n");
    prompt.push_str(
        "Choose how to carry out the subtask.\n\n\
         - `tool`: the subtask is a concrete operation one of the available tools performs \
         (reading, listing or writing files).\n\
         - `generated`: the subtask asks for content you write directly.\n\n\
         Respond with the single word `tool` or `generated` and nothing else.\n",
    );
}

/// Instructions for producing a structured tool call.
pub fn append_tool_call_instructions(prompt: &mut String) {
    prompt.push_str("## Instructions\n\n");
    prompt.push_str(
        "Produce the tool invocation that carries out the subtask. Use only a tool \
         listed under Available Tools and only the parameters its schema declares.\n\n\
         Respond with a single JSON object and nothing else:\n\n\
         ```json\n\
         {\"tool\": \"write_file\", \"parameters\": {\"path\": \"hello.txt\", \"content\": \"...\"}}\n\
         ```\n",
    );
}

/// Instructions for generating content directly.
pub fn append_generate_instructions(prompt: &mut String) {
    prompt.push_str("## Instructions\n\n");
    prompt.push_str(
        "Write the content the subtask asks for. Use the context above, including \
         any previous result, so the output continues the earlier work. \
         Respond with the content only, without commentary.\n",
    );
}
