/// Append info-need check instructions to the prompt.
pub fn append_instructions(prompt: &mut String) {
    prompt.push_str("## Instructions\n\n");
    prompt.push_str(
        "Decide whether the context above is enough to carry out the subtask. \
         If it is not, ask for exactly one piece of information.\n\n\
         Respond with a single JSON object and nothing else:\n\n\
         ```json\n\
         {\"need_info\": true, \"info_type\": \"natural_language\", \
         \"reason\": \"why it is needed\", \"question\": \"what to ask the operator\", \
         \"target\": null}\n\
         ```\n\n\
         `info_type` is one of:\n\
         - `natural_language`: a free-text clarification from the operator\n\
         - `user_data`: a value or data the operator has to supply\n\
         - `folder_content`: a directory listing; put the directory in `target`\n\
         - `open_file`: the contents of a file; put the path in `target`\n\n\
         When nothing more is needed, respond with `{\"need_info\": false}`.\n",
    );
}
