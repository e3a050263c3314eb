//! System prompts

/// Default system prompt for a tool-using agent
pub const DEFAULT_AGENT_SYSTEM_PROMPT: &str = r#"You are a capable software agent with access to a sandboxed execution environment and a private working directory.

Work step by step. Use tools to calculate, verify results, inspect files and run code instead of guessing. If a tool reports an error, read it and fix the problem."#;

const PROTOCOL_INSTRUCTIONS: &str = r#"## How to use tools

To call a tool, write exactly one block like this and then stop writing:

<tool_call>
<tool_name>execute_code</tool_name>
<parameters>
<language>python</language>
<code>print(2 + 2)</code>
</parameters>
</tool_call>

Only the first tool call in a reply is executed. Its result arrives in the next message.

When the task is complete, reply with:

<done>a short summary of what you did and the final answer</done>"#;

/// Full system prompt: role prompt, tool protocol and tool manual
pub fn build_system_prompt(role_prompt: Option<&str>, tool_manual: &str) -> String {
    let role_prompt = role_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_AGENT_SYSTEM_PROMPT);
    format!("{role_prompt}\n\n{PROTOCOL_INSTRUCTIONS}\n\n## Available tools\n\n{tool_manual}")
}

/// Wrap a tool result as the synthetic user turn fed back to the model
pub fn tool_result_turn(tool: &str, output: &str, is_error: bool) -> String {
    let status = if is_error { "error" } else { "ok" };
    format!("<tool_result tool=\"{tool}\" status=\"{status}\">\n{output}\n</tool_result>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_prompt_keeps_protocol() {
        let prompt = build_system_prompt(Some("You build APIs."), "### run_shell\n");
        assert!(prompt.starts_with("You build APIs."));
        assert!(prompt.contains("<tool_call>"));
        assert!(prompt.ends_with("### run_shell\n"));
    }

    #[test]
    fn test_blank_prompt_falls_back() {
        let prompt = build_system_prompt(Some("   "), "");
        assert!(prompt.starts_with(DEFAULT_AGENT_SYSTEM_PROMPT));
    }
}
