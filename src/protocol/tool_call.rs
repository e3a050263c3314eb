//! Tool-call and done-marker blocks embedded in model text
//!
//! A model asks for a tool by writing one delimited block:
//!
//! ```text
//! <tool_call>
//! <tool_name>execute_code</tool_name>
//! <parameters>
//! <language>python</language>
//! <code>print(2 + 2)</code>
//! </parameters>
//! </tool_call>
//! ```
//!
//! and ends its own run with `<done>summary</done>`.
//!
//! Parsing is first-match-wins: only the first complete `<tool_call>` block
//! is honored. A block that is unterminated or has no tool name is treated
//! as absent, never as an error.

use std::collections::BTreeMap;

use crate::tools::ToolInvocation;

const TOOL_CALL_OPEN: &str = "<tool_call>";
const TOOL_CALL_CLOSE: &str = "</tool_call>";
const DONE_OPEN: &str = "<done>";
const DONE_CLOSE: &str = "</done>";

/// Everything the agent loop needs to know about one model response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedResponse {
    /// First well-formed tool call, if any
    pub tool_call: Option<ToolInvocation>,
    /// Content of the first well-formed done block, if any
    pub done: Option<String>,
    /// Response text with protocol blocks removed, for display
    pub display: String,
}

impl ParsedResponse {
    /// True when the model neither called a tool nor signalled completion
    pub fn is_plain_answer(&self) -> bool {
        self.tool_call.is_none() && self.done.is_none()
    }
}

/// Parse one raw model response
pub fn parse_response(raw: &str) -> ParsedResponse {
    ParsedResponse {
        tool_call: parse_tool_call(raw),
        done: parse_done(raw),
        display: strip_protocol_blocks(raw),
    }
}

/// Extract the first tool call from model text
pub fn parse_tool_call(text: &str) -> Option<ToolInvocation> {
    let body = find_block(text, TOOL_CALL_OPEN, TOOL_CALL_CLOSE)?;

    let name = find_block(body, "<tool_name>", "</tool_name>")?.trim();
    if name.is_empty() {
        return None;
    }

    let arguments = match find_block(body, "<parameters>", "</parameters>") {
        Some(params) => parse_fields(params),
        None => BTreeMap::new(),
    };

    Some(ToolInvocation::new(name, arguments))
}

/// Extract the summary of the first done block
///
/// An empty `<done></done>` still counts as completion.
pub fn parse_done(text: &str) -> Option<String> {
    find_block(text, DONE_OPEN, DONE_CLOSE).map(|s| s.trim().to_string())
}

/// Remove tool-call and done blocks (and anything unterminated after them)
pub fn strip_protocol_blocks(text: &str) -> String {
    let without_calls = remove_blocks(text, TOOL_CALL_OPEN, TOOL_CALL_CLOSE);
    let without_done = remove_blocks(&without_calls, DONE_OPEN, DONE_CLOSE);
    without_done.trim().to_string()
}

/// Render an invocation back into the wire format
///
/// Used when a provider returns a native tool call so the transcript keeps a
/// single textual protocol.
pub fn render_tool_call(invocation: &ToolInvocation) -> String {
    let mut out = String::new();
    out.push_str(TOOL_CALL_OPEN);
    out.push('\n');
    out.push_str(&format!("<tool_name>{}</tool_name>\n", invocation.name));
    out.push_str("<parameters>\n");
    for (key, value) in &invocation.arguments {
        out.push_str(&format!("<{key}>{value}</{key}>\n"));
    }
    out.push_str("</parameters>\n");
    out.push_str(TOOL_CALL_CLOSE);
    out
}

/// Return the text between the first `open` and the first `close` after it
fn find_block<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let len = text[start..].find(close)?;
    Some(&text[start..start + len])
}

/// Parse a run of `<key>value</key>` fields
///
/// Text between fields is ignored. A field whose closing tag is missing ends
/// parsing; everything read up to that point is kept.
fn parse_fields(body: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let mut rest = body;

    while let Some(open_at) = rest.find('<') {
        let after_open = &rest[open_at + 1..];
        let Some(name_len) = after_open.find('>') else {
            break;
        };
        let key = &after_open[..name_len];
        if !is_field_name(key) {
            rest = &after_open[name_len + 1..];
            continue;
        }

        let value_start = &after_open[name_len + 1..];
        let close = format!("</{key}>");
        let Some(value_len) = value_start.find(&close) else {
            break;
        };

        let value = trim_newlines(&value_start[..value_len]);
        fields.entry(key.to_string()).or_insert_with(|| value.to_string());
        rest = &value_start[value_len + close.len()..];
    }

    fields
}

fn is_field_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Strip surrounding line breaks but keep indentation (it matters for Python)
fn trim_newlines(value: &str) -> &str {
    value.trim_matches(|c| c == '\n' || c == '\r')
}

fn remove_blocks(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(open) {
        out.push_str(&rest[..start]);
        match rest[start..].find(close) {
            Some(end) => rest = &rest[start + end + close.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}
