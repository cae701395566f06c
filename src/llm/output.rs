//! Classification of generator replies into plain text or a tool request.

use serde_json::{Map, Value};

/// A tool invocation requested by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub args: Map<String, Value>,
}

impl ToolCallRequest {
    /// Arguments rendered as compact JSON, used in confirmation prompts.
    pub fn args_display(&self) -> String {
        Value::Object(self.args.clone()).to_string()
    }
}

/// Parsed generator reply.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorOutput {
    PlainText(String),
    ToolRequest(ToolCallRequest),
}

impl GeneratorOutput {
    /// Classify a raw reply.
    ///
    /// A tool request is a single JSON object with a string `tool` field and
    /// an optional object `args`, optionally wrapped in a triple-backtick
    /// fence with a language tag. Anything else, including truncated or
    /// otherwise invalid JSON, is plain text carrying the raw reply.
    pub fn parse(raw: &str) -> Self {
        match parse_tool_request(raw) {
            Some(request) => Self::ToolRequest(request),
            None => Self::PlainText(raw.to_owned()),
        }
    }
}

fn parse_tool_request(raw: &str) -> Option<ToolCallRequest> {
    let body = strip_code_fence(raw.trim());
    if !body.starts_with('{') {
        return None;
    }
    let Value::Object(mut object) = serde_json::from_str::<Value>(body).ok()? else {
        return None;
    };

    let tool_name = object.get("tool")?.as_str()?.trim().to_owned();
    if tool_name.is_empty() {
        return None;
    }
    let args = match object.remove("args") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args,
        Some(_) => return None,
    };
    Some(ToolCallRequest { tool_name, args })
}

/// Remove a surrounding ```` ```lang ... ``` ```` fence if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the language tag: everything up to the first newline or `{`.
    let tag_end = rest
        .find(|c: char| c == '\n' || c == '{')
        .unwrap_or(rest.len());
    let rest = &rest[tag_end..];
    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
