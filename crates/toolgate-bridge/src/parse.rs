use std::path::PathBuf;

use serde_json::Value;

use toolgate_core::{param, ActionKind, HookEvent, Invocation, SubagentReport, ToolOutcome};

/// Fallback session id when the payload carries none.
pub const SESSION_ENV: &str = "CLAUDE_SESSION_ID";
/// Fallback model name when the payload carries none.
pub const MODEL_ENV: &str = "CLAUDE_MODEL";
/// Space-separated batch of files the host touched, set for some events.
pub const FILE_PATHS_ENV: &str = "CLAUDE_FILE_PATHS";

pub(crate) fn parse_payload(stdin: &str) -> anyhow::Result<Value> {
    let val: Value = serde_json::from_str(stdin)?;
    Ok(val)
}

/// Get a string field from JSON, trying snake_case first then camelCase.
/// Claude Code sends camelCase (e.g. `hookEventName`); internal tests and
/// older payloads use snake_case.
pub(crate) fn get_str(v: &Value, snake_key: &str) -> String {
    if let Some(s) = v.get(snake_key).and_then(|x| x.as_str()) {
        return s.to_string();
    }
    let camel = snake_to_camel(snake_key);
    v.get(&camel)
        .and_then(|x| x.as_str())
        .unwrap_or("")
        .to_string()
}

pub(crate) fn snake_to_camel(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    for ch in s.chars() {
        if ch == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

/// Map the host's event name to a hook phase. Events outside the contract
/// (PreCompact, UserPromptSubmit, ...) yield `None` and pass silently.
pub fn host_event(v: &Value) -> Option<HookEvent> {
    match get_str(v, "hook_event_name").as_str() {
        "PreToolUse" => Some(HookEvent::PreTool),
        "PostToolUse" => Some(HookEvent::PostTool),
        "SessionStart" => Some(HookEvent::SessionStart),
        "SessionEnd" => Some(HookEvent::SessionEnd),
        "SubagentStop" => Some(HookEvent::SubagentStop),
        _ => None,
    }
}

/// Session id from the payload, the environment, or the fixed fallback.
pub fn session_id(v: &Value, env: Option<&str>) -> String {
    let from_payload = get_str(v, "session_id");
    if !from_payload.is_empty() {
        return from_payload;
    }
    match env {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => toolgate_core::UNKNOWN_SESSION.to_string(),
    }
}

pub fn model(v: &Value, env: Option<&str>) -> Option<String> {
    let from_payload = get_str(v, "model");
    if !from_payload.is_empty() {
        return Some(from_payload);
    }
    env.filter(|m| !m.is_empty()).map(String::from)
}

pub fn cwd(v: &Value) -> PathBuf {
    let raw = get_str(v, "cwd");
    if raw.is_empty() {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    } else {
        PathBuf::from(raw)
    }
}

/// Build the invocation from `tool_name` and `tool_input`. String values
/// pass through, nulls become absent-but-present keys, everything else is
/// stored in its JSON rendering. A file batch from the environment lands
/// in the multi-path parameter.
pub fn invocation(v: &Value, session_id: &str, file_paths_env: Option<&str>) -> Invocation {
    let action = ActionKind::from_tool_name(&get_str(v, "tool_name"));
    let mut inv = Invocation::new(action, session_id);

    let input = v
        .get("tool_input")
        .or_else(|| v.get("toolInput"))
        .and_then(|i| i.as_object());
    if let Some(input) = input {
        for (key, value) in input {
            let stored = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
            inv.params.insert(key.clone(), stored);
        }
    }

    if let Some(batch) = file_paths_env.filter(|b| !b.trim().is_empty()) {
        let joined = batch.split_whitespace().collect::<Vec<_>>().join("\n");
        inv.set_param(param::FILE_PATHS, joined);
    }
    inv
}

pub fn outcome(v: &Value) -> ToolOutcome {
    let response = v
        .get("tool_response")
        .or_else(|| v.get("toolResponse"))
        .cloned()
        .unwrap_or(Value::Null);
    ToolOutcome::from_response(response)
}

pub fn subagent_report(v: &Value) -> SubagentReport {
    let files = v
        .get("files_modified")
        .or_else(|| v.get("filesModified"))
        .and_then(|f| f.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|x| x.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let summary = Some(get_str(v, "summary")).filter(|s| !s.is_empty());
    SubagentReport {
        subagent_type: get_str(v, "subagent_type"),
        summary,
        files_modified: files,
    }
}
