use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Well-known parameter names on an invocation payload.
pub mod param {
    pub const COMMAND: &str = "command";
    pub const FILE_PATH: &str = "file_path";
    pub const CONTENT: &str = "content";
    pub const PATTERN: &str = "pattern";
    pub const DESCRIPTION: &str = "description";
    /// Newline-separated batch of paths touched in one event, when the host
    /// supplies one.
    pub const FILE_PATHS: &str = "file_paths";
}

/// Session id used when the host supplies none.
pub const UNKNOWN_SESSION: &str = "unknown";

/// The kind of action the host is about to perform (or just performed).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    RunShellCommand,
    EditFile,
    WriteFile,
    ReadFile,
    Search,
    /// Host tool with no dedicated kind; carries the host's own tag.
    Other(String),
}

impl ActionKind {
    /// Canonical tag as stored in the analytics log.
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::RunShellCommand => "run-shell-command",
            ActionKind::EditFile => "edit-file",
            ActionKind::WriteFile => "write-file",
            ActionKind::ReadFile => "read-file",
            ActionKind::Search => "search",
            ActionKind::Other(tag) => tag,
        }
    }

    /// Map a host tool name to its action kind.
    pub fn from_tool_name(tool_name: &str) -> ActionKind {
        match tool_name {
            "Bash" => ActionKind::RunShellCommand,
            "Edit" | "MultiEdit" => ActionKind::EditFile,
            "Write" => ActionKind::WriteFile,
            "Read" => ActionKind::ReadFile,
            "Grep" | "Glob" => ActionKind::Search,
            other => ActionKind::Other(other.to_string()),
        }
    }

    /// True for the kinds that mutate file contents.
    pub fn mutates_files(&self) -> bool {
        matches!(self, ActionKind::EditFile | ActionKind::WriteFile)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending (or completed) host action as seen by hooks.
///
/// Parameter values are `None` when the host sent an explicit null.
/// The payload is never mutated in place: a rewriting hook returns a
/// replacement and the dispatcher threads it onward.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub action: ActionKind,
    pub params: BTreeMap<String, Option<String>>,
    pub session_id: String,
}

impl Invocation {
    pub fn new(action: ActionKind, session_id: impl Into<String>) -> Self {
        Invocation {
            action,
            params: BTreeMap::new(),
            session_id: session_id.into(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), Some(value.into()));
        self
    }

    pub fn set_param(&mut self, key: &str, value: impl Into<String>) {
        self.params.insert(key.to_string(), Some(value.into()));
    }

    /// Parameter lookup; absent keys and explicit nulls both yield `None`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_deref())
    }

    pub fn command(&self) -> Option<&str> {
        self.param(param::COMMAND)
    }

    pub fn file_path(&self) -> Option<&str> {
        self.param(param::FILE_PATH)
    }

    /// Canonical JSON rendering of the parameter map (keys sorted by the
    /// BTreeMap ordering), as stored in the analytics log.
    pub fn params_json(&self) -> String {
        serde_json::to_string(&self.params).expect("string map serialization should not fail")
    }
}

/// What a before-hook decided about a pending invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// No change, chain continues.
    Allow,
    /// Replacement payload, threaded to the next hook.
    Rewrite(Invocation),
    /// Abort the action; the reason is surfaced to the developer verbatim.
    Block { reason: String },
}

impl Decision {
    pub fn block(reason: impl Into<String>) -> Decision {
        Decision::Block {
            reason: reason.into(),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Decision::Block { .. })
    }
}

/// Opaque result of a completed action, handed to after-hooks.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub success: bool,
    pub response: serde_json::Value,
}

impl ToolOutcome {
    pub fn ok() -> ToolOutcome {
        ToolOutcome {
            success: true,
            response: serde_json::Value::Null,
        }
    }

    pub fn from_response(response: serde_json::Value) -> ToolOutcome {
        let success = response
            .get("is_error")
            .or_else(|| response.get("isError"))
            .and_then(|v| v.as_bool())
            .map(|e| !e)
            .unwrap_or(true);
        ToolOutcome { success, response }
    }
}

/// What a finished subagent reported back to its parent session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubagentReport {
    pub subagent_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files_modified: Vec<String>,
}
