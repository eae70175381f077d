/// Lifecycle events a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before a tool call executes. The only blocking-capable phase.
    PreTool,
    /// After a tool call completes. Side effects only.
    PostTool,
    SessionStart,
    SessionEnd,
    /// A subagent spawned by this session finished.
    SubagentStop,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::PreTool => "pre-tool",
            HookEvent::PostTool => "post-tool",
            HookEvent::SessionStart => "session-start",
            HookEvent::SessionEnd => "session-end",
            HookEvent::SubagentStop => "subagent-stop",
        }
    }

    /// Whether a hook in this phase may abort the pending action. Timeouts
    /// fail closed here and fail open everywhere else.
    pub fn blocking_capable(&self) -> bool {
        matches!(self, HookEvent::PreTool)
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
