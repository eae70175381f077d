use serde_json::Value;
use tracing::{debug, warn};

use toolgate_core::{HookEvent, Invocation};
use toolgate_engine::{BeforeOutcome, HookRegistry, SessionContext};
use toolgate_store::StorePaths;

use crate::parse;

/// Exit status that tells the host to abort the pending action and show
/// stderr to the agent.
pub const BLOCK_EXIT_CODE: i32 = 2;

/// What the bridge process should emit before exiting.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BridgeResult {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: i32,
}

impl BridgeResult {
    /// Nothing to say: the action proceeds unchanged.
    pub fn empty() -> BridgeResult {
        BridgeResult::default()
    }

    /// JSON for the host on stdout, exit 0.
    pub fn output(stdout: String) -> BridgeResult {
        BridgeResult {
            stdout: Some(stdout),
            ..BridgeResult::default()
        }
    }

    /// Refuse the action: reason on stderr, blocking exit status.
    pub fn block(reason: String) -> BridgeResult {
        BridgeResult {
            stdout: None,
            stderr: Some(reason),
            exit_code: BLOCK_EXIT_CODE,
        }
    }

    pub fn is_block(&self) -> bool {
        self.exit_code == BLOCK_EXIT_CODE
    }
}

/// Decode one hook delivery from stdin and run it through the registry.
///
/// Unknown events and empty stdin return an empty result; a decode error
/// is the caller's to absorb (the host must never be broken by a bad
/// payload). Only a before-chain block produces a non-zero exit.
pub async fn handle_stdin(
    stdin: &str,
    store: StorePaths,
    registry: &HookRegistry,
) -> anyhow::Result<BridgeResult> {
    if stdin.trim().is_empty() {
        return Ok(BridgeResult::empty());
    }
    let raw = parse::parse_payload(stdin)?;
    let Some(event) = parse::host_event(&raw) else {
        debug!("unhandled hook event, passing through");
        return Ok(BridgeResult::empty());
    };

    let session_id = parse::session_id(&raw, std::env::var(parse::SESSION_ENV).ok().as_deref());
    let model = parse::model(&raw, std::env::var(parse::MODEL_ENV).ok().as_deref());
    if let Err(e) = store.ensure_dirs() {
        warn!(error = %e, "store directories unavailable");
    }
    let ctx = SessionContext::new(&session_id, model, parse::cwd(&raw), store);

    match event {
        HookEvent::PreTool => {
            let inv = parse::invocation(
                &raw,
                &session_id,
                std::env::var(parse::FILE_PATHS_ENV).ok().as_deref(),
            );
            let original = inv.clone();
            match registry.dispatch_before(&ctx, inv).await {
                BeforeOutcome::Proceed {
                    invocation,
                    rewritten: true,
                } => Ok(BridgeResult::output(updated_input_json(
                    &original,
                    &invocation,
                )?)),
                BeforeOutcome::Proceed { .. } => Ok(BridgeResult::empty()),
                BeforeOutcome::Blocked { hook, reason } => {
                    debug!(hook, "action blocked");
                    Ok(BridgeResult::block(reason))
                }
            }
        }
        HookEvent::PostTool => {
            let inv = parse::invocation(
                &raw,
                &session_id,
                std::env::var(parse::FILE_PATHS_ENV).ok().as_deref(),
            );
            let outcome = parse::outcome(&raw);
            registry.dispatch_after(&ctx, &inv, &outcome).await;
            Ok(BridgeResult::empty())
        }
        HookEvent::SessionStart => {
            registry.dispatch_session_start(&ctx).await;
            Ok(BridgeResult::empty())
        }
        HookEvent::SessionEnd => {
            registry.dispatch_session_end(&ctx).await;
            Ok(BridgeResult::empty())
        }
        HookEvent::SubagentStop => {
            let report = parse::subagent_report(&raw);
            registry.dispatch_subagent_stop(&ctx, &report).await;
            Ok(BridgeResult::empty())
        }
    }
}

/// Rewritten payloads go back to the host as an allow decision carrying
/// only the params the before-chain changed. Untouched fields are never
/// re-emitted, so their host-side values and types survive the round trip.
fn updated_input_json(original: &Invocation, rewritten: &Invocation) -> anyhow::Result<String> {
    let mut input = serde_json::Map::new();
    for (key, value) in &rewritten.params {
        if original.params.get(key) == Some(value) {
            continue;
        }
        let rendered = match value {
            Some(s) => Value::String(s.clone()),
            None => Value::Null,
        };
        input.insert(key.clone(), rendered);
    }
    let output = serde_json::json!({
        "hookSpecificOutput": {
            "hookEventName": "PreToolUse",
            "permissionDecision": "allow",
            "updatedInput": Value::Object(input),
        }
    });
    Ok(serde_json::to_string(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use toolgate_core::{param, ActionKind, Decision};
    use toolgate_engine::Hook;
    use toolgate_hooks::{default_registry, Config};

    fn store() -> (tempfile::TempDir, StorePaths) {
        let tmp = tempfile::tempdir().unwrap();
        let store = StorePaths::at(tmp.path());
        (tmp, store)
    }

    struct UpperHook;

    #[async_trait]
    impl Hook for UpperHook {
        fn name(&self) -> &'static str {
            "upper"
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PreTool]
        }
        async fn before_tool(
            &self,
            _ctx: &SessionContext,
            inv: &Invocation,
        ) -> anyhow::Result<Decision> {
            let Some(cmd) = inv.command() else {
                return Ok(Decision::Allow);
            };
            let mut next = inv.clone();
            next.set_param(param::COMMAND, cmd.to_uppercase());
            Ok(Decision::Rewrite(next))
        }
    }

    struct RefuseHook;

    #[async_trait]
    impl Hook for RefuseHook {
        fn name(&self) -> &'static str {
            "refuse"
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PreTool]
        }
        async fn before_tool(
            &self,
            _ctx: &SessionContext,
            _inv: &Invocation,
        ) -> anyhow::Result<Decision> {
            Ok(Decision::block("refused for the test"))
        }
    }

    #[tokio::test]
    async fn empty_stdin_passes_through() {
        let (_tmp, store) = store();
        let registry = HookRegistry::new();
        let result = handle_stdin("  \n", store, &registry).await.unwrap();
        assert_eq!(result, BridgeResult::empty());
    }

    #[tokio::test]
    async fn unknown_events_pass_through() {
        let (_tmp, store) = store();
        let registry = HookRegistry::new();
        let stdin = r#"{"session_id":"s1","hook_event_name":"PreCompact"}"#;
        let result = handle_stdin(stdin, store, &registry).await.unwrap();
        assert_eq!(result, BridgeResult::empty());
    }

    #[tokio::test]
    async fn malformed_stdin_is_an_error_for_the_caller() {
        let (_tmp, store) = store();
        let registry = HookRegistry::new();
        assert!(handle_stdin("not json", store, &registry).await.is_err());
    }

    #[tokio::test]
    async fn rewrites_come_back_as_updated_input() {
        let (_tmp, store) = store();
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(UpperHook));

        let stdin = json!({
            "sessionId": "s1",
            "hookEventName": "PreToolUse",
            "toolName": "Bash",
            "toolInput": {"command": "ls"}
        })
        .to_string();
        let result = handle_stdin(&stdin, store, &registry).await.unwrap();
        assert_eq!(result.exit_code, 0);
        let output: Value = serde_json::from_str(result.stdout.as_deref().unwrap()).unwrap();
        assert_eq!(
            output["hookSpecificOutput"]["permissionDecision"],
            "allow"
        );
        assert_eq!(
            output["hookSpecificOutput"]["updatedInput"]["command"],
            "LS"
        );
    }

    #[test]
    fn updated_input_carries_only_changed_params() {
        let original = Invocation::new(ActionKind::RunShellCommand, "s1")
            .with_param(param::COMMAND, "grep foo src/")
            .with_param(param::FILE_PATHS, "a.py\nb.py");
        let mut rewritten = original.clone();
        rewritten.set_param(param::COMMAND, "rg foo src/");

        let raw = updated_input_json(&original, &rewritten).unwrap();
        let output: Value = serde_json::from_str(&raw).unwrap();
        let updated = output["hookSpecificOutput"]["updatedInput"]
            .as_object()
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated["command"], "rg foo src/");
    }

    #[tokio::test]
    async fn rewrites_leave_untouched_typed_fields_to_the_host() {
        let (_tmp, store) = store();
        let registry = default_registry(&Config::default()).unwrap();

        let stdin = json!({
            "session_id": "s1",
            "hook_event_name": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": {
                "command": "grep -rn TODO src/",
                "timeout": 5000,
                "run_in_background": true
            }
        })
        .to_string();
        let result = handle_stdin(&stdin, store, &registry).await.unwrap();
        let output: Value = serde_json::from_str(result.stdout.as_deref().unwrap()).unwrap();
        let updated = output["hookSpecificOutput"]["updatedInput"]
            .as_object()
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated["command"], "rg -rn TODO src/");
    }

    #[tokio::test]
    async fn untouched_payloads_emit_nothing() {
        let (_tmp, store) = store();
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(UpperHook));

        let stdin = json!({
            "session_id": "s1",
            "hook_event_name": "PreToolUse",
            "tool_name": "Read",
            "tool_input": {"file_path": "a.txt"}
        })
        .to_string();
        let result = handle_stdin(&stdin, store, &registry).await.unwrap();
        assert_eq!(result, BridgeResult::empty());
    }

    #[tokio::test]
    async fn blocks_exit_two_with_the_reason_on_stderr() {
        let (_tmp, store) = store();
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(RefuseHook));

        let stdin = json!({
            "session_id": "s1",
            "hook_event_name": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": {"command": "ls"}
        })
        .to_string();
        let result = handle_stdin(&stdin, store, &registry).await.unwrap();
        assert!(result.is_block());
        assert_eq!(result.exit_code, BLOCK_EXIT_CODE);
        assert_eq!(result.stderr.as_deref(), Some("refused for the test"));
        assert!(result.stdout.is_none());
    }

    #[tokio::test]
    async fn default_stack_rewrites_grep_at_the_boundary() {
        let (_tmp, store) = store();
        let registry = default_registry(&Config::default()).unwrap();

        let stdin = json!({
            "session_id": "s1",
            "hook_event_name": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": {"command": "grep -rn TODO src/"}
        })
        .to_string();
        let result = handle_stdin(&stdin, store, &registry).await.unwrap();
        let output: Value = serde_json::from_str(result.stdout.as_deref().unwrap()).unwrap();
        assert_eq!(
            output["hookSpecificOutput"]["updatedInput"]["command"],
            "rg -rn TODO src/"
        );
    }

    #[tokio::test]
    async fn default_stack_blocks_malformed_commit_messages() {
        let (_tmp, store) = store();
        let registry = default_registry(&Config::default()).unwrap();

        let stdin = json!({
            "session_id": "s1",
            "hook_event_name": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": {"command": "git commit -m \"updated stuff\""}
        })
        .to_string();
        let result = handle_stdin(&stdin, store, &registry).await.unwrap();
        assert_eq!(result.exit_code, BLOCK_EXIT_CODE);
        let reason = result.stderr.unwrap();
        assert!(reason.contains("updated stuff"));
        assert!(reason.contains("feat(auth): add login endpoint"));
    }

    #[tokio::test]
    async fn post_tool_deliveries_reach_the_tool_log() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = default_registry(&Config::default()).unwrap();

        let stdin = json!({
            "session_id": "s-log",
            "hook_event_name": "PostToolUse",
            "tool_name": "Bash",
            "cwd": tmp.path().to_str().unwrap(),
            "tool_input": {"command": "cargo check"},
            "tool_response": {"output": "ok"}
        })
        .to_string();
        let result = handle_stdin(&stdin, StorePaths::at(tmp.path()), &registry)
            .await
            .unwrap();
        assert_eq!(result, BridgeResult::empty());

        let ctx = SessionContext::new(
            "s-log",
            None,
            tmp.path().to_path_buf(),
            StorePaths::at(tmp.path()),
        );
        let count: i64 = ctx
            .with_tool_log(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM tool_calls WHERE session_id = 's-log'",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn session_end_writes_the_summary_row() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = default_registry(&Config::default()).unwrap();

        let stdin = json!({
            "session_id": "s-end",
            "hook_event_name": "SessionEnd",
            "cwd": tmp.path().to_str().unwrap()
        })
        .to_string();
        let result = handle_stdin(&stdin, StorePaths::at(tmp.path()), &registry)
            .await
            .unwrap();
        assert_eq!(result, BridgeResult::empty());

        let ctx = SessionContext::new(
            "s-end",
            None,
            tmp.path().to_path_buf(),
            StorePaths::at(tmp.path()),
        );
        let summary: String = ctx
            .with_session_log(|conn| {
                Ok(conn.query_row(
                    "SELECT summary FROM sessions WHERE session_id = 's-end'",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert!(summary.contains("0 tools"));
    }

    #[tokio::test]
    async fn outcome_failures_still_get_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = default_registry(&Config::default()).unwrap();

        let stdin = json!({
            "session_id": "s-err",
            "hook_event_name": "PostToolUse",
            "tool_name": "Bash",
            "cwd": tmp.path().to_str().unwrap(),
            "tool_input": {"command": "exit 1"},
            "tool_response": {"is_error": true}
        })
        .to_string();
        handle_stdin(&stdin, StorePaths::at(tmp.path()), &registry)
            .await
            .unwrap();

        let ctx = SessionContext::new(
            "s-err",
            None,
            tmp.path().to_path_buf(),
            StorePaths::at(tmp.path()),
        );
        let success: bool = ctx
            .with_tool_log(|conn| {
                Ok(conn.query_row(
                    "SELECT success FROM tool_calls WHERE session_id = 's-err'",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert!(!success);
    }
}
