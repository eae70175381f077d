use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use toolgate_analytics::{insert_tool_call, ToolCallRow};
use toolgate_core::{HookEvent, Invocation, ToolOutcome};
use toolgate_engine::{Hook, SessionContext};

/// After-hook that appends every completed action to the tool-call log.
pub struct ToolCallTrackerHook;

#[async_trait]
impl Hook for ToolCallTrackerHook {
    fn name(&self) -> &'static str {
        "tool-tracker"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PostTool]
    }

    async fn after_tool(
        &self,
        ctx: &SessionContext,
        inv: &Invocation,
        outcome: &ToolOutcome,
    ) -> Result<()> {
        let row = ToolCallRow::from_invocation(inv, outcome);
        ctx.with_tool_log(|conn| insert_tool_call(conn, &row))
            .context("recording tool call")?;
        debug!(action = %inv.action, session = %inv.session_id, "tool call recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_core::{param, ActionKind};
    use toolgate_store::StorePaths;

    #[tokio::test]
    async fn completed_actions_land_in_the_log() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = SessionContext::new(
            "s1",
            None,
            tmp.path().to_path_buf(),
            StorePaths::at(tmp.path()),
        );
        let hook = ToolCallTrackerHook;

        let edit = Invocation::new(ActionKind::EditFile, "s1")
            .with_param(param::FILE_PATH, "src/lib.rs");
        hook.after_tool(&ctx, &edit, &toolgate_core::ToolOutcome::ok())
            .await
            .unwrap();
        let shell = Invocation::new(ActionKind::RunShellCommand, "s1")
            .with_param(param::COMMAND, "cargo check");
        hook.after_tool(&ctx, &shell, &toolgate_core::ToolOutcome::ok())
            .await
            .unwrap();

        let count: i64 = ctx
            .with_tool_log(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM tool_calls", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 2);
    }
}
