use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use toolgate_analytics::{aggregate_session, upsert_session, SessionSummary};
use toolgate_core::HookEvent;
use toolgate_engine::{Hook, SessionContext};

/// Session-end hook that rolls the session's tool calls up into one
/// summary row. Re-delivered session-end events overwrite the previous
/// row instead of stacking duplicates.
pub struct SessionSummaryHook;

#[async_trait]
impl Hook for SessionSummaryHook {
    fn name(&self) -> &'static str {
        "session-summary"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::SessionEnd]
    }

    async fn session_end(&self, ctx: &SessionContext) -> Result<()> {
        let agg = ctx
            .with_tool_log(|conn| aggregate_session(conn, ctx.session_id()))
            .context("aggregating session activity")?;
        let row = SessionSummary::new(ctx.session_id(), ctx.model().map(String::from), &agg);
        ctx.with_session_log(|conn| upsert_session(conn, &row))
            .context("writing session summary")?;
        info!(
            session = %ctx.session_id(),
            tools = agg.tool_count,
            files = agg.file_count,
            commands = agg.command_count,
            "session summarized"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_analytics::{get_session, insert_tool_call, ToolCallRow};
    use toolgate_core::{param, ActionKind, Invocation, ToolOutcome};
    use toolgate_store::StorePaths;

    #[tokio::test]
    async fn session_end_writes_one_summary_row() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = SessionContext::new(
            "s1",
            Some("model-a".to_string()),
            tmp.path().to_path_buf(),
            StorePaths::at(tmp.path()),
        );

        let edit = Invocation::new(ActionKind::EditFile, "s1")
            .with_param(param::FILE_PATH, "src/lib.rs");
        let shell = Invocation::new(ActionKind::RunShellCommand, "s1")
            .with_param(param::COMMAND, "cargo check");
        ctx.with_tool_log(|conn| {
            insert_tool_call(conn, &ToolCallRow::from_invocation(&edit, &ToolOutcome::ok()))?;
            insert_tool_call(conn, &ToolCallRow::from_invocation(&shell, &ToolOutcome::ok()))
        })
        .unwrap();

        let hook = SessionSummaryHook;
        hook.session_end(&ctx).await.unwrap();
        // delivered twice, still one row
        hook.session_end(&ctx).await.unwrap();

        let row = ctx
            .with_session_log(|conn| get_session(conn, "s1"))
            .unwrap()
            .unwrap();
        assert_eq!(row.tool_count, 2);
        assert_eq!(row.file_count, 1);
        assert_eq!(row.command_count, 1);
        assert_eq!(row.model.as_deref(), Some("model-a"));
        assert!(row.summary.contains("2 tools"));

        let rows: i64 = ctx
            .with_session_log(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn empty_sessions_summarize_to_zeroes() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = SessionContext::new(
            "quiet",
            None,
            tmp.path().to_path_buf(),
            StorePaths::at(tmp.path()),
        );
        SessionSummaryHook.session_end(&ctx).await.unwrap();
        let row = ctx
            .with_session_log(|conn| get_session(conn, "quiet"))
            .unwrap()
            .unwrap();
        assert_eq!(row.tool_count, 0);
        assert_eq!(row.duration_seconds, 0);
    }
}
