use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use toolgate_analytics::{insert_subagent_run, SubagentRow};
use toolgate_core::{HookEvent, SubagentReport};
use toolgate_engine::{Hook, SessionContext};

/// Records every finished subagent run under its parent session.
pub struct SubagentTrackerHook;

#[async_trait]
impl Hook for SubagentTrackerHook {
    fn name(&self) -> &'static str {
        "subagent-tracker"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::SubagentStop]
    }

    async fn subagent_stop(&self, ctx: &SessionContext, report: &SubagentReport) -> Result<()> {
        let row = SubagentRow::from_report(ctx.session_id(), report);
        ctx.with_subagent_log(|conn| insert_subagent_run(conn, &row))
            .context("recording subagent run")?;
        info!(
            parent = %ctx.session_id(),
            kind = %row.subagent_type,
            files = row.file_count,
            "subagent run recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_store::StorePaths;

    #[tokio::test]
    async fn subagent_reports_accumulate_per_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = SessionContext::new(
            "parent",
            None,
            tmp.path().to_path_buf(),
            StorePaths::at(tmp.path()),
        );
        let hook = SubagentTrackerHook;

        let report = SubagentReport {
            subagent_type: "code-reviewer".to_string(),
            summary: Some("reviewed 3 files".to_string()),
            files_modified: vec!["a.rs".to_string(), "b.rs".to_string()],
        };
        hook.subagent_stop(&ctx, &report).await.unwrap();
        hook.subagent_stop(&ctx, &SubagentReport::default())
            .await
            .unwrap();

        let (count, kind): (i64, String) = ctx
            .with_subagent_log(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*), MAX(subagent_type) FROM subagent_runs
                     WHERE parent_session_id = 'parent'",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?)
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(kind, "code-reviewer");
    }
}
