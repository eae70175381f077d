use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use toolgate_core::{Decision, HookEvent, Invocation, SubagentReport, ToolOutcome};

use crate::context::SessionContext;

/// Default per-invocation timeout. Hooks that shell out override this.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// A callback bound to one or more lifecycle events. Only the phases named
/// in [`Hook::events`] are dispatched; the rest keep their no-op defaults.
///
/// Before-hooks decide; everything else is side effects. A hook must never
/// panic its way out of a decision: internal errors are reported as `Err`
/// and the dispatcher fails open on them.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Stable name used in logs and block reasons.
    fn name(&self) -> &'static str;

    /// Events this hook subscribes to.
    fn events(&self) -> &[HookEvent];

    fn timeout(&self) -> Duration {
        DEFAULT_HOOK_TIMEOUT
    }

    /// Inspect a pending invocation. Runs only for [`HookEvent::PreTool`].
    async fn before_tool(&self, _ctx: &SessionContext, _inv: &Invocation) -> Result<Decision> {
        Ok(Decision::Allow)
    }

    /// React to a completed invocation. Runs only for [`HookEvent::PostTool`].
    async fn after_tool(
        &self,
        _ctx: &SessionContext,
        _inv: &Invocation,
        _outcome: &ToolOutcome,
    ) -> Result<()> {
        Ok(())
    }

    async fn session_start(&self, _ctx: &SessionContext) -> Result<()> {
        Ok(())
    }

    async fn session_end(&self, _ctx: &SessionContext) -> Result<()> {
        Ok(())
    }

    async fn subagent_stop(
        &self,
        _ctx: &SessionContext,
        _report: &SubagentReport,
    ) -> Result<()> {
        Ok(())
    }
}
