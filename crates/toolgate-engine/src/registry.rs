use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use toolgate_core::{Decision, HookEvent, Invocation, SubagentReport, ToolOutcome};

use crate::context::SessionContext;
use crate::hook::Hook;

/// Result of threading one invocation through the before-chain.
#[derive(Debug, Clone, PartialEq)]
pub enum BeforeOutcome {
    /// The action may run, with the final payload after any rewrites.
    Proceed {
        invocation: Invocation,
        rewritten: bool,
    },
    /// Some hook refused the action.
    Blocked { hook: &'static str, reason: String },
}

impl BeforeOutcome {
    pub fn is_blocked(&self) -> bool {
        matches!(self, BeforeOutcome::Blocked { .. })
    }
}

/// Ordered collection of hooks. Registration order is chain order: each
/// before-hook sees the payload as mutated by the hooks before it, and the
/// first block wins.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> HookRegistry {
        HookRegistry { hooks: Vec::new() }
    }

    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub fn hooks_for(&self, event: HookEvent) -> impl Iterator<Item = &Arc<dyn Hook>> {
        self.hooks
            .iter()
            .filter(move |hook| hook.events().contains(&event))
    }

    pub fn has_hooks(&self, event: HookEvent) -> bool {
        self.hooks_for(event).next().is_some()
    }

    /// Run the before-chain. Hooks execute strictly in order; a rewrite
    /// replaces the payload for the rest of the chain; a block aborts it.
    /// Hook errors fail open (the payload passes unchanged), hook timeouts
    /// fail closed: an action that could not be vetted does not run.
    pub async fn dispatch_before(
        &self,
        ctx: &SessionContext,
        invocation: Invocation,
    ) -> BeforeOutcome {
        let mut current = invocation;
        let mut rewritten = false;

        for hook in self.hooks_for(HookEvent::PreTool) {
            let timeout = hook.timeout();
            match tokio::time::timeout(timeout, hook.before_tool(ctx, &current)).await {
                Ok(Ok(Decision::Allow)) => {}
                Ok(Ok(Decision::Rewrite(next))) => {
                    debug!(hook = hook.name(), "payload rewritten");
                    current = next;
                    rewritten = true;
                }
                Ok(Ok(Decision::Block { reason })) => {
                    return BeforeOutcome::Blocked {
                        hook: hook.name(),
                        reason,
                    };
                }
                Ok(Err(e)) => {
                    warn!(hook = hook.name(), error = %e, "before hook failed; passing through");
                }
                Err(_) => {
                    warn!(
                        hook = hook.name(),
                        timeout_ms = timeout.as_millis() as u64,
                        "before hook timed out; blocking"
                    );
                    return BeforeOutcome::Blocked {
                        hook: hook.name(),
                        reason: format!(
                            "hook '{}' timed out after {}s, so the action could not be vetted \
                             and was not run; retry the command",
                            hook.name(),
                            timeout.as_secs()
                        ),
                    };
                }
            }
        }

        BeforeOutcome::Proceed {
            invocation: current,
            rewritten,
        }
    }

    /// Run the after-chain for a completed invocation. Advisory only: every
    /// failure mode is absorbed and the remaining hooks still run.
    pub async fn dispatch_after(
        &self,
        ctx: &SessionContext,
        invocation: &Invocation,
        outcome: &ToolOutcome,
    ) {
        for hook in self.hooks_for(HookEvent::PostTool) {
            run_advisory(
                HookEvent::PostTool,
                hook.name(),
                hook.timeout(),
                hook.after_tool(ctx, invocation, outcome),
            )
            .await;
        }
    }

    pub async fn dispatch_session_start(&self, ctx: &SessionContext) {
        for hook in self.hooks_for(HookEvent::SessionStart) {
            run_advisory(
                HookEvent::SessionStart,
                hook.name(),
                hook.timeout(),
                hook.session_start(ctx),
            )
            .await;
        }
    }

    pub async fn dispatch_session_end(&self, ctx: &SessionContext) {
        for hook in self.hooks_for(HookEvent::SessionEnd) {
            run_advisory(
                HookEvent::SessionEnd,
                hook.name(),
                hook.timeout(),
                hook.session_end(ctx),
            )
            .await;
        }
    }

    pub async fn dispatch_subagent_stop(&self, ctx: &SessionContext, report: &SubagentReport) {
        for hook in self.hooks_for(HookEvent::SubagentStop) {
            run_advisory(
                HookEvent::SubagentStop,
                hook.name(),
                hook.timeout(),
                hook.subagent_stop(ctx, report),
            )
            .await;
        }
    }
}

/// Advisory execution: log and continue on both failure and timeout.
async fn run_advisory<F>(event: HookEvent, name: &str, timeout: Duration, fut: F)
where
    F: Future<Output = anyhow::Result<()>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(hook = name, event = %event, error = %e, "hook failed; continuing");
        }
        Err(_) => {
            warn!(
                hook = name,
                event = %event,
                timeout_ms = timeout.as_millis() as u64,
                "hook timed out; continuing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use toolgate_core::{param, ActionKind};
    use toolgate_store::StorePaths;

    fn make_ctx() -> SessionContext {
        SessionContext::new(
            "s1",
            None,
            std::path::PathBuf::from("."),
            StorePaths::at("/tmp/toolgate-test-store"),
        )
    }

    fn shell(cmd: &str) -> Invocation {
        Invocation::new(ActionKind::RunShellCommand, "s1").with_param(param::COMMAND, cmd)
    }

    struct AppendHook {
        name: &'static str,
        suffix: &'static str,
    }

    #[async_trait]
    impl Hook for AppendHook {
        fn name(&self) -> &'static str {
            self.name
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PreTool]
        }
        async fn before_tool(
            &self,
            _ctx: &SessionContext,
            inv: &Invocation,
        ) -> anyhow::Result<Decision> {
            let cmd = inv.command().unwrap_or_default();
            let mut next = inv.clone();
            next.set_param(param::COMMAND, format!("{cmd}{}", self.suffix));
            Ok(Decision::Rewrite(next))
        }
    }

    struct BlockHook;

    #[async_trait]
    impl Hook for BlockHook {
        fn name(&self) -> &'static str {
            "block"
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PreTool]
        }
        async fn before_tool(
            &self,
            _ctx: &SessionContext,
            _inv: &Invocation,
        ) -> anyhow::Result<Decision> {
            Ok(Decision::block("not allowed"))
        }
    }

    struct FailHook;

    #[async_trait]
    impl Hook for FailHook {
        fn name(&self) -> &'static str {
            "fail"
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PreTool, HookEvent::PostTool]
        }
        async fn before_tool(
            &self,
            _ctx: &SessionContext,
            _inv: &Invocation,
        ) -> anyhow::Result<Decision> {
            Err(anyhow!("boom"))
        }
        async fn after_tool(
            &self,
            _ctx: &SessionContext,
            _inv: &Invocation,
            _outcome: &ToolOutcome,
        ) -> anyhow::Result<()> {
            Err(anyhow!("boom"))
        }
    }

    struct SlowHook;

    #[async_trait]
    impl Hook for SlowHook {
        fn name(&self) -> &'static str {
            "slow"
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PreTool, HookEvent::PostTool]
        }
        fn timeout(&self) -> Duration {
            Duration::from_millis(20)
        }
        async fn before_tool(
            &self,
            _ctx: &SessionContext,
            _inv: &Invocation,
        ) -> anyhow::Result<Decision> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Decision::Allow)
        }
        async fn after_tool(
            &self,
            _ctx: &SessionContext,
            _inv: &Invocation,
            _outcome: &ToolOutcome,
        ) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    struct CountingHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Hook for CountingHook {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PostTool, HookEvent::SessionEnd]
        }
        async fn after_tool(
            &self,
            _ctx: &SessionContext,
            _inv: &Invocation,
            _outcome: &ToolOutcome,
        ) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn session_end(&self, _ctx: &SessionContext) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn before_chain_threads_rewrites_in_order() {
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(AppendHook {
            name: "first",
            suffix: " -a",
        }));
        registry.register(Arc::new(AppendHook {
            name: "second",
            suffix: " -b",
        }));

        let ctx = make_ctx();
        let outcome = registry.dispatch_before(&ctx, shell("ls")).await;
        match outcome {
            BeforeOutcome::Proceed {
                invocation,
                rewritten,
            } => {
                assert!(rewritten);
                assert_eq!(invocation.command(), Some("ls -a -b"));
            }
            other => panic!("expected proceed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn block_short_circuits_the_chain() {
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(BlockHook));
        registry.register(Arc::new(AppendHook {
            name: "late",
            suffix: " -x",
        }));

        let ctx = make_ctx();
        let outcome = registry.dispatch_before(&ctx, shell("ls")).await;
        assert_eq!(
            outcome,
            BeforeOutcome::Blocked {
                hook: "block",
                reason: "not allowed".to_string()
            }
        );
    }

    #[tokio::test]
    async fn before_error_fails_open() {
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(FailHook));

        let ctx = make_ctx();
        let outcome = registry.dispatch_before(&ctx, shell("ls")).await;
        match outcome {
            BeforeOutcome::Proceed {
                invocation,
                rewritten,
            } => {
                assert!(!rewritten);
                assert_eq!(invocation.command(), Some("ls"));
            }
            other => panic!("expected proceed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn before_timeout_fails_closed() {
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(SlowHook));

        let ctx = make_ctx();
        let outcome = registry.dispatch_before(&ctx, shell("ls")).await;
        match outcome {
            BeforeOutcome::Blocked { hook, reason } => {
                assert_eq!(hook, "slow");
                assert!(reason.contains("timed out"));
            }
            other => panic!("expected blocked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn after_failures_and_timeouts_do_not_stop_the_chain() {
        let counting = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
        });
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(FailHook));
        registry.register(Arc::new(SlowHook));
        registry.register(counting.clone());

        let ctx = make_ctx();
        let inv = shell("ls");
        registry.dispatch_after(&ctx, &inv, &ToolOutcome::ok()).await;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn session_end_reaches_subscribers_only() {
        let counting = Arc::new(CountingHook {
            calls: AtomicUsize::new(0),
        });
        let mut registry = HookRegistry::new();
        registry.register(counting.clone());
        registry.register(Arc::new(BlockHook));

        assert!(registry.has_hooks(HookEvent::SessionEnd));
        assert!(!registry.has_hooks(HookEvent::SubagentStop));

        let ctx = make_ctx();
        registry.dispatch_session_end(&ctx).await;
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }
}
