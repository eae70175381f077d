//! The built-in hooks: command rewriting, commit and delete guards,
//! post-edit formatting and test runs, and the analytics trackers.

pub mod commit_guard;
pub mod config;
pub mod delete_guard;
pub mod exec;
pub mod fmt;
pub mod rewrite;
pub mod session_summary;
pub mod subagent;
pub mod test_runner;
pub mod tracker;

pub use commit_guard::CommitGuardHook;
pub use config::Config;
pub use delete_guard::DeleteGuardHook;
pub use fmt::FmtHook;
pub use rewrite::RewriteHook;
pub use session_summary::SessionSummaryHook;
pub use subagent::SubagentTrackerHook;
pub use test_runner::TestRunnerHook;
pub use tracker::ToolCallTrackerHook;

use std::sync::Arc;

use toolgate_engine::{Hook, HookRegistry};

/// Build the standard registry. Before-hooks are registered guard first
/// so a blocked delete never reaches the rewriters; config can switch
/// individual hooks off by name.
pub fn default_registry(config: &Config) -> anyhow::Result<HookRegistry> {
    let hooks: Vec<Arc<dyn Hook>> = vec![
        Arc::new(DeleteGuardHook),
        Arc::new(RewriteHook),
        Arc::new(CommitGuardHook::new(&config.commit_types)?),
        Arc::new(FmtHook::new()),
        Arc::new(TestRunnerHook::new(config.test_file_threshold)),
        Arc::new(ToolCallTrackerHook),
        Arc::new(SessionSummaryHook),
        Arc::new(SubagentTrackerHook),
    ];

    let mut registry = HookRegistry::new();
    for hook in hooks {
        if config.hook_enabled(hook.name()) {
            registry.register(hook);
        }
    }
    Ok(registry)
}
