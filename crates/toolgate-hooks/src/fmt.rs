use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use toolgate_core::{HookEvent, Invocation, ToolOutcome};
use toolgate_engine::{Hook, SessionContext};

use crate::exec::{run_shell, sh_quote};

/// How long one formatter run may take before it is killed.
const TOOL_TIMEOUT: Duration = Duration::from_secs(45);

/// A formatter program and its fixed arguments; the target path is
/// appended last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatterCmd {
    pub program: &'static str,
    pub args: &'static [&'static str],
}

const PRETTIER: FormatterCmd = FormatterCmd {
    program: "prettier",
    args: &["--write"],
};

const DEFAULT_RULES: &[(&str, FormatterCmd)] = &[
    (
        "py",
        FormatterCmd {
            program: "black",
            args: &[],
        },
    ),
    ("js", PRETTIER),
    ("jsx", PRETTIER),
    ("ts", PRETTIER),
    ("tsx", PRETTIER),
    ("json", PRETTIER),
    ("css", PRETTIER),
    ("md", PRETTIER),
    (
        "go",
        FormatterCmd {
            program: "gofmt",
            args: &["-w"],
        },
    ),
    (
        "rs",
        FormatterCmd {
            program: "rustfmt",
            args: &["--edition", "2021"],
        },
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("extension '{0}' is mapped to more than one formatter")]
    DuplicateExtension(String),
}

/// Extension-to-formatter map. Construction rejects tables where an
/// extension appears twice, so each file matches at most one formatter.
#[derive(Debug, Clone)]
pub struct FormatterTable {
    rules: BTreeMap<String, FormatterCmd>,
}

impl FormatterTable {
    pub fn from_rules(rules: &[(&str, FormatterCmd)]) -> Result<FormatterTable, TableError> {
        let mut map = BTreeMap::new();
        for (ext, cmd) in rules {
            if map.insert(ext.to_string(), *cmd).is_some() {
                return Err(TableError::DuplicateExtension(ext.to_string()));
            }
        }
        Ok(FormatterTable { rules: map })
    }

    pub fn with_defaults() -> FormatterTable {
        FormatterTable::from_rules(DEFAULT_RULES).expect("default formatter rules should not collide")
    }

    /// Shell command that formats `path` in place, or `None` when no
    /// formatter claims the extension.
    pub fn command_for(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let cmd = self.rules.get(&ext)?;
        let mut parts = Vec::with_capacity(cmd.args.len() + 2);
        parts.push(cmd.program.to_string());
        parts.extend(cmd.args.iter().map(|a| a.to_string()));
        parts.push(sh_quote(&path.to_string_lossy()));
        Some(parts.join(" "))
    }
}

/// After-hook that reformats a file once the host has finished writing
/// it. Formatter failures are logged and swallowed; the edit itself has
/// already happened and is never rolled back.
pub struct FmtHook {
    table: FormatterTable,
    tool_timeout: Duration,
}

impl FmtHook {
    pub fn new() -> FmtHook {
        FmtHook::with_table(FormatterTable::with_defaults())
    }

    pub fn with_table(table: FormatterTable) -> FmtHook {
        FmtHook {
            table,
            tool_timeout: TOOL_TIMEOUT,
        }
    }
}

impl Default for FmtHook {
    fn default() -> Self {
        FmtHook::new()
    }
}

#[async_trait]
impl Hook for FmtHook {
    fn name(&self) -> &'static str {
        "auto-format"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PostTool]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(60)
    }

    async fn after_tool(
        &self,
        ctx: &SessionContext,
        inv: &Invocation,
        outcome: &ToolOutcome,
    ) -> Result<()> {
        if !inv.action.mutates_files() || !outcome.success {
            return Ok(());
        }
        let Some(path) = inv.file_path() else {
            return Ok(());
        };
        let Some(cmd) = self.table.command_for(Path::new(path)) else {
            debug!(file = %path, "no formatter for this extension");
            return Ok(());
        };

        let run = run_shell(&cmd, ctx.cwd(), self.tool_timeout).await;
        if run.success {
            debug!(file = %path, command = %cmd, elapsed = ?run.elapsed, "formatted");
        } else {
            let detail = run.detail.as_deref().unwrap_or("unknown failure");
            warn!(file = %path, command = %cmd, detail = %detail, "formatter failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolgate_core::{param, ActionKind};
    use toolgate_store::StorePaths;

    fn ctx(root: &std::path::Path) -> SessionContext {
        SessionContext::new("s1", None, root.to_path_buf(), StorePaths::at(root))
    }

    #[test]
    fn default_rules_form_a_valid_table() {
        assert!(FormatterTable::from_rules(DEFAULT_RULES).is_ok());
    }

    #[test]
    fn duplicate_extensions_are_rejected() {
        let rules = [("py", PRETTIER), ("py", PRETTIER)];
        match FormatterTable::from_rules(&rules) {
            Err(TableError::DuplicateExtension(ext)) => assert_eq!(ext, "py"),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn command_appends_the_quoted_path() {
        let table = FormatterTable::with_defaults();
        assert_eq!(
            table.command_for(Path::new("src/app.py")).as_deref(),
            Some("black src/app.py")
        );
        assert_eq!(
            table.command_for(Path::new("a file.md")).as_deref(),
            Some("prettier --write 'a file.md'")
        );
        assert_eq!(
            table.command_for(Path::new("lib.rs")).as_deref(),
            Some("rustfmt --edition 2021 lib.rs")
        );
        assert_eq!(table.command_for(Path::new("notes.txt")), None);
        assert_eq!(table.command_for(Path::new("Makefile")), None);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let table = FormatterTable::with_defaults();
        assert!(table.command_for(Path::new("README.MD")).is_some());
    }

    #[tokio::test]
    async fn formatter_runs_for_successful_edits() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path());
        let marker = tmp.path().join("formatted.py");
        let table = FormatterTable::from_rules(&[(
            "py",
            FormatterCmd {
                program: "touch",
                args: &[],
            },
        )])
        .unwrap();
        // The stand-in formatter touches the target, proving it ran.
        let hook = FmtHook::with_table(table);
        let inv = Invocation::new(ActionKind::EditFile, "s1")
            .with_param(param::FILE_PATH, marker.to_string_lossy());
        hook.after_tool(&ctx, &inv, &ToolOutcome::ok()).await.unwrap();
        assert!(marker.exists());
    }

    #[tokio::test]
    async fn formatter_failure_is_absorbed() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path());
        let table = FormatterTable::from_rules(&[(
            "py",
            FormatterCmd {
                program: "false",
                args: &[],
            },
        )])
        .unwrap();
        let hook = FmtHook::with_table(table);
        let inv =
            Invocation::new(ActionKind::WriteFile, "s1").with_param(param::FILE_PATH, "x.py");
        assert!(hook
            .after_tool(&ctx, &inv, &ToolOutcome::ok())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn reads_and_failed_edits_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx(tmp.path());
        let marker = tmp.path().join("skipped.py");
        let table = FormatterTable::from_rules(&[(
            "py",
            FormatterCmd {
                program: "touch",
                args: &[],
            },
        )])
        .unwrap();
        let hook = FmtHook::with_table(table);

        let read = Invocation::new(ActionKind::ReadFile, "s1")
            .with_param(param::FILE_PATH, marker.to_string_lossy());
        hook.after_tool(&ctx, &read, &ToolOutcome::ok()).await.unwrap();

        let failed = Invocation::new(ActionKind::EditFile, "s1")
            .with_param(param::FILE_PATH, marker.to_string_lossy());
        let outcome = ToolOutcome {
            success: false,
            response: serde_json::Value::Null,
        };
        hook.after_tool(&ctx, &failed, &outcome).await.unwrap();

        assert!(!marker.exists());
    }
}
