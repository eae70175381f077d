use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};

use toolgate_core::{param, HookEvent, Invocation, ToolOutcome};
use toolgate_engine::{Hook, SessionContext};

use crate::config::DEFAULT_TEST_FILE_THRESHOLD;
use crate::exec::{run_shell, sh_quote};

/// How long one test command may run before it is killed.
const TOOL_TIMEOUT: Duration = Duration::from_secs(120);

fn build_set(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).unwrap());
    }
    builder.build().unwrap()
}

static PYTHON_TESTS: LazyLock<GlobSet> =
    LazyLock::new(|| build_set(&["**/test_*.py", "**/*_test.py"]));
static JS_TESTS: LazyLock<GlobSet> =
    LazyLock::new(|| build_set(&["**/*.{test,spec}.{js,jsx,ts,tsx}"]));
static GO_TESTS: LazyLock<GlobSet> = LazyLock::new(|| build_set(&["**/*_test.go"]));
static RUST_TESTS: LazyLock<GlobSet> = LazyLock::new(|| build_set(&["**/tests/**/*.rs"]));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Lang {
    Python,
    Js,
    Go,
    Rust,
}

fn classify(path: &str) -> Option<Lang> {
    if PYTHON_TESTS.is_match(path) {
        Some(Lang::Python)
    } else if JS_TESTS.is_match(path) {
        Some(Lang::Js)
    } else if GO_TESTS.is_match(path) {
        Some(Lang::Go)
    } else if RUST_TESTS.is_match(path) {
        Some(Lang::Rust)
    } else {
        None
    }
}

fn anchor(path: &str, cwd: &Path) -> PathBuf {
    let p = PathBuf::from(path);
    if p.is_absolute() {
        p
    } else {
        cwd.join(p)
    }
}

/// Walk from `start` toward the filesystem root, stopping after `stop`,
/// and return the first directory entry whose name is in `names`.
fn find_up(start: &Path, stop: &Path, names: &[&str]) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        for name in names {
            let candidate = d.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        if d == stop {
            break;
        }
        dir = d.parent();
    }
    None
}

fn has_pytest_config(file: &Path, cwd: &Path) -> bool {
    let start = file.parent().unwrap_or(cwd);
    find_up(start, cwd, &["pytest.ini", "pyproject.toml"]).is_some()
}

/// Nearest package.json that declares a `test` script, if any.
fn npm_test_script(file: &Path, cwd: &Path) -> Option<PathBuf> {
    let start = file.parent().unwrap_or(cwd);
    let manifest = find_up(start, cwd, &["package.json"])?;
    let raw = std::fs::read_to_string(&manifest).ok()?;
    let parsed: serde_json::Value = serde_json::from_str(&raw).ok()?;
    parsed.get("scripts")?.get("test")?;
    Some(manifest)
}

/// Decide which test commands to run for a batch of touched files.
///
/// Only recognized test files count. When the batch is small (at most
/// `threshold` files) the commands name those files; larger batches fall
/// back to each language's whole-suite invocation.
fn plan_runs(paths: &[&str], cwd: &Path, threshold: usize) -> Vec<String> {
    let mut by_lang: BTreeMap<Lang, Vec<String>> = BTreeMap::new();
    for path in paths {
        if let Some(lang) = classify(path) {
            by_lang.entry(lang).or_default().push((*path).to_string());
        }
    }
    let total: usize = by_lang.values().map(Vec::len).sum();
    if total == 0 {
        return Vec::new();
    }
    let scoped = total <= threshold;

    let mut runs = Vec::new();
    for (lang, files) in &by_lang {
        let quoted = files
            .iter()
            .map(|f| sh_quote(f))
            .collect::<Vec<_>>()
            .join(" ");
        match lang {
            Lang::Python => {
                let pytest = files
                    .iter()
                    .any(|f| has_pytest_config(&anchor(f, cwd), cwd));
                runs.push(match (pytest, scoped) {
                    (true, true) => format!("pytest {quoted}"),
                    (true, false) => "pytest".to_string(),
                    (false, true) => format!("python -m unittest {quoted}"),
                    (false, false) => "python -m unittest discover".to_string(),
                });
            }
            Lang::Js => {
                let has_script = files
                    .iter()
                    .any(|f| npm_test_script(&anchor(f, cwd), cwd).is_some());
                if !has_script {
                    debug!("no package.json test script found, skipping js tests");
                    continue;
                }
                runs.push(if scoped {
                    format!("npm test -- {quoted}")
                } else {
                    "npm test".to_string()
                });
            }
            Lang::Go => {
                if scoped {
                    let dirs: BTreeSet<String> = files
                        .iter()
                        .filter_map(|f| anchor(f, cwd).parent().map(Path::to_path_buf))
                        .map(|d| sh_quote(&d.to_string_lossy()))
                        .collect();
                    let dirs = dirs.into_iter().collect::<Vec<_>>().join(" ");
                    runs.push(format!("go test {dirs}"));
                } else {
                    runs.push("go test ./...".to_string());
                }
            }
            Lang::Rust => {
                if scoped {
                    for file in files {
                        if let Some(stem) = Path::new(file).file_stem().and_then(|s| s.to_str()) {
                            runs.push(format!("cargo test --test {}", sh_quote(stem)));
                        }
                    }
                } else {
                    runs.push("cargo test".to_string());
                }
            }
        }
    }
    runs
}

fn batch_paths(inv: &Invocation) -> Vec<&str> {
    match inv.param(param::FILE_PATHS) {
        Some(many) => many
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect(),
        None => inv.file_path().into_iter().collect(),
    }
}

/// After-hook that runs the tests affected by an edit. Small batches get
/// file-scoped runs, big ones run the whole suite. Failures are reported
/// in the log and never fed back to the host; the edit already happened.
pub struct TestRunnerHook {
    threshold: usize,
    tool_timeout: Duration,
}

impl TestRunnerHook {
    pub fn new(threshold: usize) -> TestRunnerHook {
        TestRunnerHook {
            threshold,
            tool_timeout: TOOL_TIMEOUT,
        }
    }
}

impl Default for TestRunnerHook {
    fn default() -> Self {
        TestRunnerHook::new(DEFAULT_TEST_FILE_THRESHOLD)
    }
}

#[async_trait]
impl Hook for TestRunnerHook {
    fn name(&self) -> &'static str {
        "test-runner"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PostTool]
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(150)
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
        let batch = batch_paths(inv);
        if batch.is_empty() {
            return Ok(());
        }

        for cmd in plan_runs(&batch, ctx.cwd(), self.threshold) {
            let run = run_shell(&cmd, ctx.cwd(), self.tool_timeout).await;
            if run.success {
                info!(command = %cmd, elapsed = ?run.elapsed, "tests passed");
            } else {
                let detail = run.detail.as_deref().unwrap_or("unknown failure");
                warn!(command = %cmd, detail = %detail, "test run failed");
            }
        }
        Ok(())
    }
}
