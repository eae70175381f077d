use std::sync::LazyLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use toolgate_core::{ActionKind, Decision, HookEvent, Invocation};
use toolgate_engine::{Hook, SessionContext};

/// Global flags between `git` and `commit` may carry a separate argument,
/// as in `git -C <path> commit` or `git -c <key=val> commit`.
static GIT_COMMIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bgit\s+(?:-\S+\s+(?:[^-\s]\S*\s+)?)*commit\b").unwrap());

static NO_VERIFY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)--no-verify\b").unwrap());

/// `-m`, clustered short flags ending in m (`-am`), or `--message`. The
/// message may follow after whitespace, after `=`, or glued straight on
/// (`-m"feat: x"`).
static MESSAGE_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(?:--message|-[a-zA-Z]*m)(?:=|\s+)?").unwrap());

/// Pull the inline commit message out of a commit command: the quoted (or
/// bare) argument after `-m` / `--message`. Best effort only; `None` means
/// the message comes via an editor and cannot be validated here.
pub fn extract_commit_message(cmd: &str) -> Option<String> {
    let flag = MESSAGE_FLAG.find(cmd)?;
    let after_flag = &cmd[flag.end()..];
    let mut chars = after_flag.chars();
    match chars.next()? {
        quote @ ('"' | '\'') => {
            let rest = &after_flag[1..];
            let end = rest.find(quote)?;
            Some(rest[..end].to_string())
        }
        _ => {
            // Bare single-word message, e.g. `-m wip`.
            let end = after_flag
                .find(char::is_whitespace)
                .unwrap_or(after_flag.len());
            Some(after_flag[..end].to_string())
        }
    }
}

/// Before-hook enforcing one canonical commit message grammar,
/// `type[(scope)][!]: description`, with the type set taken from
/// configuration. The explicit `--no-verify` bypass always wins.
pub struct CommitGuardHook {
    grammar: Regex,
    types_label: String,
}

impl CommitGuardHook {
    pub fn new(types: &[String]) -> Result<CommitGuardHook> {
        let alternation = types
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let grammar = Regex::new(&format!(r"^(?:{alternation})(?:\([^)]+\))?!?: .+"))
            .context("building commit grammar from configured types")?;
        Ok(CommitGuardHook {
            grammar,
            types_label: types.join(", "),
        })
    }

    fn block_reason(&self, message: &str) -> String {
        format!(
            "commit message \"{message}\" does not follow the conventional format.\n\
             expected: type(scope): description  (scope optional)\n\
             accepted types: {types}\n\
             example: git commit -m \"feat(auth): add login endpoint\"\n\
             bypass with --no-verify if this commit is intentionally exempt",
            types = self.types_label,
        )
    }
}

#[async_trait]
impl Hook for CommitGuardHook {
    fn name(&self) -> &'static str {
        "commit-guard"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PreTool]
    }

    async fn before_tool(&self, _ctx: &SessionContext, inv: &Invocation) -> Result<Decision> {
        if inv.action != ActionKind::RunShellCommand {
            return Ok(Decision::Allow);
        }
        let Some(cmd) = inv.command() else {
            return Ok(Decision::Allow);
        };
        if !GIT_COMMIT.is_match(cmd) {
            return Ok(Decision::Allow);
        }
        if NO_VERIFY.is_match(cmd) {
            debug!("commit bypassed with --no-verify");
            return Ok(Decision::Allow);
        }
        let Some(message) = extract_commit_message(cmd) else {
            // Editor-based message; nothing to validate.
            return Ok(Decision::Allow);
        };
        if self.grammar.is_match(&message) {
            debug!(message = %message, "commit message matches grammar");
            Ok(Decision::Allow)
        } else {
            Ok(Decision::block(self.block_reason(&message)))
        }
    }
}
