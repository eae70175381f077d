use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::info;

use toolgate_core::{param, ActionKind, Decision, HookEvent, Invocation};
use toolgate_engine::{Hook, SessionContext};

/// One legacy-command rewrite rule. The trigger is always a whole-word
/// match; the escape marker disables the rule for a single command; the
/// guard skips commands already in converted form (needed when the
/// replacement contains the trigger token, as `uv run python` does).
struct RewriteRule {
    name: &'static str,
    escape: &'static str,
    trigger: Regex,
    guard: Option<Regex>,
    steps: Vec<(Regex, &'static str)>,
}

static REWRITE_RULES: LazyLock<Vec<RewriteRule>> = LazyLock::new(|| {
    vec![
        RewriteRule {
            name: "grep-to-rg",
            escape: "# KEEP_GREP",
            trigger: Regex::new(r"\bgrep\b").unwrap(),
            guard: None,
            steps: vec![(Regex::new(r"\bgrep\b").unwrap(), "rg")],
        },
        RewriteRule {
            name: "npm-to-pnpm",
            escape: "# KEEP_NPM",
            trigger: Regex::new(r"\bnpm\b").unwrap(),
            guard: None,
            // Ordered: subcommand forms first, bare token last. `\bnpm\b`
            // never matches inside `pnpm`, which is what makes the whole
            // rule idempotent.
            steps: vec![
                (
                    Regex::new(r"\bnpm\s+(?:install|i)\s+-g\b").unwrap(),
                    "pnpm add -g",
                ),
                (
                    Regex::new(r"\bnpm\s+(?:install|i)\s+([^\s-])").unwrap(),
                    "pnpm add ${1}",
                ),
                (
                    Regex::new(r"\bnpm\s+(?:uninstall|un)\b").unwrap(),
                    "pnpm remove",
                ),
                (
                    Regex::new(r"\bnpm\s+(?:install|i)\b").unwrap(),
                    "pnpm install",
                ),
                (Regex::new(r"\bnpm\b").unwrap(), "pnpm"),
            ],
        },
        RewriteRule {
            name: "python-to-uv",
            escape: "# VANILLA_PYTHON",
            trigger: Regex::new(r"\b(?:python3?|pip3?)\b").unwrap(),
            guard: Some(Regex::new(r"\buv\b").unwrap()),
            steps: vec![
                (Regex::new(r"\bpython3\b").unwrap(), "uv run python3"),
                (Regex::new(r"\bpython\b").unwrap(), "uv run python"),
                (Regex::new(r"\bpip3?\b").unwrap(), "uv pip"),
            ],
        },
    ]
});

/// Characters that glue a `\b`-delimited match into a larger token.
/// `grep-notes.md` and `python-dotenv` contain whole-word `grep`/`python`
/// as far as `\b` is concerned, but rewriting inside them would corrupt
/// unrelated text.
const TOKEN_JOINERS: &[char] = &['-', '.', '/', '+', '~'];

fn glued(before: Option<char>, after: Option<char>) -> bool {
    before.is_some_and(|c| TOKEN_JOINERS.contains(&c))
        || after.is_some_and(|c| TOKEN_JOINERS.contains(&c))
}

/// `replace_all` with the stricter token boundary: matches whose neighbors
/// are joiners are copied through unchanged.
fn replace_strict(s: &str, pat: &Regex, replacement: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in pat.captures_iter(s) {
        let m = caps.get(0).expect("capture 0 is the whole match");
        out.push_str(&s[last..m.start()]);
        let before = s[..m.start()].chars().next_back();
        let after = s[m.end()..].chars().next();
        if glued(before, after) {
            out.push_str(m.as_str());
        } else {
            caps.expand(replacement, &mut out);
        }
        last = m.end();
    }
    out.push_str(&s[last..]);
    out
}

/// Apply every matching rule in table order. Returns the applied rule names
/// and the rewritten command, or `None` when nothing changed.
pub fn rewrite_command(cmd: &str) -> Option<(Vec<&'static str>, String)> {
    let mut current = cmd.to_string();
    let mut applied = Vec::new();

    for rule in REWRITE_RULES.iter() {
        if current.contains(rule.escape) {
            continue;
        }
        if let Some(guard) = &rule.guard {
            if guard.is_match(&current) {
                continue;
            }
        }
        if !rule.trigger.is_match(&current) {
            continue;
        }
        let mut next = current.clone();
        for (pat, replacement) in &rule.steps {
            next = replace_strict(&next, pat, replacement);
        }
        if next != current {
            applied.push(rule.name);
            current = next;
        }
    }

    if applied.is_empty() {
        None
    } else {
        Some((applied, current))
    }
}

/// Before-hook swapping legacy tool invocations for their preferred
/// equivalents. Pure string work over the rule table; anything it cannot
/// understand passes through untouched.
pub struct RewriteHook;

#[async_trait]
impl Hook for RewriteHook {
    fn name(&self) -> &'static str {
        "command-rewrite"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PreTool]
    }

    async fn before_tool(&self, _ctx: &SessionContext, inv: &Invocation) -> Result<Decision> {
        if inv.action != ActionKind::RunShellCommand {
            return Ok(Decision::Allow);
        }
        let cmd = match inv.command() {
            Some(c) if !c.trim().is_empty() => c,
            _ => return Ok(Decision::Allow),
        };
        match rewrite_command(cmd) {
            Some((rules, rewritten)) => {
                info!(rules = ?rules, before = %cmd, after = %rewritten, "command rewritten");
                let mut next = inv.clone();
                next.set_param(param::COMMAND, rewritten);
                Ok(Decision::Rewrite(next))
            }
            None => Ok(Decision::Allow),
        }
    }
}
