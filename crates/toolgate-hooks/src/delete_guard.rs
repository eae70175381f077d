use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use toolgate_core::{clock, param, ActionKind, Decision, HookEvent, Invocation};
use toolgate_engine::{Hook, SessionContext};
use toolgate_store::append_line;

use crate::exec::sh_quote;

/// Fixed tag identifying this guard in the audit log.
pub const AUDIT_TAG: &str = "delete-guard";

/// Escape marker: run the rm as written, skipping the guard.
pub const ESCAPE_MARKER: &str = "# FORCE_RM";

/// Whitespace tokenizer that honors single and double quotes (quotes are
/// stripped, no escape handling). Unquoted `;`, `&`, `|`, their doubled
/// forms, and newlines come out as standalone separator tokens whether or
/// not they were space-padded. Enough shell awareness to pull paths out
/// of an rm invocation.
fn shell_words(cmd: &str) -> Vec<String> {
    fn flush(words: &mut Vec<String>, current: &mut String) {
        if !current.is_empty() {
            words.push(std::mem::take(current));
        }
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = cmd.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '\'' | '"' => quote = Some(c),
                ';' | '\n' => {
                    flush(&mut words, &mut current);
                    words.push(";".to_string());
                }
                '&' | '|' => {
                    flush(&mut words, &mut current);
                    let mut op = String::from(c);
                    if chars.peek() == Some(&c) {
                        chars.next();
                        op.push(c);
                    }
                    words.push(op);
                }
                c if c.is_whitespace() => flush(&mut words, &mut current),
                _ => current.push(c),
            },
        }
    }
    flush(&mut words, &mut current);
    words
}

fn is_separator(word: &str) -> bool {
    matches!(word, ";" | "&&" | "||" | "|" | "&")
}

#[derive(Debug, PartialEq)]
struct RmInvocation {
    recursive: bool,
    force: bool,
    paths: Vec<String>,
}

impl RmInvocation {
    fn guarded(&self) -> bool {
        (self.recursive || self.force) && !self.paths.is_empty()
    }
}

/// Parse one command segment as an rm invocation, flags and targets.
fn parse_rm(segment: &[String]) -> Option<RmInvocation> {
    let start = match segment.first().map(String::as_str) {
        Some("rm") => 1,
        Some("sudo") if segment.get(1).map(String::as_str) == Some("rm") => 2,
        _ => return None,
    };

    let mut parsed = RmInvocation {
        recursive: false,
        force: false,
        paths: Vec::new(),
    };
    let mut options_done = false;
    for word in &segment[start..] {
        if !options_done && word == "--" {
            options_done = true;
            continue;
        }
        if !options_done && word.starts_with("--") {
            match word.as_str() {
                "--recursive" => parsed.recursive = true,
                "--force" => parsed.force = true,
                _ => {}
            }
        } else if !options_done && word.starts_with('-') && word.len() > 1 {
            for c in word.chars().skip(1) {
                match c {
                    'r' | 'R' => parsed.recursive = true,
                    'f' => parsed.force = true,
                    _ => {}
                }
            }
        } else {
            parsed.paths.push(word.clone());
        }
    }
    Some(parsed)
}

/// Before-hook that keeps recursive/forced deletes reversible: the rm is
/// swapped for a move into a fresh quarantine directory under the store,
/// and an audit line records what would have been destroyed.
pub struct DeleteGuardHook;

#[async_trait]
impl Hook for DeleteGuardHook {
    fn name(&self) -> &'static str {
        "delete-guard"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PreTool]
    }

    async fn before_tool(&self, ctx: &SessionContext, inv: &Invocation) -> Result<Decision> {
        if inv.action != ActionKind::RunShellCommand {
            return Ok(Decision::Allow);
        }
        let Some(cmd) = inv.command() else {
            return Ok(Decision::Allow);
        };
        if cmd.contains(ESCAPE_MARKER) {
            info!(command = %cmd, "delete guard skipped by escape marker");
            return Ok(Decision::Allow);
        }

        let mut words = shell_words(cmd);
        // A trailing ; or newline separates nothing.
        while words.last().map(String::as_str) == Some(";") {
            words.pop();
        }
        let segments: Vec<&[String]> = words.split(|w| is_separator(w)).collect();
        let guarded: Vec<RmInvocation> = segments
            .iter()
            .filter_map(|seg| parse_rm(seg))
            .filter(RmInvocation::guarded)
            .collect();
        let Some(rm) = guarded.first() else {
            return Ok(Decision::Allow);
        };

        if segments.len() > 1 {
            // Rewriting one leg of a compound command from stripped tokens
            // would corrupt the rest, so refuse instead.
            return Ok(Decision::block(format!(
                "destructive delete inside a compound command cannot be quarantined.\n\
                 command: {cmd}\n\
                 run the rm on its own and it will be converted into a move into {trash},\n\
                 or add {ESCAPE_MARKER} to the command to delete for real",
                trash = ctx.store().trash_dir().display(),
            )));
        }

        let stamp = ulid::Ulid::new().to_string();
        let trash = ctx.store().trash_dir().join(&stamp);
        let trash_quoted = sh_quote(&trash.to_string_lossy());
        let paths_quoted = rm
            .paths
            .iter()
            .map(|p| sh_quote(p))
            .collect::<Vec<_>>()
            .join(" ");
        let rewritten = format!("mkdir -p {trash_quoted} && mv -- {paths_quoted} {trash_quoted}/");

        let audit = format!(
            "{ts}\t{paths}\t{AUDIT_TAG}\t{cmd}\t{rewritten}",
            ts = clock::now_rfc3339(),
            paths = rm.paths.join(","),
        );
        if let Err(e) = append_line(&ctx.store().audit_log(), &audit) {
            // Best-effort persistence; the quarantine rewrite still applies.
            warn!(error = %e, "audit append failed");
        }

        info!(before = %cmd, after = %rewritten, "destructive delete quarantined");
        let mut next = inv.clone();
        next.set_param(param::COMMAND, rewritten);
        Ok(Decision::Rewrite(next))
    }
}
