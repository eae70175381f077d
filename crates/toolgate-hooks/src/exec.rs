use std::path::Path;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Outcome of one external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolRun {
    pub success: bool,
    /// Failure description when not successful: exit code plus trimmed
    /// stderr, spawn error, or timeout note.
    pub detail: Option<String>,
    pub elapsed: Duration,
}

impl ToolRun {
    fn passed(elapsed: Duration) -> ToolRun {
        ToolRun {
            success: true,
            detail: None,
            elapsed,
        }
    }

    fn failed(detail: String, elapsed: Duration) -> ToolRun {
        ToolRun {
            success: false,
            detail: Some(detail),
            elapsed,
        }
    }
}

/// Shell program and args for the current platform.
#[cfg(windows)]
fn shell_cmd(cmd: &str) -> (String, Vec<String>) {
    ("cmd.exe".into(), vec!["/C".into(), cmd.into()])
}

#[cfg(not(windows))]
fn shell_cmd(cmd: &str) -> (String, Vec<String>) {
    ("sh".into(), vec!["-c".into(), cmd.into()])
}

/// Run a shell command with a hard timeout, killing the child on expiry.
/// Never returns an error: every failure mode folds into the result so
/// advisory hooks can log and move on.
pub async fn run_shell(cmd: &str, cwd: &Path, timeout: Duration) -> ToolRun {
    let start = Instant::now();
    let (shell, args) = shell_cmd(cmd);

    let result = Command::new(&shell)
        .args(&args)
        .current_dir(cwd)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, result).await {
        Ok(Ok(output)) if output.status.success() => ToolRun::passed(start.elapsed()),
        Ok(Ok(output)) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let truncated = match stderr.char_indices().nth(2000) {
                Some((idx, _)) => format!("{}...", &stderr[..idx]),
                None => stderr.to_string(),
            };
            ToolRun::failed(
                format!(
                    "exit {}: {}",
                    output.status.code().unwrap_or(-1),
                    truncated.trim()
                ),
                start.elapsed(),
            )
        }
        Ok(Err(e)) => ToolRun::failed(format!("spawn error: {e}"), start.elapsed()),
        Err(_) => ToolRun::failed(
            format!("timed out after {}s: {cmd}", timeout.as_secs()),
            start.elapsed(),
        ),
    }
}

/// Single-quote a string for `sh -c`. Embedded single quotes become `'\''`.
pub fn sh_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':'))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}
