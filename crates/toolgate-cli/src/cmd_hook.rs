use std::io::Read;

use toolgate_bridge::{handle_stdin, BridgeResult};
use toolgate_hooks::{default_registry, Config};
use toolgate_store::StorePaths;

/// Environment toggle for the file-based hook debug log.
const DEBUG_ENV: &str = "TOOLGATE_DEBUG";

/// `toolgate hook claude`: read one hook delivery from stdin and answer
/// over the exit-code protocol.
pub fn claude() -> anyhow::Result<()> {
    let mut stdin_buf = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut stdin_buf) {
        debug_log(&format!("STDIN READ ERROR: {e}"));
        return Ok(());
    }

    let head: String = stdin_buf.chars().take(200).collect();
    debug_log(&format!("STDIN({} bytes): {head}", stdin_buf.len()));

    match run(&stdin_buf) {
        Ok(result) => {
            if let Some(output) = &result.stdout {
                debug_log(&format!("OK output({} bytes)", output.len()));
                print!("{output}");
            }
            if let Some(reason) = &result.stderr {
                debug_log(&format!("BLOCK: {reason}"));
                eprintln!("{reason}");
                // Exit 2 tells the host to skip the tool call and show
                // stderr to the agent.
                std::process::exit(result.exit_code);
            }
            if result.stdout.is_none() && result.stderr.is_none() {
                debug_log("OK (no output)");
            }
            Ok(())
        }
        Err(e) => {
            debug_log(&format!("ERROR: {e}"));
            tracing::warn!(error = %e, "hook dispatch failed");
            // Exit 0 on internal errors; the host agent is never broken
            // by its own plumbing.
            Ok(())
        }
    }
}

fn run(stdin_buf: &str) -> anyhow::Result<BridgeResult> {
    let store = StorePaths::from_env();
    let config = Config::load(&store);
    let registry = default_registry(&config)?;
    tokio::runtime::Runtime::new()?.block_on(handle_stdin(stdin_buf, store, &registry))
}

fn debug_log(msg: &str) {
    if std::env::var_os(DEBUG_ENV).is_none() {
        return;
    }
    use std::io::Write;
    let log_path = std::env::temp_dir().join("toolgate-hook-debug.log");
    if let Ok(mut f) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let ts = toolgate_core::clock::now_rfc3339();
        let _ = writeln!(f, "[{ts}] {msg}");
    }
}
