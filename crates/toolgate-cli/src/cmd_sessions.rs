use toolgate_analytics::{ensure_session_log, list_sessions, SessionSummary};
use toolgate_store::StorePaths;

/// `toolgate sessions`: recorded session summaries, newest first.
pub fn execute(limit: usize, json: bool) -> anyhow::Result<()> {
    let store = StorePaths::from_env();
    let conn = ensure_session_log(&store.session_log())?;
    let sessions = list_sessions(&conn, limit)?;

    if sessions.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }

    if json {
        for session in &sessions {
            println!("{}", serde_json::to_string(session)?);
        }
        return Ok(());
    }

    for session in &sessions {
        println!("{}", summary_line(session));
    }
    println!("\n({} sessions shown)", sessions.len());
    Ok(())
}

// Format: [2026-02-14 03:42] 0195b8e2-4c1...  claude-opus-4  12 tools, 3 files, 7 commands, 340s
fn summary_line(session: &SessionSummary) -> String {
    let ts_short = if session.ts.len() >= 16 {
        format!("{} {}", &session.ts[..10], &session.ts[11..16])
    } else {
        session.ts.clone()
    };
    let sid_short = if session.session_id.len() > 12 {
        format!("{}...", &session.session_id[..12])
    } else {
        session.session_id.clone()
    };
    let model = session.model.as_deref().unwrap_or("-");
    format!(
        "[{ts_short}] {sid_short:<15}  {model:<20}  {} tools, {} files, {} commands, {}s",
        session.tool_count, session.file_count, session.command_count, session.duration_seconds
    )
}
