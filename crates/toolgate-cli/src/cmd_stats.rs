use toolgate_analytics::{action_breakdown, aggregate_session, ensure_tool_log};
use toolgate_store::StorePaths;

/// `toolgate stats`: per-action counts from the tool-call log.
pub fn execute(session: Option<&str>, json: bool) -> anyhow::Result<()> {
    let store = StorePaths::from_env();
    let conn = ensure_tool_log(&store.tool_log())?;
    let breakdown = action_breakdown(&conn, session)?;

    if json {
        let rows: Vec<serde_json::Value> = breakdown
            .iter()
            .map(|(action, count)| serde_json::json!({"action": action, "count": count}))
            .collect();
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }

    if breakdown.is_empty() {
        println!("No tool calls recorded.");
        return Ok(());
    }

    if let Some(sid) = session {
        let agg = aggregate_session(&conn, sid)?;
        println!(
            "Session {sid}: {} tools, {} files, {} commands, {}s\n",
            agg.tool_count, agg.file_count, agg.command_count, agg.duration_seconds
        );
    }
    print!("{}", render_breakdown(&breakdown));
    Ok(())
}

fn render_breakdown(breakdown: &[(String, i64)]) -> String {
    let mut out = String::new();
    let total: i64 = breakdown.iter().map(|(_, count)| count).sum();
    for (action, count) in breakdown {
        out.push_str(&format!("  {action:<20} {count:>6}\n"));
    }
    out.push_str(&format!("\n({total} tool calls)\n"));
    out
}
