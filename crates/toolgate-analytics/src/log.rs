use rusqlite::{params, Connection};
use serde::Serialize;
use toolgate_core::{clock, param, Invocation, ToolOutcome};

/// One row of the append-only tool-call log.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRow {
    pub session_id: String,
    pub ts: String,
    pub action: String,
    pub file_path: Option<String>,
    pub command: Option<String>,
    pub pattern: Option<String>,
    pub description: Option<String>,
    pub params_json: String,
    pub success: bool,
}

impl ToolCallRow {
    /// Project the loggable columns out of a completed invocation. Parameters
    /// that do not apply to the action stay null.
    pub fn from_invocation(inv: &Invocation, outcome: &ToolOutcome) -> ToolCallRow {
        let take = |key: &str| inv.param(key).map(str::to_string);
        ToolCallRow {
            session_id: inv.session_id.clone(),
            ts: clock::now_rfc3339(),
            action: inv.action.as_str().to_string(),
            file_path: take(param::FILE_PATH),
            command: take(param::COMMAND),
            pattern: take(param::PATTERN),
            description: take(param::DESCRIPTION),
            params_json: inv.params_json(),
            success: outcome.success,
        }
    }
}

/// Append one row. A single INSERT is its own transaction, which is what
/// keeps concurrent sessions from corrupting each other.
pub fn insert_tool_call(conn: &Connection, row: &ToolCallRow) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO tool_calls
            (session_id, ts, action, file_path, command, pattern, description, params_json, success)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            row.session_id,
            row.ts,
            row.action,
            row.file_path,
            row.command,
            row.pattern,
            row.description,
            row.params_json,
            row.success as i64,
        ],
    )?;
    Ok(())
}

/// Per-action row counts, optionally scoped to one session. Used by the
/// stats command.
pub fn action_breakdown(
    conn: &Connection,
    session_id: Option<&str>,
) -> anyhow::Result<Vec<(String, i64)>> {
    let mut out = Vec::new();
    match session_id {
        Some(sid) => {
            let mut stmt = conn.prepare(
                "SELECT action, COUNT(*) FROM tool_calls
                 WHERE session_id = ?1 GROUP BY action ORDER BY COUNT(*) DESC",
            )?;
            let rows = stmt.query_map(params![sid], |row| Ok((row.get(0)?, row.get(1)?)))?;
            for row in rows {
                out.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT action, COUNT(*) FROM tool_calls
                 GROUP BY action ORDER BY COUNT(*) DESC",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            for row in rows {
                out.push(row?);
            }
        }
    }
    Ok(out)
}
