use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use toolgate_core::{clock, SubagentReport};

/// Counts derived from the tool-call log for one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAggregates {
    pub tool_count: i64,
    /// Distinct non-null file paths.
    pub file_count: i64,
    /// Rows whose action is run-shell-command.
    pub command_count: i64,
    /// Seconds between the earliest and latest row.
    pub duration_seconds: i64,
}

/// Compute the aggregates for one session. Filters by session id throughout,
/// so rows written concurrently by other sessions never leak in.
pub fn aggregate_session(conn: &Connection, session_id: &str) -> anyhow::Result<SessionAggregates> {
    let (tool_count, file_count, command_count) = conn.query_row(
        "SELECT COUNT(*),
                COUNT(DISTINCT file_path),
                COALESCE(SUM(CASE WHEN action = 'run-shell-command' THEN 1 ELSE 0 END), 0)
         FROM tool_calls WHERE session_id = ?1",
        params![session_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    // ROUND before the cast: julianday arithmetic goes through doubles and
    // an exact gap can come out a hair under the true value.
    let duration_seconds: i64 = conn.query_row(
        "SELECT COALESCE(CAST(ROUND((julianday(MAX(ts)) - julianday(MIN(ts))) * 86400) AS INTEGER), 0)
         FROM tool_calls WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )?;
    Ok(SessionAggregates {
        tool_count,
        file_count,
        command_count,
        duration_seconds,
    })
}

/// One row of the session summary log.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub ts: String,
    pub duration_seconds: i64,
    pub model: Option<String>,
    pub summary: String,
    pub tool_count: i64,
    pub file_count: i64,
    pub command_count: i64,
}

impl SessionSummary {
    pub fn new(
        session_id: impl Into<String>,
        model: Option<String>,
        agg: &SessionAggregates,
    ) -> SessionSummary {
        let summary = format!(
            "Session completed: {} tools, {} files, {} commands",
            agg.tool_count, agg.file_count, agg.command_count
        );
        SessionSummary {
            session_id: session_id.into(),
            ts: clock::now_rfc3339(),
            duration_seconds: agg.duration_seconds,
            model,
            summary,
            tool_count: agg.tool_count,
            file_count: agg.file_count,
            command_count: agg.command_count,
        }
    }
}

/// Write the one summary row per session. INSERT OR REPLACE gives upsert
/// semantics for resumed sessions.
pub fn upsert_session(conn: &Connection, row: &SessionSummary) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sessions
            (session_id, ts, duration_seconds, model, summary,
             tool_count, file_count, command_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            row.session_id,
            row.ts,
            row.duration_seconds,
            row.model,
            row.summary,
            row.tool_count,
            row.file_count,
            row.command_count,
        ],
    )?;
    Ok(())
}

pub fn get_session(conn: &Connection, session_id: &str) -> anyhow::Result<Option<SessionSummary>> {
    let row = conn
        .query_row(
            "SELECT session_id, ts, duration_seconds, model, summary,
                    tool_count, file_count, command_count
             FROM sessions WHERE session_id = ?1",
            params![session_id],
            map_summary,
        )
        .optional()?;
    Ok(row)
}

/// Most recent sessions first.
pub fn list_sessions(conn: &Connection, limit: usize) -> anyhow::Result<Vec<SessionSummary>> {
    let mut stmt = conn.prepare(
        "SELECT session_id, ts, duration_seconds, model, summary,
                tool_count, file_count, command_count
         FROM sessions ORDER BY ts DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], map_summary)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn map_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionSummary> {
    Ok(SessionSummary {
        session_id: row.get(0)?,
        ts: row.get(1)?,
        duration_seconds: row.get(2)?,
        model: row.get(3)?,
        summary: row.get(4)?,
        tool_count: row.get(5)?,
        file_count: row.get(6)?,
        command_count: row.get(7)?,
    })
}

/// One row of the subagent run log.
#[derive(Debug, Clone, Serialize)]
pub struct SubagentRow {
    pub parent_session_id: String,
    pub subagent_type: String,
    pub ts: String,
    pub summary: Option<String>,
    pub files_json: String,
    pub file_count: i64,
}

impl SubagentRow {
    pub fn from_report(parent_session_id: impl Into<String>, report: &SubagentReport) -> SubagentRow {
        let files_json = serde_json::to_string(&report.files_modified)
            .expect("string list serialization should not fail");
        SubagentRow {
            parent_session_id: parent_session_id.into(),
            subagent_type: report.subagent_type.clone(),
            ts: clock::now_rfc3339(),
            summary: report.summary.clone(),
            file_count: report.files_modified.len() as i64,
            files_json,
        }
    }
}

pub fn insert_subagent_run(conn: &Connection, row: &SubagentRow) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO subagent_runs
            (parent_session_id, subagent_type, ts, summary, files_json, file_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.parent_session_id,
            row.subagent_type,
            row.ts,
            row.summary,
            row.files_json,
            row.file_count,
        ],
    )?;
    Ok(())
}
