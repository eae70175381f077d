use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

const TOOL_LOG_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tool_calls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        ts TEXT NOT NULL,
        action TEXT NOT NULL,
        file_path TEXT,
        command TEXT,
        pattern TEXT,
        description TEXT,
        params_json TEXT,
        success INTEGER NOT NULL DEFAULT 1
    );

    CREATE INDEX IF NOT EXISTS idx_tool_calls_session ON tool_calls(session_id);
    CREATE INDEX IF NOT EXISTS idx_tool_calls_ts ON tool_calls(ts);
    CREATE INDEX IF NOT EXISTS idx_tool_calls_action ON tool_calls(action);
    CREATE INDEX IF NOT EXISTS idx_tool_calls_file ON tool_calls(file_path)
        WHERE file_path IS NOT NULL;
";

const SESSION_LOG_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        session_id TEXT PRIMARY KEY,
        ts TEXT NOT NULL,
        duration_seconds INTEGER NOT NULL DEFAULT 0,
        model TEXT,
        summary TEXT,
        tool_count INTEGER NOT NULL DEFAULT 0,
        file_count INTEGER NOT NULL DEFAULT 0,
        command_count INTEGER NOT NULL DEFAULT 0
    );
";

const SUBAGENT_LOG_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS subagent_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        parent_session_id TEXT NOT NULL,
        subagent_type TEXT NOT NULL,
        ts TEXT NOT NULL,
        summary TEXT,
        files_json TEXT,
        file_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_subagent_parent ON subagent_runs(parent_session_id);
";

/// Open (or create) a log database and ensure its schema. WAL mode plus a
/// busy timeout because several assistant sessions may write the same store
/// concurrently.
fn open_with_schema(db_path: &Path, schema: &str) -> anyhow::Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(schema)?;
    Ok(conn)
}

/// The append-only tool-call log.
pub fn ensure_tool_log(db_path: &Path) -> anyhow::Result<Connection> {
    open_with_schema(db_path, TOOL_LOG_SCHEMA)
}

/// The session summary log (one row per session, upserted at session end).
pub fn ensure_session_log(db_path: &Path) -> anyhow::Result<Connection> {
    open_with_schema(db_path, SESSION_LOG_SCHEMA)
}

/// The subagent run log.
pub fn ensure_subagent_log(db_path: &Path) -> anyhow::Result<Connection> {
    open_with_schema(db_path, SUBAGENT_LOG_SCHEMA)
}

/// In-memory variants with the same schemas (for testing).
pub fn tool_log_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(TOOL_LOG_SCHEMA)?;
    Ok(conn)
}

pub fn session_log_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SESSION_LOG_SCHEMA)?;
    Ok(conn)
}

pub fn subagent_log_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(SUBAGENT_LOG_SCHEMA)?;
    Ok(conn)
}
