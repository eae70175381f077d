use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::Connection;
use toolgate_store::StorePaths;

/// Per-delivery context threaded into every hook call. Replaces the ambient
/// globals the script-per-hook model leaned on: session identity, model
/// label, working directory, and the store connections all live here.
///
/// Connections open lazily on first use so a missing or unwritable store
/// degrades to a per-hook warning instead of failing delivery up front.
/// They close when the context drops, at the end of the delivery.
pub struct SessionContext {
    session_id: String,
    model: Option<String>,
    cwd: PathBuf,
    store: StorePaths,
    tool_log: Mutex<Option<Connection>>,
    session_log: Mutex<Option<Connection>>,
    subagent_log: Mutex<Option<Connection>>,
}

impl SessionContext {
    pub fn new(
        session_id: impl Into<String>,
        model: Option<String>,
        cwd: PathBuf,
        store: StorePaths,
    ) -> SessionContext {
        SessionContext {
            session_id: session_id.into(),
            model,
            cwd,
            store,
            tool_log: Mutex::new(None),
            session_log: Mutex::new(None),
            subagent_log: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn store(&self) -> &StorePaths {
        &self.store
    }

    /// Run `f` against the tool-call log, opening it on first use.
    pub fn with_tool_log<T>(
        &self,
        f: impl FnOnce(&Connection) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let path = self.store.tool_log();
        with_lazy(&self.tool_log, || toolgate_analytics::ensure_tool_log(&path), f)
    }

    /// Run `f` against the session summary log, opening it on first use.
    pub fn with_session_log<T>(
        &self,
        f: impl FnOnce(&Connection) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let path = self.store.session_log();
        with_lazy(
            &self.session_log,
            || toolgate_analytics::ensure_session_log(&path),
            f,
        )
    }

    /// Run `f` against the subagent run log, opening it on first use.
    pub fn with_subagent_log<T>(
        &self,
        f: impl FnOnce(&Connection) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let path = self.store.subagent_log();
        with_lazy(
            &self.subagent_log,
            || toolgate_analytics::ensure_subagent_log(&path),
            f,
        )
    }
}

fn with_lazy<T>(
    slot: &Mutex<Option<Connection>>,
    open: impl FnOnce() -> anyhow::Result<Connection>,
    f: impl FnOnce(&Connection) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let mut guard = slot
        .lock()
        .map_err(|_| anyhow::anyhow!("store connection lock poisoned"))?;
    if guard.is_none() {
        *guard = Some(open()?);
    }
    let conn = guard.as_ref().expect("connection opened above");
    f(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx(root: &Path) -> SessionContext {
        SessionContext::new(
            "s1",
            Some("test-model".to_string()),
            root.to_path_buf(),
            StorePaths::at(root),
        )
    }

    #[test]
    fn tool_log_opens_lazily_and_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = test_ctx(tmp.path());
        assert!(!ctx.store().tool_log().exists());

        ctx.with_tool_log(|conn| {
            conn.execute(
                "INSERT INTO tool_calls (session_id, ts, action) VALUES ('s1', 't', 'edit-file')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        assert!(ctx.store().tool_log().exists());

        let count: i64 = ctx
            .with_tool_log(|conn| {
                Ok(conn.query_row("SELECT count(*) FROM tool_calls", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn open_failure_surfaces_as_error() {
        let tmp = tempfile::tempdir().unwrap();
        // A file where the analytics directory should be makes open fail.
        std::fs::write(tmp.path().join("analytics"), b"not a dir").unwrap();
        let ctx = test_ctx(tmp.path());
        assert!(ctx.with_tool_log(|_conn| Ok(())).is_err());
    }
}
