use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment override for the store root.
pub const HOME_ENV: &str = "TOOLGATE_HOME";

/// All durable state lives under one per-user root. Paths are derived from
/// an explicit root rather than ambient globals so tests and the doctor
/// command can point one anywhere.
#[derive(Debug, Clone)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    /// Resolve the store root: `$TOOLGATE_HOME`, else the platform data dir
    /// (`~/.local/share/toolgate`), else `~/.toolgate`.
    pub fn from_env() -> StorePaths {
        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return StorePaths { root: root.into() };
        }
        let root = if let Some(data_dir) = dirs::data_dir() {
            data_dir.join("toolgate")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".toolgate")
        } else {
            PathBuf::from(".toolgate-store")
        };
        StorePaths { root }
    }

    /// A store rooted at an explicit directory.
    pub fn at(root: impl Into<PathBuf>) -> StorePaths {
        StorePaths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append-only tool-call log database.
    pub fn tool_log(&self) -> PathBuf {
        self.root.join("analytics").join("tool_calls.db")
    }

    /// Session summary database (one upsert row per session).
    pub fn session_log(&self) -> PathBuf {
        self.root.join("analytics").join("sessions.db")
    }

    /// Subagent run log database.
    pub fn subagent_log(&self) -> PathBuf {
        self.root.join("analytics").join("subagents.db")
    }

    /// Plain-text audit file written by the delete guard.
    pub fn audit_log(&self) -> PathBuf {
        self.root.join("audit").join("delete-guard.log")
    }

    /// Quarantine area; the delete guard creates one subdirectory per event.
    pub fn trash_dir(&self) -> PathBuf {
        self.root.join("trash")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Ensure the store skeleton exists.
    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        let subdirs = ["analytics", "audit", "trash"];
        for sub in &subdirs {
            fs::create_dir_all(self.root.join(sub))?;
        }
        Ok(())
    }
}

/// Append one line to a shared log file under an exclusive lock. Multiple
/// sessions write the same audit file, so the lock serializes writers; the
/// lock releases when the handle drops.
pub fn append_line(path: &Path, line: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    writeln!(file, "{line}")?;
    file.flush()?;
    Ok(())
}
