use serde::Deserialize;
use tracing::warn;

use toolgate_store::StorePaths;

/// Accepted commit types when the config does not override them.
pub const DEFAULT_COMMIT_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "perf", "test", "build", "ci", "chore", "revert",
];

/// File-scoped test runs switch to whole-suite above this batch size.
pub const DEFAULT_TEST_FILE_THRESHOLD: usize = 3;

/// Environment override: comma-separated hook names to disable.
pub const DISABLED_HOOKS_ENV: &str = "TOOLGATE_DISABLED_HOOKS";

/// Optional `config.json` at the store root. Every field has a default, so
/// a missing or partial file is fine; a malformed one falls back wholesale
/// with a warning.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
    pub disabled_hooks: Vec<String>,
    pub commit_types: Vec<String>,
    pub test_file_threshold: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            disabled_hooks: Vec::new(),
            commit_types: DEFAULT_COMMIT_TYPES.iter().map(|s| s.to_string()).collect(),
            test_file_threshold: DEFAULT_TEST_FILE_THRESHOLD,
        }
    }
}

impl Config {
    /// Load from the store root, then apply environment overrides.
    pub fn load(store: &StorePaths) -> Config {
        let mut config = Self::from_file(store);
        config.apply_env_overrides(std::env::var(DISABLED_HOOKS_ENV).ok().as_deref());
        config
    }

    fn from_file(store: &StorePaths) -> Config {
        let path = store.config_file();
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Config::default(),
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed config; using defaults");
                Config::default()
            }
        }
    }

    /// Union the env-supplied disabled list into the file's.
    fn apply_env_overrides(&mut self, disabled: Option<&str>) {
        if let Some(list) = disabled {
            for name in list.split(',') {
                let name = name.trim();
                if !name.is_empty() && !self.disabled_hooks.iter().any(|d| d == name) {
                    self.disabled_hooks.push(name.to_string());
                }
            }
        }
    }

    pub fn hook_enabled(&self, name: &str) -> bool {
        !self.disabled_hooks.iter().any(|d| d == name)
    }
}
