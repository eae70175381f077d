use std::path::Path;

use toolgate_core::HookEvent;
use toolgate_hooks::{default_registry, Config};
use toolgate_store::StorePaths;

/// External programs the format and test-runner hooks shell out to.
const SHELL_TOOLS: &[&str] = &[
    "prettier", "black", "gofmt", "rustfmt", "pytest", "npm", "go", "cargo",
];

/// `toolgate doctor`: check the store, config, hook chain, and the
/// external tools the hooks depend on.
pub fn execute() -> anyhow::Result<()> {
    // 1. Check toolgate in PATH
    let in_path = which("toolgate");
    println!(
        "[{}] toolgate in PATH: {}",
        if in_path.is_some() { "OK" } else { "WARN" },
        in_path.unwrap_or_else(|| "not found".into())
    );

    // 2. Check hooks wired into the project's settings files
    let cwd = std::env::current_dir()?;
    let wired = ["settings.json", "settings.local.json"].iter().any(|name| {
        let path = cwd.join(".claude").join(name);
        std::fs::read_to_string(path)
            .map(|content| content.contains("toolgate hook"))
            .unwrap_or(false)
    });
    println!(
        "[{}] hooks wired in .claude settings",
        if wired { "OK" } else { "WARN" }
    );

    // 3. Store root writable. Hook-time writes absorb store failures, so
    // this is where a broken store actually surfaces.
    let store = StorePaths::from_env();
    println!(
        "[{}] store root: {}",
        if store.ensure_dirs().is_ok() { "OK" } else { "WARN" },
        store.root().display()
    );

    // 4. Config file parses
    let config_path = store.config_file();
    if config_path.exists() {
        let parses = std::fs::read_to_string(&config_path)
            .map(|content| serde_json::from_str::<serde_json::Value>(&content).is_ok())
            .unwrap_or(false);
        println!(
            "[{}] config: {}",
            if parses { "OK" } else { "WARN" },
            config_path.display()
        );
    } else {
        println!("[OK] config: built-in defaults");
    }

    // 5. Analytics databases open with their schema
    let logs_ok = toolgate_analytics::ensure_tool_log(&store.tool_log()).is_ok()
        && toolgate_analytics::ensure_session_log(&store.session_log()).is_ok()
        && toolgate_analytics::ensure_subagent_log(&store.subagent_log()).is_ok();
    println!(
        "[{}] analytics databases",
        if logs_ok { "OK" } else { "WARN" }
    );

    // 6. Hook chain builds from the loaded config
    let config = Config::load(&store);
    match default_registry(&config) {
        Ok(registry) => {
            let before = registry.hooks_for(HookEvent::PreTool).count();
            let after = registry.hooks_for(HookEvent::PostTool).count();
            println!("[OK] hook chain: {before} before, {after} after");
        }
        Err(e) => println!("[WARN] hook chain failed to build: {e}"),
    }
    if !config.disabled_hooks.is_empty() {
        println!("  disabled: {}", config.disabled_hooks.join(", "));
    }

    // 7. External tools the hooks shell out to
    for tool in SHELL_TOOLS {
        let found = which(tool);
        println!(
            "[{}] {tool}: {}",
            if found.is_some() { "OK" } else { "WARN" },
            found.unwrap_or_else(|| "not found".into())
        );
    }

    Ok(())
}

fn which(name: &str) -> Option<String> {
    let path_var = std::env::var("PATH").unwrap_or_default();
    let sep = if cfg!(windows) { ';' } else { ':' };
    let exe_name = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    };
    for dir in path_var.split(sep) {
        let candidate = Path::new(dir).join(&exe_name);
        if candidate.exists() {
            return Some(candidate.to_string_lossy().to_string());
        }
    }
    None
}
