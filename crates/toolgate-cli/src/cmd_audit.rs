use std::fs;

use toolgate_store::StorePaths;

/// `toolgate audit`: recent delete-guard entries, newest first.
pub fn execute(limit: usize) -> anyhow::Result<()> {
    let store = StorePaths::from_env();
    let content = fs::read_to_string(store.audit_log()).unwrap_or_default();
    print!("{}", render(&content, limit));
    Ok(())
}

/// Entries are tab-separated: timestamp, quarantined paths, tag, original
/// command, rewritten command. Lines that do not parse print raw.
fn render(content: &str, limit: usize) -> String {
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return "No audit entries recorded.\n".to_string();
    }

    let mut out = String::new();
    let shown: Vec<&str> = lines.iter().rev().take(limit).copied().collect();
    for line in &shown {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() == 5 {
            out.push_str(&format!(
                "[{}] {} quarantined: {}\n",
                fields[0], fields[2], fields[1]
            ));
            out.push_str(&format!("    was: {}\n", fields[3]));
            out.push_str(&format!("    now: {}\n", fields[4]));
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(&format!("\n({} entries shown)\n", shown.len()));
    out
}
