mod cmd_audit;
mod cmd_doctor;
mod cmd_hook;
mod cmd_sessions;
mod cmd_stats;

use clap::{Parser, Subcommand};

/// Environment variable holding the tracing filter (same syntax as
/// `RUST_LOG`).
const LOG_ENV: &str = "TOOLGATE_LOG";

#[derive(Parser)]
#[command(name = "toolgate", version, about = "Tool-call guardrails for coding agents")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hook entrypoints wired into the host agent's settings
    Hook {
        #[command(subcommand)]
        cmd: HookCmd,
    },
    /// Per-action tool-call counts from the analytics store
    Stats {
        /// Restrict to one session ID
        #[arg(long)]
        session: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Recorded session summaries, newest first
    Sessions {
        /// Maximum sessions to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON lines (one object per session)
        #[arg(long)]
        json: bool,
    },
    /// Recent delete-guard audit entries, newest first
    Audit {
        /// Maximum entries to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Check store health, hook wiring, and external tools
    Doctor,
}

#[derive(Subcommand)]
enum HookCmd {
    /// Claude Code hook entrypoint (reads stdin JSON)
    Claude,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.cmd {
        Command::Hook { cmd } => match cmd {
            HookCmd::Claude => cmd_hook::claude(),
        },
        Command::Stats { session, json } => cmd_stats::execute(session.as_deref(), json),
        Command::Sessions { limit, json } => cmd_sessions::execute(limit, json),
        Command::Audit { limit } => cmd_audit::execute(limit),
        Command::Doctor => cmd_doctor::execute(),
    }
}

/// Diagnostics go to stderr; stdout stays reserved for protocol output on
/// the hook path.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
