pub mod log;
pub mod schema;
pub mod summary;

pub use log::{action_breakdown, insert_tool_call, ToolCallRow};
pub use schema::{ensure_session_log, ensure_subagent_log, ensure_tool_log};
pub use summary::{
    aggregate_session, get_session, insert_subagent_run, list_sessions, upsert_session,
    SessionAggregates, SessionSummary, SubagentRow,
};
