//! Claude Code process boundary. One hook delivery arrives as JSON on
//! stdin; the decision leaves as an exit status, with optional JSON on
//! stdout (rewrites) or a reason on stderr (blocks).

pub mod dispatch;
pub mod parse;

pub use dispatch::{handle_stdin, BridgeResult, BLOCK_EXIT_CODE};
pub use parse::{FILE_PATHS_ENV, MODEL_ENV, SESSION_ENV};
