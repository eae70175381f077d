pub mod context;
pub mod hook;
pub mod registry;

pub use context::SessionContext;
pub use hook::{Hook, DEFAULT_HOOK_TIMEOUT};
pub use registry::{BeforeOutcome, HookRegistry};
