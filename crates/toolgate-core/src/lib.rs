pub mod clock;
pub mod event;
pub mod types;

pub use event::HookEvent;
pub use types::*;
