//! Chat core: data types, context fitting, dispatch, and the client cache

pub mod context;
pub mod metrics;
pub mod orchestrator;
pub mod reconciler;
pub mod types;

pub use context::{estimate_tokens, history_tokens, truncate_to_budget, ContextInfo};
pub use orchestrator::{reduce_outcomes, DispatchOptions, Orchestrator, SendState};
pub use reconciler::SessionCache;
pub use types::{
    derive_title, now_millis, ChatMessage, ChatSession, Role, SendResult, DEFAULT_SESSION_TITLE,
};
