//! Shared types for the chat engine

pub mod errors;
pub mod events;
pub mod responses;

pub use errors::{ChatError, ChatResult};
pub use events::ChatEvent;
pub use responses::{ConversationSummary, HistoryPage, MessagePayload, OrderSummary};
