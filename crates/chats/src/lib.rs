//! # Parley Chats Crate
//!
//! Core engine for order-scoped two-party messaging: the join protocol,
//! durable message append/pagination, typing indicators, read receipts,
//! and the per-participant conversation index.
//!
//! ## Architecture
//!
//! - **Directory**: seams to the external order, profile, and credential
//!   services
//! - **Registry**: in-memory map of chats to connected sessions
//! - **Typing**: ephemeral typing state with server-owned expiry
//! - **Services**: business logic over the database repositories
//! - **Types**: errors, events, and response payloads

pub mod directory;
pub mod registry;
pub mod services;
pub mod types;
pub mod typing;

pub use directory::{
    CredentialVerifier, OrderDirectory, OrderRecord, OrderStatus, ProfileDirectory,
    ProfileSnapshot,
};
pub use registry::{RoomRegistry, SessionId};
pub use services::{ConversationService, MessageService, RoomService};
pub use types::{
    ChatError, ChatEvent, ChatResult, ConversationSummary, HistoryPage, MessagePayload,
    OrderSummary,
};
pub use typing::TypingTracker;
