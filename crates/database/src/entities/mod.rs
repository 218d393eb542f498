//! Entity definitions for the persistence layer

pub mod chat;
pub mod conversation;
pub mod message;

pub use chat::ChatRoom;
pub use conversation::ConversationRow;
pub use message::{NewMessage, StoredMessage};
