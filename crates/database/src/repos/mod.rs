//! Repository implementations for data access

pub mod chat_repository;
pub mod conversation_repository;
pub mod message_repository;

pub use chat_repository::ChatRepository;
pub use conversation_repository::ConversationRepository;
pub use message_repository::MessageRepository;
