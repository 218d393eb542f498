//! Business logic services for the chat engine

pub mod conversation_service;
pub mod message_service;
pub mod room_service;

pub use conversation_service::ConversationService;
pub use message_service::MessageService;
pub use room_service::RoomService;
