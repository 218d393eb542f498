use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use parley_chats::{
    ConversationService, CredentialVerifier, MessageService, OrderDirectory, ProfileDirectory,
    RoomRegistry, RoomService, TypingTracker,
};
use parley_config::AppConfig;
use parley_database::ChatRepository;

/// Shared handles for every connection. Cheap to clone; all the heavy
/// pieces live behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RoomRegistry>,
    pub typing: Arc<TypingTracker>,
    pub rooms: Arc<RoomService>,
    pub messages: Arc<MessageService>,
    pub conversations: Arc<ConversationService>,
    pub chats: ChatRepository,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        config: &AppConfig,
        verifier: Arc<dyn CredentialVerifier>,
        orders: Arc<dyn OrderDirectory>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        let typing = Arc::new(TypingTracker::new(
            Duration::from_millis(config.chat.typing_ttl_ms),
            Arc::clone(&registry),
        ));

        let rooms = Arc::new(RoomService::new(
            pool.clone(),
            Arc::clone(&orders),
            Arc::clone(&registry),
        ));
        let messages = Arc::new(MessageService::new(
            pool.clone(),
            &config.chat,
            orders,
            Arc::clone(&profiles),
            Arc::clone(&registry),
        ));
        let conversations = Arc::new(ConversationService::new(
            pool.clone(),
            profiles,
            Arc::clone(&registry),
        ));

        Self {
            registry,
            typing,
            rooms,
            messages,
            conversations,
            chats: ChatRepository::new(pool),
            verifier,
        }
    }
}
