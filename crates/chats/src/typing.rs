//! Ephemeral typing indicators with server-owned expiry.
//!
//! Nothing here is persisted. Every start (re)arms a TTL; if no stop
//! arrives before it fires, the tracker emits the stop itself. A client
//! that disconnects mid-typing therefore needs no special handling —
//! the timer is the only cleanup path, which also sidesteps any race
//! between disconnect and an explicit stop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::registry::RoomRegistry;
use crate::types::ChatEvent;

pub struct TypingTracker {
    ttl: Duration,
    registry: Arc<RoomRegistry>,
    /// (chat, typist) -> generation of the latest start. An expiry task
    /// only fires its stop if its generation is still current.
    states: Arc<Mutex<HashMap<(i64, String), u64>>>,
    generation: AtomicU64,
}

impl TypingTracker {
    pub fn new(ttl: Duration, registry: Arc<RoomRegistry>) -> Self {
        Self {
            ttl,
            registry,
            states: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Broadcast typing-started to the counterparty and (re)arm the
    /// expiry. Duplicate starts just refresh the window.
    pub async fn start(&self, chat_id: i64, chat_public_id: &str, typist_id: &str, partner_id: &str) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let key = (chat_id, typist_id.to_string());

        let was_idle = {
            let mut states = self.states.lock().await;
            states.insert(key, generation).is_none()
        };

        if was_idle {
            let event = ChatEvent::TypingStarted {
                chat_id: chat_public_id.to_string(),
                participant_id: typist_id.to_string(),
            };
            self.registry
                .send_to_participant(chat_id, partner_id, &event)
                .await;
        }

        let ttl = self.ttl;
        let states = Arc::clone(&self.states);
        let registry = Arc::clone(&self.registry);
        let chat_public_id = chat_public_id.to_string();
        let typist = typist_id.to_string();
        let partner = partner_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;

            let expired = {
                let mut states = states.lock().await;
                match states.get(&(chat_id, typist.clone())) {
                    Some(current) if *current == generation => {
                        states.remove(&(chat_id, typist.clone()));
                        true
                    }
                    _ => false,
                }
            };

            if expired {
                debug!(chat_id, typist = %typist, "typing indicator expired");
                let event = ChatEvent::TypingStopped {
                    chat_id: chat_public_id,
                    participant_id: typist,
                };
                registry.send_to_participant(chat_id, &partner, &event).await;
            }
        });
    }

    /// Explicit stop. Idempotent: a stop for an already-idle typist does
    /// nothing, including after an expiry already fired.
    pub async fn stop(&self, chat_id: i64, chat_public_id: &str, typist_id: &str, partner_id: &str) {
        let was_typing = {
            let mut states = self.states.lock().await;
            states.remove(&(chat_id, typist_id.to_string())).is_some()
        };

        if was_typing {
            self.emit_stopped(chat_id, chat_public_id, typist_id, partner_id)
                .await;
        }
    }

    async fn emit_stopped(
        &self,
        chat_id: i64,
        chat_public_id: &str,
        typist_id: &str,
        partner_id: &str,
    ) {
        let event = ChatEvent::TypingStopped {
            chat_id: chat_public_id.to_string(),
            participant_id: typist_id.to_string(),
        };
        self.registry
            .send_to_participant(chat_id, partner_id, &event)
            .await;
    }
}
