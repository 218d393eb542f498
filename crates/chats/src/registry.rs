//! In-memory room registry: which sessions are connected, which chats
//! they joined, and where live events fan out.
//!
//! The registry tracks sessions, not identities. One participant may
//! hold any number of simultaneous sessions (devices, tabs); each one is
//! a separate broadcast target. Membership here is a pure fan-out list,
//! fully decoupled from persisted history, so a reconnecting client just
//! joins again with no recovery path.

use std::collections::{HashMap, HashSet};

use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use crate::types::ChatEvent;

/// Opaque per-connection identifier, assigned at accept time.
pub type SessionId = String;

pub type EventSender = mpsc::UnboundedSender<ChatEvent>;

struct SessionState {
    participant_id: String,
    sender: EventSender,
    /// The chat this session currently has on screen, if any. Used to
    /// suppress unread bumps for a recipient who is already looking.
    active_chat: Option<i64>,
    joined: HashSet<i64>,
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<SessionId, SessionState>,
    rooms: HashMap<i64, HashSet<SessionId>>,
}

/// Shared registry of connected sessions and their rooms.
#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<RegistryInner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a session to its identity and outbound channel. Registering
    /// the same session id again replaces the previous sender, so a
    /// session can never accumulate duplicate subscriptions.
    pub async fn register_session(
        &self,
        session_id: &str,
        participant_id: &str,
        sender: EventSender,
    ) {
        let mut inner = self.inner.write().await;
        inner.sessions.insert(
            session_id.to_string(),
            SessionState {
                participant_id: participant_id.to_string(),
                sender,
                active_chat: None,
                joined: HashSet::new(),
            },
        );
    }

    /// Add a session to a chat's broadcast group. Idempotent: re-joining
    /// returns `false` and changes nothing.
    pub async fn join(&self, chat_id: i64, session_id: &str) -> bool {
        let mut inner = self.inner.write().await;

        let Some(session) = inner.sessions.get_mut(session_id) else {
            warn!(session_id, chat_id, "join for unregistered session");
            return false;
        };

        session.active_chat = Some(chat_id);
        let newly_joined = session.joined.insert(chat_id);

        if newly_joined {
            inner
                .rooms
                .entry(chat_id)
                .or_default()
                .insert(session_id.to_string());
        }

        newly_joined
    }

    /// Remove a session from a chat's broadcast group only; history and
    /// the chat row are untouched.
    pub async fn leave(&self, chat_id: i64, session_id: &str) {
        let mut inner = self.inner.write().await;

        if let Some(session) = inner.sessions.get_mut(session_id) {
            session.joined.remove(&chat_id);
            if session.active_chat == Some(chat_id) {
                session.active_chat = None;
            }
        }

        if let Some(room) = inner.rooms.get_mut(&chat_id) {
            room.remove(session_id);
            if room.is_empty() {
                inner.rooms.remove(&chat_id);
            }
        }
    }

    /// Drop a session entirely. Returns the chats in which this was the
    /// identity's last connected session, so the caller can announce the
    /// participant going offline.
    pub async fn disconnect(&self, session_id: &str) -> Vec<(i64, String)> {
        let mut inner = self.inner.write().await;

        let Some(state) = inner.sessions.remove(session_id) else {
            return Vec::new();
        };

        let mut vacated = Vec::new();
        for chat_id in &state.joined {
            if let Some(room) = inner.rooms.get_mut(chat_id) {
                room.remove(session_id);
                if room.is_empty() {
                    inner.rooms.remove(chat_id);
                }
            }

            let still_present = inner
                .rooms
                .get(chat_id)
                .map(|room| {
                    room.iter().any(|sid| {
                        inner
                            .sessions
                            .get(sid)
                            .is_some_and(|s| s.participant_id == state.participant_id)
                    })
                })
                .unwrap_or(false);

            if !still_present {
                vacated.push((*chat_id, state.participant_id.clone()));
            }
        }

        vacated
    }

    /// Broadcast an event to every session joined to a chat.
    pub async fn broadcast(&self, chat_id: i64, event: &ChatEvent) {
        let inner = self.inner.read().await;

        let Some(room) = inner.rooms.get(&chat_id) else {
            return;
        };

        for session_id in room {
            if let Some(session) = inner.sessions.get(session_id) {
                if session.sender.send(event.clone()).is_err() {
                    warn!(
                        session_id,
                        chat_id,
                        event = event.event_type_name(),
                        "failed to deliver event to session"
                    );
                }
            }
        }
    }

    /// Send an event to one participant's sessions in a chat only.
    pub async fn send_to_participant(
        &self,
        chat_id: i64,
        participant_id: &str,
        event: &ChatEvent,
    ) {
        let inner = self.inner.read().await;

        let Some(room) = inner.rooms.get(&chat_id) else {
            return;
        };

        for session_id in room {
            if let Some(session) = inner.sessions.get(session_id) {
                if session.participant_id == participant_id
                    && session.sender.send(event.clone()).is_err()
                {
                    warn!(
                        session_id,
                        chat_id,
                        event = event.event_type_name(),
                        "failed to deliver event to session"
                    );
                }
            }
        }
    }

    /// Whether a participant has at least one session joined to a chat.
    pub async fn participant_present(&self, chat_id: i64, participant_id: &str) -> bool {
        let inner = self.inner.read().await;

        inner
            .rooms
            .get(&chat_id)
            .map(|room| {
                room.iter().any(|sid| {
                    inner
                        .sessions
                        .get(sid)
                        .is_some_and(|s| s.participant_id == participant_id)
                })
            })
            .unwrap_or(false)
    }

    /// Whether a participant currently has this chat on screen in any
    /// session.
    pub async fn is_viewing(&self, chat_id: i64, participant_id: &str) -> bool {
        let inner = self.inner.read().await;

        inner.sessions.values().any(|s| {
            s.participant_id == participant_id && s.active_chat == Some(chat_id)
        })
    }

    pub async fn session_count(&self, chat_id: i64) -> usize {
        let inner = self.inner.read().await;
        inner.rooms.get(&chat_id).map_or(0, HashSet::len)
    }
}
