//! WebSocket gateway: one socket per session, JSON tagged events both
//! ways.
//!
//! Acks go to the initiating session only; room broadcasts arrive
//! through the registry channel and share the same outbound writer, so
//! a session sees a single ordered stream. Handler failures become
//! `error` acks and never tear down the connection.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_chats::{ChatError, ChatEvent, ConversationSummary, HistoryPage, MessagePayload};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Events a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom {
        order_id: String,
    },
    SendMessage {
        order_id: String,
        content: String,
        #[serde(default)]
        client_ref: Option<String>,
    },
    StartTyping {
        order_id: String,
    },
    StopTyping {
        order_id: String,
    },
    MarkRead {
        order_id: String,
    },
    FetchHistory {
        chat_id: String,
        #[serde(default)]
        cursor: Option<i64>,
        #[serde(default)]
        limit: Option<i64>,
    },
    ListConversations,
    Ping,
}

/// Events the server writes to one session: acks plus the room
/// broadcasts relayed from the registry.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Hello {
        participant_id: String,
    },
    Pong,
    RoomJoined {
        chat_id: String,
    },
    SendAck {
        message: MessagePayload,
        #[serde(skip_serializing_if = "Option::is_none")]
        client_ref: Option<String>,
    },
    History {
        #[serde(flatten)]
        page: HistoryPage,
    },
    Conversations {
        items: Vec<ConversationSummary>,
    },
    Error {
        code: &'static str,
        message: String,
    },
    #[serde(untagged)]
    Broadcast(ChatEvent),
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, StatusCode> {
    let token = query.token.ok_or(StatusCode::UNAUTHORIZED)?;

    let participant_id = state.verifier.verify(&token).await.map_err(|error| {
        warn!(code = error.code(), %error, "websocket credential rejected");
        StatusCode::UNAUTHORIZED
    })?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, participant_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, participant_id: String) {
    let session_id = Uuid::new_v4().to_string();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ChatEvent>();

    state
        .registry
        .register_session(&session_id, &participant_id, event_tx)
        .await;

    // Relay registry broadcasts into the session's outbound stream. The
    // channel closes when the registry drops the sender on disconnect.
    let relay_tx = out_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if relay_tx.send(ServerEvent::Broadcast(event)).is_err() {
                break;
            }
        }
    });

    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(error) => {
                    warn!(%error, "failed to serialize outbound event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    info!(session_id, participant_id, "session connected");
    let _ = out_tx.send(ServerEvent::Hello {
        participant_id: participant_id.clone(),
    });

    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => dispatch(event, &state, &session_id, &participant_id).await,
                    Err(error) => {
                        debug!(session_id, %error, "malformed client event");
                        Some(ServerEvent::Error {
                            code: "validation_error",
                            message: "malformed client event".to_string(),
                        })
                    }
                };

                if let Some(reply) = reply {
                    if out_tx.send(reply).is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(session_id, %error, "websocket receive error");
                break;
            }
        }
    }

    // Announce the partner going offline in every chat where this was
    // the identity's last session. Typing cleanup is left to expiry.
    let vacated = state.registry.disconnect(&session_id).await;
    for (chat_id, participant) in vacated {
        match state.chats.find_by_id(chat_id).await {
            Ok(Some(chat)) => {
                let event = ChatEvent::PartnerOffline {
                    chat_id: chat.public_id,
                    participant_id: participant,
                };
                state.registry.broadcast(chat_id, &event).await;
            }
            Ok(None) => {}
            Err(error) => warn!(chat_id, %error, "chat lookup failed during disconnect"),
        }
    }

    drop(out_tx);
    let _ = writer.await;
    info!(session_id, participant_id, "session disconnected");
}

async fn dispatch(
    event: ClientEvent,
    state: &AppState,
    session_id: &str,
    participant_id: &str,
) -> Option<ServerEvent> {
    match event {
        ClientEvent::Ping => Some(ServerEvent::Pong),

        ClientEvent::JoinRoom { order_id } => {
            match state.rooms.join(&order_id, participant_id, session_id).await {
                Ok(chat) => Some(ServerEvent::RoomJoined {
                    chat_id: chat.public_id,
                }),
                Err(error) => Some(error_ack(error, "join_room")),
            }
        }

        ClientEvent::SendMessage {
            order_id,
            content,
            client_ref,
        } => match state.messages.append(&order_id, participant_id, &content).await {
            Ok(message) => Some(ServerEvent::SendAck {
                message,
                client_ref,
            }),
            Err(error) => Some(error_ack(error, "send_message")),
        },

        ClientEvent::StartTyping { order_id } => {
            match state.rooms.resolve_for_member(&order_id, participant_id).await {
                Ok((chat, _order)) => {
                    let partner = chat.partner_of(participant_id).unwrap_or_default().to_string();
                    state
                        .typing
                        .start(chat.id, &chat.public_id, participant_id, &partner)
                        .await;
                    None
                }
                Err(error) => Some(error_ack(error, "start_typing")),
            }
        }

        ClientEvent::StopTyping { order_id } => {
            match state.rooms.resolve_for_member(&order_id, participant_id).await {
                Ok((chat, _order)) => {
                    let partner = chat.partner_of(participant_id).unwrap_or_default().to_string();
                    state
                        .typing
                        .stop(chat.id, &chat.public_id, participant_id, &partner)
                        .await;
                    None
                }
                Err(error) => Some(error_ack(error, "stop_typing")),
            }
        }

        ClientEvent::MarkRead { order_id } => {
            match state.rooms.resolve_for_member(&order_id, participant_id).await {
                Ok((chat, _order)) => {
                    let partner = chat.partner_of(participant_id).unwrap_or_default().to_string();
                    match state
                        .conversations
                        .mark_read(chat.id, &chat.public_id, participant_id, &partner)
                        .await
                    {
                        Ok(()) => None,
                        Err(error) => Some(error_ack(error, "mark_read")),
                    }
                }
                Err(error) => Some(error_ack(error, "mark_read")),
            }
        }

        ClientEvent::FetchHistory {
            chat_id,
            cursor,
            limit,
        } => match state
            .messages
            .fetch_page(&chat_id, participant_id, cursor, limit)
            .await
        {
            Ok(page) => Some(ServerEvent::History { page }),
            Err(error) => Some(error_ack(error, "fetch_history")),
        },

        ClientEvent::ListConversations => {
            match state.conversations.list_conversations(participant_id).await {
                Ok(items) => Some(ServerEvent::Conversations { items }),
                Err(error) => Some(error_ack(error, "list_conversations")),
            }
        }
    }
}

fn error_ack(error: ChatError, operation: &'static str) -> ServerEvent {
    warn!(operation, code = error.code(), %error, "request failed");
    ServerEvent::Error {
        code: error.code(),
        message: error.to_string(),
    }
}
