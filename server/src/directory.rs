//! HTTP-backed implementations of the external directory traits.
//!
//! Orders, profiles, and credentials live in other services; these
//! clients translate their HTTP responses into the engine's error
//! taxonomy. Unreachable services surface as retryable
//! `transient_store_error`s, never as permission failures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use parley_chats::{
    ChatError, ChatResult, CredentialVerifier, OrderDirectory, OrderRecord, ProfileDirectory,
    ProfileSnapshot,
};
use parley_config::ServicesConfig;

pub fn http_client(services: &ServicesConfig) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(services.request_timeout_seconds))
        .build()
        .map_err(Into::into)
}

pub struct HttpOrderDirectory {
    client: Client,
    base_url: String,
}

impl HttpOrderDirectory {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trimmed(base_url),
        }
    }
}

#[async_trait]
impl OrderDirectory for HttpOrderDirectory {
    async fn order(&self, order_id: &str) -> ChatResult<OrderRecord> {
        let url = format!("{}/orders/{}", self.base_url, order_id);
        let response = self.client.get(&url).send().await.map_err(|error| {
            ChatError::transient_store(format!("order service unreachable: {error}"))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ChatError::not_found("order", order_id)),
            status if status.is_success() => {
                response.json::<OrderRecord>().await.map_err(|error| {
                    ChatError::transient_store(format!("invalid order payload: {error}"))
                })
            }
            status => Err(ChatError::transient_store(format!(
                "order service returned {status}"
            ))),
        }
    }
}

pub struct HttpProfileDirectory {
    client: Client,
    base_url: String,
}

impl HttpProfileDirectory {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trimmed(base_url),
        }
    }
}

#[async_trait]
impl ProfileDirectory for HttpProfileDirectory {
    async fn profile(&self, participant_id: &str) -> ChatResult<ProfileSnapshot> {
        let url = format!("{}/profiles/{}", self.base_url, participant_id);
        let response = self.client.get(&url).send().await.map_err(|error| {
            ChatError::transient_store(format!("profile service unreachable: {error}"))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ChatError::not_found("profile", participant_id)),
            status if status.is_success() => {
                response.json::<ProfileSnapshot>().await.map_err(|error| {
                    ChatError::transient_store(format!("invalid profile payload: {error}"))
                })
            }
            status => Err(ChatError::transient_store(format!(
                "profile service returned {status}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    participant_id: String,
}

pub struct HttpCredentialVerifier {
    client: Client,
    base_url: String,
}

impl HttpCredentialVerifier {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: trimmed(base_url),
        }
    }
}

#[async_trait]
impl CredentialVerifier for HttpCredentialVerifier {
    async fn verify(&self, token: &str) -> ChatResult<String> {
        let url = format!("{}/verify", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|error| ChatError::auth(format!("auth service unreachable: {error}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ChatError::auth("credential rejected"))
            }
            status if status.is_success() => response
                .json::<VerifyResponse>()
                .await
                .map(|body| body.participant_id)
                .map_err(|error| ChatError::auth(format!("invalid verify payload: {error}"))),
            status => Err(ChatError::auth(format!("auth service returned {status}"))),
        }
    }
}

fn trimmed(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}
