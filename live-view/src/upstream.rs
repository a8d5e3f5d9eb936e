//! Client for the external game-rules engine.

use futures::future::BoxFuture;
use futures::FutureExt;
use game_core::{GameSnapshot, GiftId, ParticipantId};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ClientError;

const HOST_TOKEN_HEADER: &str = "X-Host-Token";
const FALLBACK_MESSAGE: &str = "Request failed";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginGrant {
    pub token: String,
    #[serde(default)]
    pub host_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Shuffle,
    Unwrap {
        participant_id: ParticipantId,
        gift_id: GiftId,
    },
    Steal {
        participant_id: ParticipantId,
        gift_id: GiftId,
    },
    Pass {
        participant_id: ParticipantId,
    },
    EndGame,
    FinishSwap,
    Reset,
}

impl HostCommand {
    pub fn path(&self) -> &'static str {
        match self {
            HostCommand::Shuffle => "/game/shuffle",
            HostCommand::Unwrap { .. } => "/game/turn/unwrap",
            HostCommand::Steal { .. } => "/game/turn/steal",
            HostCommand::Pass { .. } => "/game/turn/pass",
            HostCommand::EndGame => "/game/turn/end",
            HostCommand::FinishSwap => "/game/swap/end",
            HostCommand::Reset => "/game/reset",
        }
    }

    fn body(&self) -> Option<Value> {
        match self {
            HostCommand::Unwrap {
                participant_id,
                gift_id,
            }
            | HostCommand::Steal {
                participant_id,
                gift_id,
            } => Some(json!({ "participantId": participant_id, "giftId": gift_id })),
            HostCommand::Pass { participant_id } => Some(json!({ "participantId": participant_id })),
            _ => None,
        }
    }
}

/// The request/response surface of the game-rules engine.
pub trait GameApi: Send + Sync {
    fn login(&self, credentials: Credentials) -> BoxFuture<'static, Result<LoginGrant, ClientError>>;

    fn fetch_state(&self) -> BoxFuture<'static, Result<GameSnapshot, ClientError>>;

    fn command(
        &self,
        token: String,
        command: HostCommand,
    ) -> BoxFuture<'static, Result<GameSnapshot, ClientError>>;
}

#[derive(Clone)]
pub struct HttpGameApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGameApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl GameApi for HttpGameApi {
    fn login(&self, credentials: Credentials) -> BoxFuture<'static, Result<LoginGrant, ClientError>> {
        let request = self.client.post(self.url("/host/login")).json(&credentials);
        async move {
            let response = request
                .send()
                .await
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            decode(response, ClientError::LoginFailed).await
        }
        .boxed()
    }

    fn fetch_state(&self) -> BoxFuture<'static, Result<GameSnapshot, ClientError>> {
        let request = self.client.get(self.url("/game/state"));
        async move {
            let response = request
                .send()
                .await
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            decode(response, ClientError::Transport).await
        }
        .boxed()
    }

    fn command(
        &self,
        token: String,
        command: HostCommand,
    ) -> BoxFuture<'static, Result<GameSnapshot, ClientError>> {
        let mut request = self
            .client
            .post(self.url(command.path()))
            .header(HOST_TOKEN_HEADER, token);
        if let Some(body) = command.body() {
            request = request.json(&body);
        }
        async move {
            debug!(target: "upstream", path = command.path(), "sending host command");
            let response = request
                .send()
                .await
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            decode(response, ClientError::Command).await
        }
        .boxed()
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    rejected: fn(String) -> ClientError,
) -> Result<T, ClientError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| ClientError::Transport(err.to_string()))?;

    if !status.is_success() {
        let message = error_message(&text);
        warn!(target: "upstream", %status, %message, "request rejected");
        return Err(rejected(message));
    }
    if status == StatusCode::NO_CONTENT {
        return Err(ClientError::Transport("empty response".to_string()));
    }
    serde_json::from_str(&text).map_err(|err| ClientError::Transport(err.to_string()))
}

/// JSON `message`, then JSON `error`, then the raw body.
pub fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                if !message.is_empty() {
                    return message.to_string();
                }
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        trimmed.to_string()
    }
}
