//! Host session and narration preference, optionally kept in a JSON file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ClientError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HostSession {
    pub token: String,
    #[serde(default)]
    pub host_name: Option<String>,
}

impl HostSession {
    pub fn display_name(&self) -> &str {
        match self.host_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "Host",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientState {
    pub host: Option<HostSession>,
    pub narration_enabled: bool,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            host: None,
            narration_enabled: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct ClientStore {
    state: ClientState,
    path: Option<PathBuf>,
}

impl ClientStore {
    /// Reads `path` if it holds a valid state; anything else starts fresh.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<ClientState>(&bytes) {
                Ok(saved) => {
                    info!(target: "client_state", path = %path.display(), "client state loaded");
                    saved
                }
                Err(err) => {
                    warn!(target: "client_state", %err, "ignoring unreadable client state");
                    ClientState::default()
                }
            },
            Err(_) => ClientState::default(),
        };
        Self {
            state,
            path: Some(path),
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn host(&self) -> Option<&HostSession> {
        self.state.host.as_ref()
    }

    /// Applies `change` and rewrites the file. The in-memory state keeps the
    /// change even if the write fails.
    pub async fn update<F>(&mut self, change: F) -> Result<(), ClientError>
    where
        F: FnOnce(&mut ClientState),
    {
        change(&mut self.state);
        self.persist().await
    }

    async fn persist(&self) -> Result<(), ClientError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(&self.state)
            .map_err(|err| ClientError::Persist(err.to_string()))?;
        tokio::fs::write(path, json).await.map_err(|err| {
            warn!(target: "client_state", %err, "persist error");
            ClientError::Persist(err.to_string())
        })
    }
}
