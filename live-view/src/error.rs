use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{0}")]
    Transport(String),
    #[error("Host login required for that action.")]
    AuthRequired,
    #[error("{0}")]
    LoginFailed(String),
    #[error("{0}")]
    Command(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("could not save client state: {0}")]
    Persist(String),
}

impl ClientError {
    pub fn status(&self) -> StatusCode {
        match self {
            ClientError::Transport(_) => StatusCode::BAD_GATEWAY,
            ClientError::AuthRequired | ClientError::LoginFailed(_) => StatusCode::UNAUTHORIZED,
            ClientError::Command(_) => StatusCode::CONFLICT,
            ClientError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ClientError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ClientError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
