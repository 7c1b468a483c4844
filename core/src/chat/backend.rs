use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::ConversationTurn;
use crate::error_codes;

/// API key for the chat backend. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Credential {
        Credential(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Everything a backend needs for one completion.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    /// Earlier turns, oldest first. Error turns are already filtered out.
    pub history: Vec<&'a ConversationTurn>,
    pub prompt: String,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("backend response is malformed: {0}")]
    Malformed(String),
    #[error("backend is not configured: {0}")]
    Unconfigured(String),
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Transport(_) => error_codes::BACKEND_TRANSPORT,
            BackendError::Status { .. } => error_codes::BACKEND_STATUS,
            BackendError::Malformed(_) => error_codes::BACKEND_MALFORMED,
            BackendError::Unconfigured(_) => error_codes::BACKEND_UNCONFIGURED,
        }
    }
}

/// A text-completion service. Implementations must be shareable across
/// tasks; a session awaits at most one call at a time.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        request: &ChatRequest<'_>,
        credential: &Credential,
    ) -> Result<String, BackendError>;
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Arc<T> {
    async fn complete(
        &self,
        request: &ChatRequest<'_>,
        credential: &Credential,
    ) -> Result<String, BackendError> {
        (**self).complete(request, credential).await
    }
}

#[async_trait]
impl<T: ChatBackend + ?Sized> ChatBackend for Box<T> {
    async fn complete(
        &self,
        request: &ChatRequest<'_>,
        credential: &Credential,
    ) -> Result<String, BackendError> {
        (**self).complete(request, credential).await
    }
}
