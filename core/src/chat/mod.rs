//! Conversation plumbing: the turn record, the backend seam, prompt
//! rendering, and recognition of data requests in backend replies.

mod backend;
mod directive;
#[cfg(feature = "http-backend")]
mod http;
mod prompt;

use serde::Serialize;

pub use backend::{BackendError, ChatBackend, ChatRequest, Credential};
pub use directive::{BackendReply, parse_reply, strip_directives};
#[cfg(feature = "http-backend")]
pub use http::HttpBackend;
pub use prompt::{
    enriched_prompt, render_model, system_prompt, tables_mentioned, turn_prompt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the conversation history. History is append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    /// Tables the backend asked for while answering this turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_request: Option<Vec<String>>,
    /// Set on the assistant turn recorded when a backend call failed. Such
    /// turns are shown to the user but never sent back to the backend.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> ConversationTurn {
        ConversationTurn {
            role: Role::User,
            text: text.into(),
            data_request: None,
            is_error: false,
        }
    }

    pub fn assistant(text: impl Into<String>) -> ConversationTurn {
        ConversationTurn {
            role: Role::Assistant,
            text: text.into(),
            data_request: None,
            is_error: false,
        }
    }

    pub(crate) fn error(text: impl Into<String>) -> ConversationTurn {
        ConversationTurn {
            is_error: true,
            ..ConversationTurn::assistant(text)
        }
    }
}
