use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::backend::{BackendError, ChatBackend, ChatRequest, Credential};
use crate::config::BackendSettings;

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Client for an OpenAI-compatible `chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    settings: BackendSettings,
}

impl HttpBackend {
    pub fn new(settings: BackendSettings) -> Result<HttpBackend, BackendError> {
        if settings.base_url.trim().is_empty() {
            return Err(BackendError::Unconfigured("base_url is empty".to_string()));
        }
        if settings.model.trim().is_empty() {
            return Err(BackendError::Unconfigured("model is empty".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| BackendError::Unconfigured(format!("http client: {}", e)))?;
        Ok(HttpBackend { client, settings })
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn complete(
        &self,
        request: &ChatRequest<'_>,
        credential: &Credential,
    ) -> Result<String, BackendError> {
        let body = request_body(&self.settings, request);
        log::debug!(
            "posting {} history messages to {}",
            request.history.len(),
            self.endpoint()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        extract_content(&value)
    }
}

fn request_body(settings: &BackendSettings, request: &ChatRequest<'_>) -> Value {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(json!({"role": "system", "content": request.system}));
    for turn in &request.history {
        messages.push(json!({"role": turn.role.as_str(), "content": turn.text}));
    }
    messages.push(json!({"role": "user", "content": request.prompt}));

    json!({
        "model": settings.model,
        "messages": messages,
        "temperature": settings.temperature,
        "max_tokens": settings.max_tokens,
    })
}

fn extract_content(value: &Value) -> Result<String, BackendError> {
    if let Some(message) = value["error"]["message"].as_str() {
        return Err(BackendError::Malformed(format!("error payload: {}", message)));
    }
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BackendError::Malformed("no message content in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ConversationTurn;

    #[test]
    fn body_carries_history_as_messages() {
        let earlier = ConversationTurn::user("What tables exist?");
        let answer = ConversationTurn::assistant("Sales and Product.");
        let request = ChatRequest {
            system: "sys",
            history: vec![&earlier, &answer],
            prompt: "Question: next".to_string(),
        };
        let body = request_body(&BackendSettings::default(), &request);
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["content"], "Sales and Product.");
        assert_eq!(messages[3]["content"], "Question: next");
        assert_eq!(body["model"], "gpt-4o-mini");
    }

    #[test]
    fn content_extraction() {
        let ok = json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]});
        assert_eq!(extract_content(&ok).expect("content"), "hi");

        let err = extract_content(&json!({"error": {"message": "quota"}})).expect_err("error");
        assert!(matches!(err, BackendError::Malformed(_)));
        assert!(extract_content(&json!({"choices": []})).is_err());
    }

    #[test]
    fn empty_settings_are_rejected() {
        let settings = BackendSettings {
            model: " ".to_string(),
            ..BackendSettings::default()
        };
        assert!(matches!(
            HttpBackend::new(settings),
            Err(BackendError::Unconfigured(_))
        ));
    }
}
