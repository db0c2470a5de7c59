//! Ollama chat client: the planner's [`ModelBackend`].
//!
//! Non-streaming `POST /api/chat`; the whole reply comes back in one body.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::planner::{ChatMessage, ChatRole, Message, ModelBackend, Role};

/// Transport timeout for a single generation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaReply>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaReply {
    #[serde(default = "assistant_role")]
    role: String,
    #[serde(default)]
    content: String,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

fn ollama_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Model => "assistant",
    }
}

fn build_request<'a>(model: &'a str, messages: &'a [ChatMessage]) -> OllamaChatRequest<'a> {
    OllamaChatRequest {
        model,
        messages: messages
            .iter()
            .map(|m| OllamaMessage {
                role: ollama_role(m.role),
                content: &m.content,
            })
            .collect(),
        stream: false,
    }
}

fn parse_reply(body: &str) -> Result<String, BackendError> {
    let parsed: OllamaChatResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::MalformedResponse(format!("{}: {}", e, body)))?;

    if let Some(err) = parsed.error {
        return Err(BackendError::MalformedResponse(err));
    }

    let reply = parsed.message.ok_or_else(|| {
        BackendError::MalformedResponse("response has no message".to_string())
    })?;
    match Message::from_raw(&reply.role, reply.content) {
        Some(message) if message.role == Role::Model => Ok(message.content),
        _ => Err(BackendError::MalformedResponse(format!(
            "reply has unexpected role '{}'",
            reply.role
        ))),
    }
}

/// Pull `{"error": "..."}` out of an error body when Ollama sends one.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<OllamaChatResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .unwrap_or_else(|| body.to_string())
}

pub struct OllamaClient {
    client: reqwest::Client,
    address: String,
    model: String,
}

impl OllamaClient {
    pub fn new(address: &str, model: &str) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            address: address.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.address)
    }
}

#[async_trait]
impl ModelBackend for OllamaClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let request = build_request(&self.model, messages);
        let started = std::time::Instant::now();

        let resp = self.client.post(self.chat_url()).json(&request).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: error_detail(&body),
            });
        }

        let reply = parse_reply(&body)?;
        log::info!(
            "Ollama {} replied with {} chars in {}ms",
            self.model,
            reply.len(),
            started.elapsed().as_millis()
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_roles() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage {
                role: ChatRole::User,
                content: "hi".to_string(),
            },
            ChatMessage {
                role: ChatRole::Model,
                content: "hello".to_string(),
            },
        ];

        let value = serde_json::to_value(build_request("gemma3", &messages)).unwrap();
        assert_eq!(value["model"], "gemma3");
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][2]["role"], "assistant");
        assert_eq!(value["messages"][2]["content"], "hello");
    }

    #[test]
    fn test_parse_reply() {
        let body = r#"{
            "model": "gemma3",
            "created_at": "2025-01-01T00:00:00Z",
            "message": {"role": "assistant", "content": "Your day is overcommitted."},
            "done": true
        }"#;
        assert_eq!(parse_reply(body).unwrap(), "Your day is overcommitted.");
    }

    #[test]
    fn test_parse_reply_role_normalized() {
        let body = r#"{"message": {"role": "model", "content": "ok"}}"#;
        assert_eq!(parse_reply(body).unwrap(), "ok");
        let body = r#"{"message": {"content": "no role"}}"#;
        assert_eq!(parse_reply(body).unwrap(), "no role");
    }

    #[test]
    fn test_parse_reply_rejects_non_model_role() {
        for role in ["user", "tool"] {
            let body = format!(r#"{{"message": {{"role": "{}", "content": "x"}}}}"#, role);
            let err = parse_reply(&body).unwrap_err();
            assert!(err.to_string().contains(role));
        }
    }

    #[test]
    fn test_parse_reply_error_payload() {
        let err = parse_reply(r#"{"error": "model is loading"}"#).unwrap_err();
        assert!(err.to_string().contains("model is loading"));
    }

    #[test]
    fn test_parse_reply_garbage() {
        assert!(matches!(
            parse_reply("<html>bad gateway</html>"),
            Err(BackendError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_reply(r#"{"done": true}"#),
            Err(BackendError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(r#"{"error": "model 'gemma3' not found"}"#),
            "model 'gemma3' not found"
        );
        assert_eq!(error_detail("plain text"), "plain text");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://127.0.0.1:11434/", "gemma3").unwrap();
        assert_eq!(client.chat_url(), "http://127.0.0.1:11434/api/chat");
        assert_eq!(client.model(), "gemma3");
    }
}
