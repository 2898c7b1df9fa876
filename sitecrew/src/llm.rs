//! Model backend client.
//!
//! The core only needs "given a transcript and a new turn, return text".
//! Two wire formats are supported: OpenAI-compatible chat completions
//! (LM Studio, Ollama, vLLM, ...) and the Anthropic Messages API.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Anything that can produce the next reply of a conversation.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// `transcript` is the agent's history; `new_turn` is appended as the
    /// final user message.
    async fn complete(&self, transcript: &[Message], new_turn: &str) -> Result<String, BackendError>;
}

/// Wire format spoken by the model service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// `POST /v1/chat/completions`
    #[serde(alias = "lmstudio")]
    Openai,
    /// `POST /v1/messages`
    Anthropic,
}

// ── OpenAI-compatible wire types ───────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

// ── Anthropic wire types ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// HTTP model client.
pub struct LlmClient {
    provider: Provider,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(provider: Provider, base_url: &str) -> Self {
        Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            model: "qwen3:8b".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
            timeout: Duration::from_secs(60),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, BackendError> {
        let mut req = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            req = match self.provider {
                Provider::Openai => req.bearer_auth(key),
                Provider::Anthropic => req
                    .header("x-api-key", key)
                    .header("anthropic-version", "2023-06-01"),
            };
        } else if self.provider == Provider::Anthropic {
            req = req.header("anthropic-version", "2023-06-01");
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn chat_openai(&self, messages: Vec<Message>) -> Result<String, BackendError> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });
        let url = format!("{}/v1/chat/completions", self.base_url);
        let completion: ChatCompletion = self.post_json(&url, &body).await?.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::Malformed("no choices in completion".into()))
    }

    async fn chat_anthropic(&self, messages: Vec<Message>) -> Result<String, BackendError> {
        let (system, messages) = split_system(messages);
        let mut body = serde_json::json!({
            "model": &self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system);
        }
        let url = format!("{}/v1/messages", self.base_url);
        let resp: ApiResponse = self.post_json(&url, &body).await?.json().await?;
        Ok(resp
            .content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl ModelBackend for LlmClient {
    async fn complete(&self, transcript: &[Message], new_turn: &str) -> Result<String, BackendError> {
        let mut messages = transcript.to_vec();
        messages.push(Message::new("user", new_turn));

        tracing::debug!(model = %self.model, turns = messages.len(), "Calling model backend");
        let call = async {
            match self.provider {
                Provider::Openai => self.chat_openai(messages).await,
                Provider::Anthropic => self.chat_anthropic(messages).await,
            }
        };
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))?
    }
}

/// Leading system messages become the Anthropic `system` field; later
/// ones are sent as user turns. Consecutive same-role turns are merged.
fn split_system(messages: Vec<Message>) -> (String, Vec<Message>) {
    let mut system = Vec::new();
    let mut rest: Vec<Message> = Vec::new();
    for m in messages {
        if m.role == "system" && rest.is_empty() {
            system.push(m.content);
            continue;
        }
        let role = if m.role == "assistant" { "assistant" } else { "user" };
        match rest.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&m.content);
            }
            _ => rest.push(Message::new(role, m.content)),
        }
    }
    (system.join("\n\n"), rest)
}

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("static regex"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").expect("static regex"));

/// Remove `<think>...</think>` reasoning spans from a raw reply.
pub fn filter_reasoning(text: &str) -> String {
    let without = THINK_BLOCK.replace_all(text, "");
    BLANK_RUN.replace_all(&without, "\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reasoning_is_removed() {
        let raw = "<think>\nThe client wants cakes.\nI should\n</think>\n\nSure!\n\n\n\nHere it is.";
        assert_eq!(filter_reasoning(raw), "Sure!\n\nHere it is.");
        assert_eq!(filter_reasoning("a <THINK>x</Think> b"), "a  b");
        assert_eq!(filter_reasoning("no reasoning"), "no reasoning");
    }

    #[test]
    fn split_system_merges_roles() {
        let msgs = vec![
            Message::new("system", "persona"),
            Message::new("user", "Client: hi"),
            Message::new("system", "Content of index.html"),
            Message::new("assistant", "hello"),
        ];
        let (system, rest) = split_system(msgs);
        assert_eq!(system, "persona");
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].role, "user");
        assert_eq!(rest[0].content, "Client: hi\n\nContent of index.html");
        assert_eq!(rest[1].role, "assistant");
    }

    #[tokio::test]
    async fn openai_compatible_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "qwen3:8b",
                "stream": false,
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Hello team"}}]}"#)
            .create_async()
            .await;

        let client = LlmClient::new(Provider::Openai, &server.url());
        let reply = client
            .complete(&[Message::new("system", "You are QA")], "user: test it")
            .await
            .unwrap();
        assert_eq!(reply, "Hello team");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn anthropic_completion_joins_text_blocks() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "k")
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"Hi "},{"type":"tool_use","id":"1","name":"x","input":{}},{"type":"text","text":"there"}]}"#)
            .create_async()
            .await;

        let client = LlmClient::new(Provider::Anthropic, &server.url())
            .with_api_key(Some("k".into()));
        let reply = client.complete(&[], "hello").await.unwrap();
        assert_eq!(reply, "Hi there");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("model loading")
            .create_async()
            .await;

        let client = LlmClient::new(Provider::Openai, &server.url());
        let err = client.complete(&[], "hi").await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn unreachable_backend_is_unavailable() {
        let client = LlmClient::new(Provider::Openai, "http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(5));
        let err = client.complete(&[], "hi").await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(1));
                w.write_all(br#"{"choices":[{"message":{"content":"late"}}]}"#)
            })
            .create_async()
            .await;

        let client = LlmClient::new(Provider::Openai, &server.url())
            .with_timeout(Duration::from_millis(100));
        let err = client.complete(&[], "hi").await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout(d) if d == Duration::from_millis(100)));
    }
}
