//! OpenAI-compatible Chat Completions backend

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource, retry::Never};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    providers::CompletionBackend,
    stream::{StreamEvent, TokenStream},
    types::{ChatMessage, ChatRequest},
};

/// Connection settings for an OpenAI-compatible server
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL, e.g. `http://localhost:8000/v1`
    pub base_url: String,
    /// Bearer token, if the server wants one
    pub api_key: Option<String>,
    /// Deadline for non-streaming calls and for establishing a stream
    pub request_timeout: Duration,
    /// Longest gap tolerated between two stream events
    pub stream_idle_timeout: Duration,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
            stream_idle_timeout: Duration::from_secs(60),
        }
    }
}

/// Client for any server speaking the Chat Completions protocol
pub struct OpenAICompatClient {
    client: reqwest::Client,
    config: OpenAIConfig,
}

impl OpenAICompatClient {
    /// Create a new client
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("base_url must not be empty".into()));
        }

        // No overall timeout on the client: it would cut long streams short.
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn post(&self, body: &WireRequest<'_>) -> reqwest::RequestBuilder {
        let builder = self.client.post(self.endpoint()).json(body);
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.config.request_timeout)
        } else {
            Error::Http(err)
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAICompatClient {
    async fn stream(&self, request: &ChatRequest) -> Result<TokenStream> {
        let body = WireRequest::new(request, true);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Opening completion stream"
        );

        let mut event_source = EventSource::new(self.post(&body))
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;
        event_source.set_retry_policy(Box::new(Never));

        Ok(Box::pin(create_stream(
            event_source,
            self.config.stream_idle_timeout,
        )))
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = WireRequest::new(request, false);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .post(&body)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::status(status.as_u16(), text));
        }

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        let parsed: CompletionResponse = serde_json::from_str(&text)?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::UnexpectedResponse("response has no message content".into()))
    }
}

fn create_stream(
    mut event_source: EventSource,
    idle_timeout: Duration,
) -> impl futures::Stream<Item = StreamEvent> {
    stream! {
        loop {
            let next = match tokio::time::timeout(idle_timeout, event_source.next()).await {
                Ok(next) => next,
                Err(_) => {
                    event_source.close();
                    yield StreamEvent::error(Error::Timeout(idle_timeout).to_string());
                    return;
                }
            };

            let Some(event) = next else {
                break;
            };

            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data.trim() == "[DONE]" {
                        break;
                    }

                    match parse_data_payload(&msg.data) {
                        Ok(Some(text)) => yield StreamEvent::Delta { text },
                        Ok(None) => {}
                        Err(e) => {
                            warn!("Skipping malformed stream chunk: {}", e);
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    event_source.close();
                    let body = response.text().await.unwrap_or_default();
                    yield StreamEvent::error(Error::status(status.as_u16(), body).to_string());
                    return;
                }
                Err(e) => {
                    event_source.close();
                    yield StreamEvent::error(Error::Sse(e.to_string()).to_string());
                    return;
                }
            }
        }

        event_source.close();
        yield StreamEvent::Done;
    }
}

/// Extract the token carried by one `data:` payload.
///
/// Returns `Ok(None)` for chunks without text, such as role announcements or
/// the final chunk carrying only a finish reason.
pub fn parse_data_payload(data: &str) -> Result<Option<String>> {
    let chunk: StreamChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty()))
}

// Wire types

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl<'a> WireRequest<'a> {
    fn new(request: &'a ChatRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: &request.messages,
            stream,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}
