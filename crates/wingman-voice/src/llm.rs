//! Streaming chat completions over an OpenAI-compatible SSE endpoint.

use crate::config::{join_url, VoiceConfig};
use crate::error::VoiceError;
use crate::sse::{frame_stream, Frame};
use async_trait::async_trait;
use futures_util::stream::{BoxStream, Stream};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use wingman_types::ConversationTurn;

/// Tokens of one completion, in generation order.
pub type TokenStream = BoxStream<'static, Result<String, VoiceError>>;

/// Source of streamed completions.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Opens a completion stream for `messages`.
    ///
    /// Errors returned here mean the request never produced a stream. Errors
    /// yielded by the stream mean it broke after opening.
    async fn stream(&self, messages: &[ConversationTurn]) -> Result<TokenStream, VoiceError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkError {
    message: String,
}

/// Completion client for OpenRouter (or any OpenAI-compatible gateway).
#[derive(Debug, Clone)]
pub struct OpenRouterCompleter {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    site_url: String,
    app_name: String,
}

impl OpenRouterCompleter {
    pub fn new(http: reqwest::Client, config: &VoiceConfig) -> Self {
        Self {
            http,
            url: join_url(&config.llm_url, "chat/completions"),
            api_key: config.openrouter_api_key.clone(),
            model: config.llm_model.clone(),
            site_url: config.site_url.clone(),
            app_name: config.app_name.clone(),
        }
    }
}

#[async_trait]
impl Completer for OpenRouterCompleter {
    async fn stream(&self, messages: &[ConversationTurn]) -> Result<TokenStream, VoiceError> {
        let body = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|turn| ChatMessage {
                    role: turn.role.as_str(),
                    content: &turn.content,
                })
                .collect(),
            stream: true,
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.app_name)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Llm(format!(
                "completion request failed with status {status}: {}",
                crate::truncate_detail(&detail)
            )));
        }

        debug!(model = %self.model, turns = messages.len(), "completion stream opened");
        Ok(decode_token_stream(response.bytes_stream()))
    }
}

/// Turns an SSE byte stream into completion tokens.
///
/// Empty deltas and unparseable payloads are skipped. An in-band `error`
/// object ends the stream with `VoiceError::Llm`.
pub fn decode_token_stream<S, B, E>(bytes: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    frame_stream(bytes, VoiceError::Llm, parse_chunk)
}

fn parse_chunk(data: &str) -> Frame<String> {
    let chunk: ChatChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(error = %e, "skipping unparseable completion chunk");
            return Frame::Skip;
        }
    };
    if let Some(err) = chunk.error {
        return Frame::Fail(VoiceError::Llm(err.message));
    }
    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
    {
        Some(token) if !token.is_empty() => Frame::Item(token),
        _ => Frame::Skip,
    }
}
