use crate::config::{join_url, VoiceConfig};
use crate::error::VoiceError;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Maximum audio input size for STT (10 MiB). Prevents OOM from oversized payloads.
pub const MAX_STT_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// Speech-to-text over a complete utterance.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes `audio` and returns the trimmed text, which may be empty.
    async fn transcribe(&self, audio: Vec<u8>, language: &str) -> Result<String, VoiceError>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Transcription client for a fal-hosted, OpenAI-compatible STT app.
#[derive(Debug, Clone)]
pub struct FalTranscriber {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl FalTranscriber {
    pub fn new(http: reqwest::Client, config: &VoiceConfig) -> Self {
        Self {
            http,
            url: join_url(&config.stt_url, "audio/transcriptions"),
            api_key: config.fal_key.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for FalTranscriber {
    async fn transcribe(&self, audio: Vec<u8>, language: &str) -> Result<String, VoiceError> {
        if audio.len() > MAX_STT_INPUT_BYTES {
            return Err(VoiceError::Stt(format!(
                "audio data exceeds maximum size: {} bytes (limit: {} bytes)",
                audio.len(),
                MAX_STT_INPUT_BYTES
            )));
        }

        let size = audio.len();
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("audio.webm")
            .mime_str("audio/webm")?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("language", language.to_string());

        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, format!("Key {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Stt(format!(
                "transcription failed with status {status}: {}",
                crate::truncate_detail(&detail)
            )));
        }

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Stt(format!("invalid transcription response: {e}")))?;
        debug!(bytes = size, chars = body.text.len(), "transcription complete");
        Ok(body.text.trim().to_string())
    }
}
