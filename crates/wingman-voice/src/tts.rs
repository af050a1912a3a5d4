use crate::config::{join_url, VoiceConfig};
use crate::error::VoiceError;
use crate::sse::{frame_stream, Frame};
use async_trait::async_trait;
use base64::Engine;
use futures_util::stream::{BoxStream, Stream};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Maximum text input size for TTS (64 KiB). Prevents resource exhaustion from
/// oversized synthesis requests.
pub const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Speed bounds accepted by the synthesis service.
pub const MIN_SPEED: f32 = 0.1;
pub const MAX_SPEED: f32 = 10.0;

/// Decoded audio frames of one utterance, in playback order.
pub type AudioStream = BoxStream<'static, Result<Vec<u8>, VoiceError>>;

/// Text-to-speech with a streaming path and a one-shot fallback.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Starts streaming synthesis of `text`.
    async fn open_stream(&self, text: &str, speed: f32) -> Result<AudioStream, VoiceError>;

    /// Synthesizes `text` in one request and returns the complete payload.
    async fn synthesize_full(&self, text: &str, speed: f32) -> Result<Vec<u8>, VoiceError>;
}

/// Rejects requests the synthesis service would refuse anyway.
pub fn validate_request(text: &str, speed: f32) -> Result<(), VoiceError> {
    if text.trim().is_empty() {
        return Err(VoiceError::Tts("text is empty".to_string()));
    }
    if text.len() > MAX_TTS_INPUT_BYTES {
        return Err(VoiceError::Tts(format!(
            "text exceeds maximum size: {} bytes (limit: {} bytes)",
            text.len(),
            MAX_TTS_INPUT_BYTES
        )));
    }
    validate_speed(speed)
}

pub fn validate_speed(speed: f32) -> Result<(), VoiceError> {
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        return Err(VoiceError::Config(format!(
            "Speed must be between {MIN_SPEED} and {MAX_SPEED}"
        )));
    }
    Ok(())
}

#[derive(Serialize)]
struct StreamRequest<'a> {
    input: &'a str,
    speed: f32,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    input: &'a str,
    response_format: &'static str,
    speed: f32,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<StreamEventError>,
}

#[derive(Deserialize)]
struct StreamEventError {
    message: String,
}

/// Synthesis client for a fal-hosted TTS app.
#[derive(Debug, Clone)]
pub struct FalSynthesizer {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FalSynthesizer {
    pub fn new(http: reqwest::Client, config: &VoiceConfig) -> Self {
        Self {
            http,
            base_url: config.tts_url.clone(),
            api_key: config.fal_key.clone(),
        }
    }

    fn auth(&self) -> String {
        format!("Key {}", self.api_key)
    }
}

#[async_trait]
impl Synthesizer for FalSynthesizer {
    async fn open_stream(&self, text: &str, speed: f32) -> Result<AudioStream, VoiceError> {
        validate_request(text, speed)?;

        let response = self
            .http
            .post(join_url(&self.base_url, "stream"))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&StreamRequest { input: text, speed })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!(
                "stream request failed with status {status}: {}",
                crate::truncate_detail(&detail)
            )));
        }

        Ok(decode_audio_stream(response.bytes_stream()))
    }

    async fn synthesize_full(&self, text: &str, speed: f32) -> Result<Vec<u8>, VoiceError> {
        validate_request(text, speed)?;

        let response = self
            .http
            .post(join_url(&self.base_url, "audio/speech"))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(&SpeechRequest {
                input: text,
                response_format: "pcm",
                speed,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceError::Tts(format!(
                "speech request failed with status {status}"
            )));
        }

        let audio = response.bytes().await?;
        debug!(bytes = audio.len(), "fallback synthesis complete");
        Ok(audio.to_vec())
    }
}

/// Turns a synthesis SSE body into decoded audio frames.
///
/// `done: true` ends the stream after any audio carried by the same event.
/// An `error` event ends it with `VoiceError::Tts`.
pub fn decode_audio_stream<S, B, E>(bytes: S) -> AudioStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let mut saw_done = false;
    frame_stream(bytes, VoiceError::Tts, move |data: &str| {
        if saw_done {
            return Frame::End;
        }
        let event: StreamEvent = match serde_json::from_str(data) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "skipping unparseable synthesis event");
                return Frame::Skip;
            }
        };
        if let Some(err) = event.error {
            return Frame::Fail(VoiceError::Tts(err.message));
        }
        saw_done = event.done;
        match event.audio.filter(|a| !a.is_empty()) {
            Some(encoded) => match base64::engine::general_purpose::STANDARD.decode(encoded) {
                Ok(audio) => Frame::Item(audio),
                Err(e) => Frame::Fail(VoiceError::Tts(format!("invalid audio frame: {e}"))),
            },
            None if saw_done => Frame::End,
            None => Frame::Skip,
        }
    })
}
