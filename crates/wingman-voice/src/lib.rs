//! Remote voice services for the Wingman interview pipeline.
//!
//! Three network clients sit behind traits so the pipeline can be driven by
//! mocks in tests:
//!
//! - [`Transcriber`]: one complete utterance of audio in, text out.
//! - [`Completer`]: a role-tagged message list in, a token stream out.
//! - [`Synthesizer`]: text in, a stream of audio frames out, with a
//!   one-shot fallback for when streaming fails.
//!
//! The concrete clients talk to fal (STT/TTS) and OpenRouter (LLM) over
//! `reqwest`. Streaming responses are Server-Sent Events decoded by
//! [`sse`]. [`pronunciation`] prepares text for the synthesizer.

pub mod config;
pub mod error;
pub mod llm;
pub mod pronunciation;
pub mod sse;
pub mod stt;
pub mod tts;

pub use config::VoiceConfig;
pub use error::VoiceError;
pub use llm::{Completer, OpenRouterCompleter, TokenStream};
pub use pronunciation::normalize;
pub use stt::{FalTranscriber, Transcriber};
pub use tts::{AudioStream, FalSynthesizer, Synthesizer};

use std::time::Duration;

/// Connect timeout for all remote voice services. Reads are bounded by the
/// caller's cancellation instead of a fixed timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest provider error body echoed into an error message.
const MAX_ERROR_DETAIL_CHARS: usize = 200;

/// Builds the HTTP client shared by the voice service clients.
pub fn http_client() -> Result<reqwest::Client, VoiceError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("wingman/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(VoiceError::Http)
}

pub(crate) fn truncate_detail(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_ERROR_DETAIL_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_detail_respects_char_boundaries() {
        let long = "ş".repeat(MAX_ERROR_DETAIL_CHARS + 5);
        let out = truncate_detail(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), MAX_ERROR_DETAIL_CHARS + 3);
        assert_eq!(truncate_detail("  short \n"), "short");
    }
}
