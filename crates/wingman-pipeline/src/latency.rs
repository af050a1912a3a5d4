use std::time::{Duration, Instant};
use wingman_types::ServerEvent;

/// A span measured once per run: the first `start` opens it and the first
/// `mark` after that closes it. Later calls are ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSpan {
    started: Option<Instant>,
    elapsed: Option<Duration>,
}

impl FirstSpan {
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    pub fn start_at(&mut self, at: Instant) {
        if self.started.is_none() {
            self.started = Some(at);
        }
    }

    pub fn mark(&mut self) {
        if let (Some(started), None) = (self.started, self.elapsed) {
            self.elapsed = Some(started.elapsed());
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// Elapsed milliseconds, or 0 if the span never closed.
    pub fn millis(&self) -> u64 {
        self.elapsed.map_or(0, |d| d.as_millis() as u64)
    }
}

/// Latency components of one completed run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyReport {
    /// Capture stop to transcript; 0 for runs without audio.
    pub stt_ms: u64,
    /// Completion request to first token.
    pub llm_first_token_ms: u64,
    /// First synthesis request to first audio byte; 0 if no audio was produced.
    pub tts_first_chunk_ms: u64,
}

impl LatencyReport {
    pub fn from_spans(stt: &FirstSpan, llm: &FirstSpan, tts: &FirstSpan) -> Self {
        Self {
            stt_ms: stt.millis(),
            llm_first_token_ms: llm.millis(),
            tts_first_chunk_ms: tts.millis(),
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.stt_ms + self.llm_first_token_ms + self.tts_first_chunk_ms
    }

    pub fn to_event(self) -> ServerEvent {
        ServerEvent::LatencyReport {
            stt_ms: self.stt_ms,
            llm_first_token_ms: self.llm_first_token_ms,
            tts_first_chunk_ms: self.tts_first_chunk_ms,
            total_ms: self.total_ms(),
        }
    }
}
