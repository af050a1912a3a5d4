//! Duplex voice session protocol.
//!
//! Client and server exchange JSON text frames tagged by a `type` field.
//! Field names are camelCase on the wire to match the browser client.

use crate::{PipelineMode, ProblemInfo, TestResult, WhiteboardState};
use serde::{Deserialize, Serialize};

/// Events sent by the browser client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "start_listening")]
    StartListening,
    #[serde(rename = "audio_chunk")]
    AudioChunk {
        /// Base64-encoded audio bytes.
        data: String,
    },
    #[serde(rename = "stop_listening")]
    StopListening,
    #[serde(rename = "interrupt")]
    Interrupt,
    #[serde(rename = "code_update")]
    CodeUpdate { code: String, language: String },
    #[serde(rename = "code_result")]
    CodeResult {
        results: Vec<TestResult>,
        #[serde(default)]
        stdout: String,
        #[serde(default)]
        stderr: String,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename = "hint_request")]
    HintRequest,
    #[serde(rename = "whiteboard_update")]
    WhiteboardUpdate { state: WhiteboardState },
    #[serde(rename = "config")]
    Config {
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        speed: Option<f32>,
    },
}

/// Machine-readable error categories surfaced to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No usable audio or an empty transcript.
    NoSpeech,
    SttFailed,
    LlmFailed,
    TtsFailed,
    /// Several consecutive runs failed; the client should consider reconnecting.
    ConnectionDegraded,
    InvalidConfig,
    BadRequest,
    InitFailed,
}

/// Events sent to the browser client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "state_change")]
    StateChange { state: PipelineMode },
    #[serde(rename = "transcript")]
    Transcript {
        text: String,
        #[serde(rename = "final")]
        is_final: bool,
    },
    /// One streamed token (`done: false`), or the end-of-stream marker
    /// (`done: true` with empty text).
    #[serde(rename = "ai_text")]
    AiText { text: String, done: bool },
    #[serde(rename = "ai_audio")]
    AiAudio {
        /// Base64-encoded audio frame.
        data: String,
    },
    #[serde(rename = "ai_audio_done")]
    AiAudioDone,
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(rename = "errorType", skip_serializing_if = "Option::is_none")]
        error_type: Option<ErrorKind>,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry: Option<bool>,
        #[serde(rename = "fallbackText", skip_serializing_if = "Option::is_none")]
        fallback_text: Option<String>,
    },
    #[serde(rename = "hint_given")]
    HintGiven {
        level: u32,
        #[serde(rename = "totalHints")]
        total_hints: u32,
    },
    #[serde(rename = "question_update")]
    QuestionUpdate {
        current: u32,
        total: u32,
        /// Unix epoch milliseconds at which the current question started.
        #[serde(rename = "questionStartTime")]
        question_start_time: i64,
        #[serde(rename = "recommendedSeconds")]
        recommended_seconds: u64,
    },
    #[serde(rename = "time_warning")]
    TimeWarning {
        #[serde(rename = "minutesLeft")]
        minutes_left: u64,
    },
    #[serde(rename = "latency_report")]
    LatencyReport {
        #[serde(rename = "sttMs")]
        stt_ms: u64,
        #[serde(rename = "llmFirstTokenMs")]
        llm_first_token_ms: u64,
        #[serde(rename = "ttsFirstChunkMs")]
        tts_first_chunk_ms: u64,
        #[serde(rename = "totalMs")]
        total_ms: u64,
    },
    #[serde(rename = "solution_comparison")]
    SolutionComparison {
        #[serde(rename = "userSolution")]
        user_solution: String,
        #[serde(rename = "optimalSolution")]
        optimal_solution: String,
        #[serde(rename = "timeComplexity", skip_serializing_if = "Option::is_none")]
        time_complexity: Option<String>,
        #[serde(rename = "spaceComplexity", skip_serializing_if = "Option::is_none")]
        space_complexity: Option<String>,
    },
    #[serde(rename = "problem_loaded")]
    ProblemLoaded { problem: ProblemInfo },
    #[serde(rename = "design_problem_loaded")]
    DesignProblemLoaded { problem: ProblemInfo },
}

impl ServerEvent {
    /// Builds an `error` event with a category and no retry hint.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            error_type: Some(kind),
            retry: None,
            fallback_text: None,
        }
    }

    /// Builds an `error` event the client may retry.
    pub fn retryable(
        kind: ErrorKind,
        message: impl Into<String>,
        fallback_text: Option<String>,
    ) -> Self {
        Self::Error {
            message: message.into(),
            error_type: Some(kind),
            retry: Some(true),
            fallback_text,
        }
    }

    /// Returns the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StateChange { .. } => "state_change",
            Self::Transcript { .. } => "transcript",
            Self::AiText { .. } => "ai_text",
            Self::AiAudio { .. } => "ai_audio",
            Self::AiAudioDone => "ai_audio_done",
            Self::Error { .. } => "error",
            Self::HintGiven { .. } => "hint_given",
            Self::QuestionUpdate { .. } => "question_update",
            Self::TimeWarning { .. } => "time_warning",
            Self::LatencyReport { .. } => "latency_report",
            Self::SolutionComparison { .. } => "solution_comparison",
            Self::ProblemLoaded { .. } => "problem_loaded",
            Self::DesignProblemLoaded { .. } => "design_problem_loaded",
        }
    }
}
