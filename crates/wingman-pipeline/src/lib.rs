//! The Wingman voice interview pipeline.
//!
//! A [`Session`] owns one candidate's conversation and reacts to client
//! events. Each time the candidate finishes speaking (or a hint, code
//! result or timer asks the interviewer to respond), the session starts a
//! run that transcribes, streams a completion, splits it into utterances
//! with the [`SentenceChunker`] and synthesizes them while the completion is
//! still arriving.
//!
//! Remote services and persistence are reached through traits
//! ([`wingman_voice::Transcriber`], [`wingman_voice::Completer`],
//! [`wingman_voice::Synthesizer`], [`SessionStore`]) so the whole pipeline
//! can run against mocks.

pub mod chunker;
pub mod context;
pub mod error;
pub mod latency;
mod orchestrator;
pub mod prompts;
pub mod session;
pub mod store;

pub use chunker::SentenceChunker;
pub use context::CodeSnapshot;
pub use error::PipelineError;
pub use latency::LatencyReport;
pub use orchestrator::DEGRADED_AFTER_FAILURES;
pub use session::{Services, Session, SessionOptions, HISTORY_REPLAY_LIMIT, MIN_AUDIO_BYTES};
pub use store::{MemoryStore, SessionStore};
