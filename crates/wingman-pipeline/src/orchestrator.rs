//! One pipeline run: transcribe, complete, chunk, synthesize.
//!
//! The completion stream and synthesis overlap. A producer reads tokens,
//! forwards them to the client and feeds finished utterances into a channel.
//! A consumer drains that channel in order and streams each utterance's
//! audio. Both are driven by `tokio::join!` on the run's task.
//!
//! Every event a run emits goes through [`RunContext::emit`], which checks the
//! run's cancellation token while holding the session lock. `interrupt`
//! cancels under that same lock, so nothing from a run reaches the client
//! once the interrupt's `ai_audio_done` has been sent.

use crate::context::build_messages;
use crate::latency::{FirstSpan, LatencyReport};
use crate::session::{Session, SessionInner, SessionState};
use crate::SentenceChunker;
use base64::Engine;
use futures_util::StreamExt;
use std::future::Future;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wingman_types::{ConversationTurn, ErrorKind, PipelineMode, Role, ServerEvent};
use wingman_voice::{Synthesizer, TokenStream, VoiceError};

/// Consecutive failed runs tolerated before failures are reported as
/// `connection_degraded`.
pub const DEGRADED_AFTER_FAILURES: u32 = 3;

pub(crate) enum RunInput {
    /// Captured audio; the run starts by transcribing it.
    Audio { audio: Vec<u8>, stopped_at: Instant },
    /// The history already ends with the turn to respond to.
    History,
}

struct Failure {
    kind: ErrorKind,
    message: String,
    fallback_text: Option<String>,
}

impl Failure {
    fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
            fallback_text: None,
        }
    }
}

enum Outcome {
    Completed {
        reply: String,
        latency: LatencyReport,
        /// Utterances were synthesized but no audio reached the client.
        silent: bool,
    },
    NoSpeech,
    Failed(Failure),
    Cancelled,
}

/// A run's handle on its session.
pub(crate) struct RunContext {
    session: Session,
    id: Uuid,
    token: CancellationToken,
}

impl RunContext {
    pub(crate) fn new(session: Session, id: Uuid, token: CancellationToken) -> Self {
        Self { session, id, token }
    }

    /// Sends `event` unless the run was cancelled. Returns whether it was sent.
    fn emit(&self, event: ServerEvent) -> bool {
        self.with_state(|_, inner| inner.send(event)).is_some()
    }

    /// Runs `f` under the session lock unless the run was cancelled.
    fn with_state<R>(&self, f: impl FnOnce(&mut SessionState, &SessionInner) -> R) -> Option<R> {
        let mut st = self.session.lock();
        if self.token.is_cancelled() {
            return None;
        }
        Some(f(&mut st, &self.session.inner))
    }

    fn set_mode(&self, mode: PipelineMode) -> bool {
        self.with_state(|st, inner| inner.set_mode(st, mode)).is_some()
    }

    fn finish(&self, outcome: Outcome) {
        let mut st = self.session.lock();
        if self.token.is_cancelled() {
            debug!(session_id = %self.session.id(), run_id = %self.id, "run cancelled");
            return;
        }
        if st.active_run.as_ref().is_some_and(|run| run.id == self.id) {
            st.active_run = None;
        }
        let inner = &self.session.inner;

        match outcome {
            Outcome::Completed {
                reply,
                latency,
                silent,
            } => {
                st.history.push(ConversationTurn::assistant(reply.clone()));
                self.session.persist(&st, Role::Assistant, reply.clone());
                self.session.track_questions(&mut st, &reply);
                if silent {
                    self.record_failure(&mut st, None);
                } else {
                    st.failures = 0;
                }
                info!(
                    session_id = %self.session.id(),
                    run_id = %self.id,
                    stt_ms = latency.stt_ms,
                    llm_first_token_ms = latency.llm_first_token_ms,
                    tts_first_chunk_ms = latency.tts_first_chunk_ms,
                    total_ms = latency.total_ms(),
                    "run completed"
                );
                inner.send(latency.to_event());
            }
            Outcome::NoSpeech => {
                inner.send(ServerEvent::error(ErrorKind::NoSpeech, "No speech detected"));
            }
            Outcome::Failed(failure) => self.record_failure(&mut st, Some(failure)),
            Outcome::Cancelled => {}
        }

        inner.send(ServerEvent::AiAudioDone);
        inner.set_mode(&mut st, PipelineMode::Idle);
    }

    /// Counts a failed run and reports it. From the fourth consecutive
    /// failure on, the report is `connection_degraded`.
    fn record_failure(&self, st: &mut SessionState, failure: Option<Failure>) {
        let prior = st.failures;
        st.failures += 1;
        let inner = &self.session.inner;
        warn!(
            session_id = %self.session.id(),
            run_id = %self.id,
            consecutive = st.failures,
            "run failed"
        );

        if prior >= DEGRADED_AFTER_FAILURES {
            let fallback_text = failure.and_then(|f| f.fallback_text);
            inner.send(ServerEvent::retryable(
                ErrorKind::ConnectionDegraded,
                "Connection degraded, please try again",
                fallback_text,
            ));
        } else if let Some(failure) = failure {
            inner.send(ServerEvent::retryable(
                failure.kind,
                failure.message,
                failure.fallback_text,
            ));
        }
    }
}

/// Awaits `fut` unless `token` is cancelled first.
async fn cancellable<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

pub(crate) async fn execute(ctx: RunContext, input: RunInput) {
    let outcome = run(&ctx, input).await;
    ctx.finish(outcome);
}

async fn run(ctx: &RunContext, input: RunInput) -> Outcome {
    let services = ctx.session.inner.services.clone();
    let session_id = ctx.session.id();
    let mut stt_span = FirstSpan::default();

    if let RunInput::Audio { audio, stopped_at } = input {
        stt_span.start_at(stopped_at);
        let Some(language) = ctx.with_state(|st, _| st.language.clone()) else {
            return Outcome::Cancelled;
        };
        debug!(%session_id, bytes = audio.len(), "transcribing");
        let transcript =
            match cancellable(&ctx.token, services.transcriber.transcribe(audio, &language)).await
            {
                None => return Outcome::Cancelled,
                Some(Err(e)) => {
                    warn!(%session_id, error = %e, "transcription failed");
                    return Outcome::Failed(Failure::new(
                        ErrorKind::SttFailed,
                        "Speech recognition failed",
                    ));
                }
                Some(Ok(text)) => text,
            };
        stt_span.mark();

        if transcript.trim().is_empty() {
            return Outcome::NoSpeech;
        }
        let appended = ctx.with_state(|st, inner| {
            inner.send(ServerEvent::Transcript {
                text: transcript.clone(),
                is_final: true,
            });
            st.history.push(ConversationTurn::user(transcript.clone()));
            ctx.session.persist(st, Role::User, transcript.clone());
        });
        if appended.is_none() {
            return Outcome::Cancelled;
        }
    }

    let Some((messages, language, speed)) = ctx.with_state(|st, _| {
        (
            build_messages(&st.history, st.code.as_ref(), st.whiteboard.as_deref()),
            st.language.clone(),
            st.speed,
        )
    }) else {
        return Outcome::Cancelled;
    };

    let mut llm_span = FirstSpan::default();
    llm_span.start();
    let tokens = match cancellable(&ctx.token, services.completer.stream(&messages)).await {
        None => return Outcome::Cancelled,
        Some(Err(e)) => {
            warn!(%session_id, error = %e, "completion request failed");
            return Outcome::Failed(Failure::new(
                ErrorKind::LlmFailed,
                "Response generation failed",
            ));
        }
        Some(Ok(tokens)) => tokens,
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let (produced, consumed) = tokio::join!(
        produce(ctx, tokens, tx, llm_span),
        consume(ctx, services.synthesizer.as_ref(), rx, &language, speed),
    );

    if ctx.token.is_cancelled() {
        return Outcome::Cancelled;
    }
    if let Some(e) = produced.error {
        warn!(%session_id, error = %e, "completion stream broke");
        return Outcome::Failed(Failure {
            kind: ErrorKind::LlmFailed,
            message: "Response generation was interrupted".to_string(),
            fallback_text: (!produced.text.trim().is_empty()).then_some(produced.text),
        });
    }
    if produced.text.trim().is_empty() {
        return Outcome::Failed(Failure::new(ErrorKind::LlmFailed, "Empty response"));
    }

    Outcome::Completed {
        latency: LatencyReport::from_spans(&stt_span, &produced.llm_span, &consumed.tts_span),
        silent: consumed.utterances > 0 && consumed.frames == 0,
        reply: produced.text,
    }
}

struct Produced {
    text: String,
    error: Option<VoiceError>,
    llm_span: FirstSpan,
}

/// Forwards tokens to the client and utterances to the consumer.
async fn produce(
    ctx: &RunContext,
    mut tokens: TokenStream,
    tx: mpsc::UnboundedSender<String>,
    mut llm_span: FirstSpan,
) -> Produced {
    let mut chunker = SentenceChunker::new();
    let mut text = String::new();
    let mut error = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => break,
            next = tokens.next() => next,
        };
        match next {
            Some(Ok(token)) => {
                llm_span.mark();
                text.push_str(&token);
                for chunk in chunker.push(&token) {
                    let _ = tx.send(chunk);
                }
                if !ctx.emit(ServerEvent::AiText {
                    text: token,
                    done: false,
                }) {
                    break;
                }
            }
            Some(Err(e)) => {
                error = Some(e);
                break;
            }
            None => break,
        }
    }

    if error.is_none() {
        if let Some(rest) = chunker.flush() {
            let _ = tx.send(rest);
        }
    }
    ctx.emit(ServerEvent::AiText {
        text: String::new(),
        done: true,
    });

    Produced {
        text,
        error,
        llm_span,
    }
}

#[derive(Default)]
struct Consumed {
    tts_span: FirstSpan,
    utterances: usize,
    frames: usize,
}

/// Synthesizes queued utterances in order until the producer is done.
async fn consume(
    ctx: &RunContext,
    synthesizer: &dyn Synthesizer,
    mut rx: mpsc::UnboundedReceiver<String>,
    language: &str,
    speed: f32,
) -> Consumed {
    let mut out = Consumed::default();
    loop {
        let utterance = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => break,
            next = rx.recv() => match next {
                Some(utterance) => utterance,
                None => break,
            },
        };
        if out.utterances == 0 && !ctx.set_mode(PipelineMode::Speaking) {
            break;
        }
        out.utterances += 1;
        out.tts_span.start();

        let spoken = wingman_voice::normalize(&utterance, language);
        if !speak(ctx, synthesizer, &utterance, &spoken, speed, &mut out).await {
            break;
        }
    }
    out
}

fn audio_event(frame: &[u8]) -> ServerEvent {
    ServerEvent::AiAudio {
        data: base64::engine::general_purpose::STANDARD.encode(frame),
    }
}

/// Streams one utterance, falling back to one-shot synthesis when the stream
/// fails before its first frame. Returns `false` once the run is cancelled.
async fn speak(
    ctx: &RunContext,
    synthesizer: &dyn Synthesizer,
    utterance: &str,
    spoken: &str,
    speed: f32,
    out: &mut Consumed,
) -> bool {
    let session_id = ctx.session.id();
    let mut frames = match cancellable(&ctx.token, synthesizer.open_stream(spoken, speed)).await {
        None => return false,
        Some(Ok(frames)) => Some(frames),
        Some(Err(e)) => {
            warn!(%session_id, error = %e, "streaming synthesis failed, using fallback");
            None
        }
    };

    if let Some(stream) = frames.as_mut() {
        let mut sent = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = ctx.token.cancelled() => return false,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(frame)) if frame.is_empty() => {}
                Some(Ok(frame)) => {
                    out.tts_span.mark();
                    if !ctx.emit(audio_event(&frame)) {
                        return false;
                    }
                    sent += 1;
                    out.frames += 1;
                }
                Some(Err(e)) if sent == 0 => {
                    warn!(%session_id, error = %e, "synthesis stream failed before audio, using fallback");
                    break;
                }
                Some(Err(e)) => {
                    warn!(%session_id, error = %e, frames = sent, "synthesis stream broke mid-utterance");
                    return ctx.emit(ServerEvent::Error {
                        message: "Speech synthesis was interrupted".to_string(),
                        error_type: Some(ErrorKind::TtsFailed),
                        retry: Some(false),
                        fallback_text: Some(utterance.to_string()),
                    });
                }
                None => break,
            }
        }
        if sent > 0 {
            return true;
        }
    }

    match cancellable(&ctx.token, synthesizer.synthesize_full(spoken, speed)).await {
        None => false,
        Some(Ok(audio)) if !audio.is_empty() => {
            out.tts_span.mark();
            out.frames += 1;
            ctx.emit(audio_event(&audio))
        }
        Some(Ok(_)) => {
            warn!(%session_id, "fallback synthesis returned no audio");
            ctx.emit(ServerEvent::retryable(
                ErrorKind::TtsFailed,
                "Speech synthesis failed",
                Some(utterance.to_string()),
            ))
        }
        Some(Err(e)) => {
            warn!(%session_id, error = %e, "fallback synthesis failed");
            ctx.emit(ServerEvent::retryable(
                ErrorKind::TtsFailed,
                "Speech synthesis failed",
                Some(utterance.to_string()),
            ))
        }
    }
}
