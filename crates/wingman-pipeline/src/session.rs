//! Per-connection voice session: the state machine and its event handlers.
//!
//! A [`Session`] is driven by client events from the transport and by its own
//! interview timers. Long work (a pipeline run) is spawned onto its own task
//! so the transport keeps receiving events, which is what makes `interrupt`
//! effective mid-run.
//!
//! All session state sits behind one `std::sync::Mutex`. It is only held for
//! short synchronous sections and never across `.await`. Outbound events are
//! sent while the lock is held so their order matches the order of state
//! changes.

use crate::context::CodeSnapshot;
use crate::error::PipelineError;
use crate::orchestrator::{self, RunInput, RunContext};
use crate::prompts;
use crate::store::{spawn_writer, PendingWrite, SessionStore};
use base64::Engine;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wingman_types::{
    ClientEvent, ConversationTurn, ErrorKind, InterviewInfo, InterviewType, PipelineMode,
    ProblemInfo, ProblemKind, Role, ServerEvent, TestResult, WhiteboardState,
};
use wingman_voice::{Completer, Synthesizer, Transcriber};

/// Decoded audio shorter than this is treated as no speech.
pub const MIN_AUDIO_BYTES: usize = 1000;

/// Stored messages replayed into the history when a session resumes.
pub const HISTORY_REPLAY_LIMIT: u32 = 50;

/// The remote clients and store a session talks to.
#[derive(Clone)]
pub struct Services {
    pub transcriber: Arc<dyn Transcriber>,
    pub completer: Arc<dyn Completer>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub store: Arc<dyn SessionStore>,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Language until the interview or a `config` event says otherwise.
    pub language: String,
    pub speed: f32,
    pub min_audio_bytes: usize,
    pub history_replay_limit: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            language: "tr".to_string(),
            speed: 1.0,
            min_audio_bytes: MIN_AUDIO_BYTES,
            history_replay_limit: HISTORY_REPLAY_LIMIT,
        }
    }
}

pub(crate) struct QuestionProgress {
    pub(crate) current: u32,
    pub(crate) total: u32,
    pub(crate) all_asked_noted: bool,
}

pub(crate) struct ActiveRun {
    pub(crate) id: Uuid,
    pub(crate) token: CancellationToken,
}

pub(crate) struct SessionState {
    pub(crate) mode: PipelineMode,
    pub(crate) history: Vec<ConversationTurn>,
    pub(crate) language: String,
    pub(crate) speed: f32,
    audio: Vec<u8>,
    pub(crate) interview: Option<InterviewInfo>,
    problem: Option<ProblemInfo>,
    pub(crate) code: Option<CodeSnapshot>,
    pub(crate) whiteboard: Option<String>,
    hint_count: u32,
    pub(crate) questions: Option<QuestionProgress>,
    pub(crate) time_limit: Option<Duration>,
    started_at: Option<tokio::time::Instant>,
    pub(crate) failures: u32,
    pub(crate) active_run: Option<ActiveRun>,
    /// Ordered write queue, present once the session is bound to an interview.
    writer: Option<mpsc::UnboundedSender<PendingWrite>>,
    initialized: bool,
    closed: bool,
}

pub(crate) struct SessionInner {
    pub(crate) id: Uuid,
    pub(crate) services: Services,
    options: SessionOptions,
    outbound: mpsc::UnboundedSender<ServerEvent>,
    state: Mutex<SessionState>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionInner {
    pub(crate) fn send(&self, event: ServerEvent) {
        if self.outbound.send(event).is_err() {
            debug!(session_id = %self.id, "outbound channel closed, dropping event");
        }
    }

    pub(crate) fn set_mode(&self, st: &mut SessionState, mode: PipelineMode) {
        st.mode = mode;
        self.send(ServerEvent::StateChange { state: mode });
    }
}

/// Handle to one voice session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(
        services: Services,
        options: SessionOptions,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        let state = SessionState {
            mode: PipelineMode::Idle,
            history: Vec::new(),
            language: options.language.clone(),
            speed: options.speed,
            audio: Vec::new(),
            interview: None,
            problem: None,
            code: None,
            whiteboard: None,
            hint_count: 0,
            questions: None,
            time_limit: None,
            started_at: None,
            failures: 0,
            active_run: None,
            writer: None,
            initialized: false,
            closed: false,
        };
        Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                services,
                options,
                outbound,
                state: Mutex::new(state),
                timers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn mode(&self) -> PipelineMode {
        self.lock().mode
    }

    pub fn history(&self) -> Vec<ConversationTurn> {
        self.lock().history.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().active_run.is_some()
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    /// Reports a problem that is not tied to a run, such as a malformed frame.
    pub fn send_error(&self, kind: ErrorKind, message: &str) {
        self.inner.send(ServerEvent::error(kind, message));
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Loads the interview and prepares the history. Without an interview id
    /// (or when the interview cannot be loaded) the session runs in free mode.
    pub async fn init(&self, interview_id: Option<&str>) {
        {
            let mut st = self.lock();
            if st.initialized {
                return;
            }
            st.initialized = true;
        }

        let Some(interview_id) = interview_id else {
            self.init_free_mode();
            return;
        };

        let store = Arc::clone(&self.inner.services.store);
        let info = match store.load_interview(interview_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(session_id = %self.id(), %interview_id, error = %e, "failed to load interview");
                self.inner.send(ServerEvent::error(
                    ErrorKind::InitFailed,
                    "Interview could not be loaded",
                ));
                self.init_free_mode();
                return;
            }
        };

        let mut turns = vec![ConversationTurn::system(prompts::system_prompt(
            info.kind,
            info.difficulty,
            &info.language,
        ))];

        let problem_kind = match info.kind {
            InterviewType::LiveCoding | InterviewType::Practice => Some(ProblemKind::Coding),
            InterviewType::SystemDesign => Some(ProblemKind::Design),
            InterviewType::PhoneScreen => None,
        };
        let mut problem = None;
        if let Some(kind) = problem_kind {
            match store.random_problem(kind, info.difficulty).await {
                Ok(Some(p)) => {
                    if let Err(e) = store.assign_problem(&info.id, &p.id).await {
                        warn!(session_id = %self.id(), interview_id = %info.id, error = %e, "failed to link problem");
                    }
                    turns.push(ConversationTurn::system(prompts::problem_context(&p)));
                    problem = Some(p);
                }
                Ok(None) => {
                    info!(session_id = %self.id(), kind = kind.as_str(), "no problem available for interview");
                }
                Err(e) => {
                    warn!(session_id = %self.id(), error = %e, "failed to load problem");
                }
            }
        }

        match store
            .recent_messages(&info.id, self.inner.options.history_replay_limit)
            .await
        {
            Ok(messages) => turns.extend(messages.into_iter().filter(|m| m.role != Role::System)),
            Err(e) => warn!(session_id = %self.id(), error = %e, "failed to replay history"),
        }

        let time_limit = prompts::time_limit(info.kind, info.difficulty);
        {
            let mut st = self.lock();
            if st.closed {
                return;
            }
            st.language = info.language.clone();
            st.history.extend(turns);
            st.time_limit = time_limit;
            st.started_at = Some(tokio::time::Instant::now());

            if let Some(p) = &problem {
                self.inner.send(match p.kind {
                    ProblemKind::Coding => ServerEvent::ProblemLoaded { problem: p.clone() },
                    ProblemKind::Design => ServerEvent::DesignProblemLoaded { problem: p.clone() },
                });
            }
            st.problem = problem;

            if info.kind == InterviewType::PhoneScreen {
                let total = info
                    .question_count
                    .filter(|n| *n > 0)
                    .unwrap_or(prompts::DEFAULT_QUESTION_COUNT);
                let progress = QuestionProgress {
                    current: 1,
                    total,
                    all_asked_noted: false,
                };
                self.inner
                    .send(question_update(&progress, st.time_limit));
                st.questions = Some(progress);
            }

            info!(
                session_id = %self.id(),
                interview_id = %info.id,
                kind = info.kind.as_str(),
                history = st.history.len(),
                "session initialized"
            );
            st.writer = Some(spawn_writer(store, self.id(), info.id.clone()));
            st.interview = Some(info);
        }

        if let Some(limit) = time_limit {
            self.schedule_timers(limit);
        }
    }

    fn init_free_mode(&self) {
        let mut st = self.lock();
        let prompt = prompts::free_mode_prompt(&st.language);
        st.history.push(ConversationTurn::system(prompt));
        info!(session_id = %self.id(), "session initialized in free mode");
    }

    fn schedule_timers(&self, limit: Duration) {
        let warn_after = limit.mul_f64(prompts::TIME_WARNING_FRACTION);
        let weak = Arc::downgrade(&self.inner);

        let warning = tokio::spawn({
            let weak = weak.clone();
            async move {
                tokio::time::sleep(warn_after).await;
                if let Some(inner) = weak.upgrade() {
                    Session { inner }.on_time_warning(limit);
                }
            }
        });
        let time_up = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            if let Some(inner) = weak.upgrade() {
                Session { inner }.on_time_up();
            }
        });

        let mut timers = self.inner.timers.lock().unwrap_or_else(|e| e.into_inner());
        timers.push(warning);
        timers.push(time_up);
    }

    fn on_time_warning(&self, limit: Duration) {
        let mut st = self.lock();
        if st.closed {
            return;
        }
        let elapsed = st.started_at.map(|t| t.elapsed()).unwrap_or_default();
        let minutes_left = limit.saturating_sub(elapsed).as_secs().div_ceil(60);
        self.inner.send(ServerEvent::TimeWarning { minutes_left });
        st.history
            .push(ConversationTurn::system(prompts::time_warning_notice(minutes_left)));
        info!(session_id = %self.id(), minutes_left, "time warning sent");
    }

    fn on_time_up(&self) {
        let mut st = self.lock();
        if st.closed {
            return;
        }
        st.history
            .push(ConversationTurn::system(prompts::TIME_UP_NOTICE));
        info!(session_id = %self.id(), "interview time is up");
        if st.active_run.is_none() {
            self.start_run_locked(&mut st, RunInput::History);
        }
    }

    /// Dispatches one client event. Never blocks on remote calls.
    pub fn handle(&self, event: ClientEvent) {
        match event {
            ClientEvent::StartListening => self.start_listening(),
            ClientEvent::AudioChunk { data } => self.push_audio(&data),
            ClientEvent::StopListening => self.stop_listening(),
            ClientEvent::Interrupt => self.interrupt(),
            ClientEvent::CodeUpdate { code, language } => self.update_code(code, language),
            ClientEvent::CodeResult {
                results,
                stderr,
                error,
                ..
            } => self.submit_code_result(&results, &stderr, error.as_deref()),
            ClientEvent::HintRequest => self.request_hint(),
            ClientEvent::WhiteboardUpdate { state } => self.update_whiteboard(state),
            ClientEvent::Config { language, speed } => {
                if let Err(e) = self.configure(language, speed) {
                    self.inner
                        .send(ServerEvent::error(ErrorKind::InvalidConfig, e.to_string()));
                }
            }
        }
    }

    pub fn start_listening(&self) {
        let mut st = self.lock();
        if st.active_run.is_some() {
            warn!(session_id = %self.id(), "start_listening rejected while a run is active");
            return;
        }
        st.audio.clear();
        self.inner.set_mode(&mut st, PipelineMode::Listening);
    }

    /// Buffers one base64 audio chunk. Chunks outside `listening` are dropped.
    pub fn push_audio(&self, data: &str) {
        let bytes = match base64::engine::general_purpose::STANDARD.decode(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(session_id = %self.id(), error = %e, "dropping undecodable audio chunk");
                return;
            }
        };
        let mut st = self.lock();
        if st.mode != PipelineMode::Listening {
            debug!(session_id = %self.id(), mode = %st.mode, "dropping audio chunk outside listening");
            return;
        }
        st.audio.extend_from_slice(&bytes);
    }

    pub fn stop_listening(&self) {
        let mut st = self.lock();
        if st.active_run.is_some() {
            debug!(session_id = %self.id(), "stop_listening ignored while a run is active");
            return;
        }
        let audio = std::mem::take(&mut st.audio);
        if st.mode != PipelineMode::Listening || audio.is_empty() {
            self.inner.set_mode(&mut st, PipelineMode::Idle);
            return;
        }
        if audio.len() < self.inner.options.min_audio_bytes {
            debug!(session_id = %self.id(), bytes = audio.len(), "audio too short to transcribe");
            self.inner
                .send(ServerEvent::error(ErrorKind::NoSpeech, "No speech detected"));
            self.inner.set_mode(&mut st, PipelineMode::Idle);
            return;
        }
        self.start_run_locked(
            &mut st,
            RunInput::Audio {
                audio,
                stopped_at: Instant::now(),
            },
        );
    }

    /// Cancels the active run, if any, and returns to idle. Idempotent.
    pub fn interrupt(&self) {
        let mut st = self.lock();
        if let Some(run) = st.active_run.take() {
            run.token.cancel();
            info!(session_id = %self.id(), run_id = %run.id, "run interrupted");
        }
        st.audio.clear();
        self.inner.send(ServerEvent::AiAudioDone);
        self.inner.set_mode(&mut st, PipelineMode::Idle);
    }

    pub fn update_code(&self, code: String, language: String) {
        self.lock().code = Some(CodeSnapshot { code, language });
    }

    /// Adds a sandbox result to the conversation and lets the interviewer react.
    pub fn submit_code_result(&self, results: &[TestResult], stderr: &str, error: Option<&str>) {
        let summary = prompts::code_result_summary(results, stderr, error);
        let mut st = self.lock();
        st.history.push(ConversationTurn::user(summary.clone()));
        self.persist(&st, Role::User, summary);

        let practice = st
            .interview
            .as_ref()
            .is_some_and(|i| i.kind == InterviewType::Practice);
        let all_passed = !results.is_empty() && results.iter().all(|r| r.passed);
        if practice && all_passed {
            if let Some((problem, optimal)) = st
                .problem
                .as_ref()
                .and_then(|p| p.optimal_solution.as_ref().map(|o| (p, o)))
            {
                self.inner.send(ServerEvent::SolutionComparison {
                    user_solution: st.code.as_ref().map(|c| c.code.clone()).unwrap_or_default(),
                    optimal_solution: optimal.clone(),
                    time_complexity: problem.time_complexity.clone(),
                    space_complexity: problem.space_complexity.clone(),
                });
            }
        }

        if st.active_run.is_none() {
            self.start_run_locked(&mut st, RunInput::History);
        }
    }

    /// Gives the next hint level. Rejected while a run is active.
    pub fn request_hint(&self) {
        let mut st = self.lock();
        if st.active_run.is_some() {
            info!(session_id = %self.id(), "hint request rejected while a run is active");
            return;
        }
        st.hint_count += 1;
        let total = st.hint_count;
        let level = prompts::hint_level(total);

        self.inner.send(ServerEvent::HintGiven {
            level,
            total_hints: total,
        });
        st.history
            .push(ConversationTurn::user(prompts::hint_instruction(level, total)));
        self.persist(&st, Role::User, prompts::hint_marker(level));
        self.start_run_locked(&mut st, RunInput::History);
    }

    pub fn update_whiteboard(&self, state: WhiteboardState) {
        let text = state.text_representation.trim();
        let mut st = self.lock();
        st.whiteboard = (!text.is_empty()).then(|| text.to_string());

        if st.writer.is_none() {
            return;
        }
        match serde_json::to_string(&state) {
            Ok(json) => self.queue_write(&st, PendingWrite::Whiteboard(json)),
            Err(e) => {
                warn!(session_id = %self.id(), error = %e, "failed to serialize whiteboard state");
            }
        }
    }

    /// Applies a `config` event. An out-of-range speed rejects the whole update.
    pub fn configure(
        &self,
        language: Option<String>,
        speed: Option<f32>,
    ) -> Result<(), PipelineError> {
        if let Some(speed) = speed {
            wingman_voice::tts::validate_speed(speed)?;
        }
        let mut st = self.lock();
        if let Some(language) = language.filter(|l| !l.trim().is_empty()) {
            st.language = language;
        }
        if let Some(speed) = speed {
            st.speed = speed;
        }
        debug!(session_id = %self.id(), language = %st.language, speed = st.speed, "session configured");
        Ok(())
    }

    /// Cancels any active run and stops the interview timers.
    pub fn close(&self) {
        {
            let mut st = self.lock();
            st.closed = true;
            if let Some(run) = st.active_run.take() {
                run.token.cancel();
            }
            // Queued writes still drain.
            st.writer = None;
        }
        let mut timers = self.inner.timers.lock().unwrap_or_else(|e| e.into_inner());
        for timer in timers.drain(..) {
            timer.abort();
        }
        info!(session_id = %self.id(), "session closed");
    }

    /// Starts a run unless one is active. Must be called with the state lock held.
    fn start_run_locked(&self, st: &mut SessionState, input: RunInput) -> bool {
        if st.active_run.is_some() || st.closed {
            return false;
        }
        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        st.active_run = Some(ActiveRun {
            id: run_id,
            token: token.clone(),
        });
        self.inner.set_mode(st, PipelineMode::Processing);
        info!(session_id = %self.id(), %run_id, "run started");

        let ctx = RunContext::new(self.clone(), run_id, token);
        tokio::spawn(orchestrator::execute(ctx, input));
        true
    }

    /// Queues a message write. Free-mode sessions persist nothing.
    pub(crate) fn persist(&self, st: &SessionState, role: Role, content: String) {
        self.queue_write(st, PendingWrite::Message { role, content });
    }

    fn queue_write(&self, st: &SessionState, write: PendingWrite) {
        let Some(writer) = &st.writer else {
            return;
        };
        if writer.send(write).is_err() {
            warn!(session_id = %self.id(), "session writer stopped, dropping write");
        }
    }

    /// Advances the phone-screen question counter after an assistant reply.
    pub(crate) fn track_questions(&self, st: &mut SessionState, reply: &str) {
        let limit = st.time_limit;
        let Some(progress) = st.questions.as_mut() else {
            return;
        };
        if reply.trim_end().ends_with('?') && progress.current < progress.total {
            progress.current += 1;
            self.inner.send(question_update(progress, limit));
        }
        if progress.current >= progress.total && !progress.all_asked_noted {
            progress.all_asked_noted = true;
            let total = progress.total;
            st.history
                .push(ConversationTurn::system(prompts::all_questions_asked(total)));
        }
    }
}

fn question_update(progress: &QuestionProgress, limit: Option<Duration>) -> ServerEvent {
    ServerEvent::QuestionUpdate {
        current: progress.current,
        total: progress.total,
        question_start_time: chrono::Utc::now().timestamp_millis(),
        recommended_seconds: prompts::recommended_seconds(limit, progress.total),
    }
}
