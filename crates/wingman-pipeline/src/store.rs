//! Persistence seam for voice sessions.
//!
//! Sessions read interview setup and history through [`SessionStore`] and
//! write messages and whiteboard snapshots back. Writes go through one
//! [`spawn_writer`] task per session, so they commit in the order they were
//! made. Write failures are logged and never abort a run.

use crate::error::PipelineError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;
use wingman_types::{ConversationTurn, Difficulty, InterviewInfo, ProblemInfo, ProblemKind, Role};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_interview(&self, interview_id: &str) -> Result<InterviewInfo, PipelineError>;

    async fn random_problem(
        &self,
        kind: ProblemKind,
        difficulty: Difficulty,
    ) -> Result<Option<ProblemInfo>, PipelineError>;

    async fn assign_problem(&self, interview_id: &str, problem_id: &str)
        -> Result<(), PipelineError>;

    /// The most recent `limit` messages, oldest first.
    async fn recent_messages(
        &self,
        interview_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, PipelineError>;

    async fn append_message(
        &self,
        interview_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), PipelineError>;

    async fn save_whiteboard(&self, interview_id: &str, state_json: &str)
        -> Result<(), PipelineError>;
}

/// A write queued by a session for its interview.
#[derive(Debug)]
pub(crate) enum PendingWrite {
    Message { role: Role, content: String },
    Whiteboard(String),
}

/// Starts the task that applies a session's writes one at a time.
///
/// The task exits once every sender is dropped and the queue is drained.
pub(crate) fn spawn_writer(
    store: Arc<dyn SessionStore>,
    session_id: Uuid,
    interview_id: String,
) -> mpsc::UnboundedSender<PendingWrite> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PendingWrite>();
    tokio::spawn(async move {
        while let Some(write) = rx.recv().await {
            let (what, result) = match write {
                PendingWrite::Message { role, content } => (
                    role.as_str(),
                    store.append_message(&interview_id, role, &content).await,
                ),
                PendingWrite::Whiteboard(state_json) => (
                    "whiteboard",
                    store.save_whiteboard(&interview_id, &state_json).await,
                ),
            };
            if let Err(e) = result {
                warn!(%session_id, %interview_id, write = what, error = %e, "failed to persist session write");
            }
        }
        debug!(%session_id, %interview_id, "session writer finished");
    });
    tx
}

#[derive(Default)]
struct MemoryData {
    interviews: HashMap<String, InterviewInfo>,
    problems: Vec<ProblemInfo>,
    assignments: HashMap<String, String>,
    messages: HashMap<String, Vec<ConversationTurn>>,
    whiteboards: HashMap<String, String>,
}

/// In-process store, used for tests and database-less deployments.
///
/// `random_problem` returns the first matching problem so results are
/// deterministic.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_interview(&self, info: InterviewInfo) {
        self.lock().interviews.insert(info.id.clone(), info);
    }

    pub fn insert_problem(&self, problem: ProblemInfo) {
        self.lock().problems.push(problem);
    }

    /// Makes every write fail, to exercise persistence-failure handling.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn messages(&self, interview_id: &str) -> Vec<ConversationTurn> {
        self.lock()
            .messages
            .get(interview_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn whiteboard(&self, interview_id: &str) -> Option<String> {
        self.lock().whiteboards.get(interview_id).cloned()
    }

    pub fn assigned_problem(&self, interview_id: &str) -> Option<String> {
        self.lock().assignments.get(interview_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_writable(&self) -> Result<(), PipelineError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PipelineError::Store("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_interview(&self, interview_id: &str) -> Result<InterviewInfo, PipelineError> {
        self.lock()
            .interviews
            .get(interview_id)
            .cloned()
            .ok_or_else(|| PipelineError::InterviewNotFound(interview_id.to_string()))
    }

    async fn random_problem(
        &self,
        kind: ProblemKind,
        difficulty: Difficulty,
    ) -> Result<Option<ProblemInfo>, PipelineError> {
        Ok(self
            .lock()
            .problems
            .iter()
            .find(|p| p.kind == kind && p.difficulty == difficulty)
            .cloned())
    }

    async fn assign_problem(
        &self,
        interview_id: &str,
        problem_id: &str,
    ) -> Result<(), PipelineError> {
        self.check_writable()?;
        self.lock()
            .assignments
            .insert(interview_id.to_string(), problem_id.to_string());
        Ok(())
    }

    async fn recent_messages(
        &self,
        interview_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, PipelineError> {
        let data = self.lock();
        let all = data.messages.get(interview_id).map(Vec::as_slice).unwrap_or_default();
        let skip = all.len().saturating_sub(limit as usize);
        Ok(all[skip..].to_vec())
    }

    async fn append_message(
        &self,
        interview_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), PipelineError> {
        self.check_writable()?;
        self.lock()
            .messages
            .entry(interview_id.to_string())
            .or_default()
            .push(ConversationTurn::new(role, content));
        Ok(())
    }

    async fn save_whiteboard(
        &self,
        interview_id: &str,
        state_json: &str,
    ) -> Result<(), PipelineError> {
        self.check_writable()?;
        self.lock()
            .whiteboards
            .insert(interview_id.to_string(), state_json.to_string());
        Ok(())
    }
}
