//! SQLite-backed [`SessionStore`].

use async_trait::async_trait;
use rusqlite::Connection;
use wingman_db::{DbError, DbPool};
use wingman_pipeline::{PipelineError, SessionStore};
use wingman_types::{ConversationTurn, Difficulty, InterviewInfo, ProblemInfo, ProblemKind, Role};

/// Runs each query on the blocking pool against a pooled connection.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: DbPool,
}

impl SqliteSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn blocking<T, F>(&self, query: F) -> Result<T, PipelineError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| PipelineError::Store(format!("pool error: {e}")))?;
            query(&conn).map_err(map_db_error)
        })
        .await
        .map_err(|e| PipelineError::Store(format!("task join error: {e}")))?
    }
}

fn map_db_error(e: DbError) -> PipelineError {
    match e {
        DbError::InterviewNotFound(id) => PipelineError::InterviewNotFound(id),
        other => PipelineError::Store(other.to_string()),
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load_interview(&self, interview_id: &str) -> Result<InterviewInfo, PipelineError> {
        let id = interview_id.to_string();
        self.blocking(move |conn| wingman_db::get_interview(conn, &id))
            .await
    }

    async fn random_problem(
        &self,
        kind: ProblemKind,
        difficulty: Difficulty,
    ) -> Result<Option<ProblemInfo>, PipelineError> {
        self.blocking(move |conn| wingman_db::random_problem(conn, kind, difficulty))
            .await
    }

    async fn assign_problem(
        &self,
        interview_id: &str,
        problem_id: &str,
    ) -> Result<(), PipelineError> {
        let (iid, pid) = (interview_id.to_string(), problem_id.to_string());
        self.blocking(move |conn| wingman_db::assign_problem(conn, &iid, &pid))
            .await
    }

    async fn recent_messages(
        &self,
        interview_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, PipelineError> {
        let id = interview_id.to_string();
        let stored = self
            .blocking(move |conn| wingman_db::recent_messages(conn, &id, limit))
            .await?;
        Ok(stored.into_iter().map(ConversationTurn::from).collect())
    }

    async fn append_message(
        &self,
        interview_id: &str,
        role: Role,
        content: &str,
    ) -> Result<(), PipelineError> {
        let (id, content) = (interview_id.to_string(), content.to_string());
        self.blocking(move |conn| wingman_db::add_message(conn, &id, role, &content))
            .await
            .map(|_| ())
    }

    async fn save_whiteboard(
        &self,
        interview_id: &str,
        state_json: &str,
    ) -> Result<(), PipelineError> {
        let (id, json) = (interview_id.to_string(), state_json.to_string());
        self.blocking(move |conn| wingman_db::save_whiteboard(conn, &id, &json))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wingman_db::{create_pool, run_migrations, CreateInterviewParams, DbRuntimeSettings};
    use wingman_types::InterviewType;

    fn store() -> SqliteSessionStore {
        let pool = create_pool(
            ":memory:",
            DbRuntimeSettings {
                pool_max_size: 1,
                ..DbRuntimeSettings::default()
            },
        )
        .unwrap();
        {
            let conn = pool.get().unwrap();
            run_migrations(&conn).unwrap();
            wingman_db::create_interview(
                &conn,
                &CreateInterviewParams {
                    interview_id: "iv-1".to_string(),
                    kind: InterviewType::PhoneScreen,
                    difficulty: Difficulty::Hard,
                    language: "en".to_string(),
                    question_count: Some(4),
                },
            )
            .unwrap();
        }
        SqliteSessionStore::new(pool)
    }

    #[tokio::test]
    async fn missing_interview_maps_to_not_found() {
        let store = store();
        assert!(matches!(
            store.load_interview("nope").await,
            Err(PipelineError::InterviewNotFound(_))
        ));
        let info = store.load_interview("iv-1").await.unwrap();
        assert_eq!(info.question_count, Some(4));
    }

    #[tokio::test]
    async fn messages_round_trip_through_the_blocking_pool() {
        let store = store();
        store
            .append_message("iv-1", Role::User, "hello")
            .await
            .unwrap();
        store
            .append_message("iv-1", Role::Assistant, "hi there?")
            .await
            .unwrap();
        let recent = store.recent_messages("iv-1", 50).await.unwrap();
        assert_eq!(
            recent,
            vec![
                ConversationTurn::user("hello"),
                ConversationTurn::assistant("hi there?")
            ]
        );
    }

    #[tokio::test]
    async fn assigning_to_unknown_interview_fails() {
        let store = store();
        assert!(store.assign_problem("nope", "p-1").await.is_err());
        assert!(store
            .random_problem(ProblemKind::Coding, Difficulty::Easy)
            .await
            .unwrap()
            .is_none());
    }
}
