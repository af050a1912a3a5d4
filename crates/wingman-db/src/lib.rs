//! Database layer for the Wingman interview server.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the handful of queries the voice pipeline
//! needs: interview lookup, problem assignment, message history, and
//! whiteboard snapshots.
//!
//! Everything here is synchronous. Async callers are expected to wrap these
//! calls in `tokio::task::spawn_blocking`.

mod interviews;
mod messages;
mod migrations;
mod pool;

use thiserror::Error;

pub use interviews::{
    assign_problem, create_interview, get_interview, insert_problem, random_problem,
    save_whiteboard, CreateInterviewParams, NewProblem,
};
pub use messages::{add_message, recent_messages, StoredMessage};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};

/// Errors returned by the query helpers.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("interview not found: {0}")]
    InterviewNotFound(String),
    #[error("invalid stored value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: String },
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
