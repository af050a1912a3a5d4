//! Conversation message persistence.

use crate::DbError;
use rusqlite::{params, Connection};
use wingman_types::{ConversationTurn, Role};

/// A persisted conversation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: i64,
    pub interview_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: String,
}

impl From<StoredMessage> for ConversationTurn {
    fn from(m: StoredMessage) -> Self {
        ConversationTurn::new(m.role, m.content)
    }
}

/// Appends a message to an interview's history and returns its row id.
pub fn add_message(
    conn: &Connection,
    interview_id: &str,
    role: Role,
    content: &str,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO messages (interview_id, role, content) VALUES (?1, ?2, ?3)",
        params![interview_id, role.as_str(), content],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns the most recent `limit` messages for an interview, oldest first.
pub fn recent_messages(
    conn: &Connection,
    interview_id: &str,
    limit: u32,
) -> Result<Vec<StoredMessage>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, interview_id, role, content, created_at
         FROM messages WHERE interview_id = ?1
         ORDER BY id DESC LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![interview_id, limit], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut messages = Vec::new();
    for row in rows {
        let (id, interview_id, role, content, created_at) = row?;
        let role = role.parse::<Role>().map_err(|_| DbError::InvalidValue {
            column: "messages.role",
            value: role.clone(),
        })?;
        messages.push(StoredMessage {
            id,
            interview_id,
            role,
            content,
            created_at,
        });
    }
    messages.reverse();
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_migrations;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn recent_messages_are_oldest_first_and_limited() {
        let conn = conn();
        for i in 0..5 {
            add_message(&conn, "iv-1", Role::User, &format!("q{i}")).unwrap();
        }
        add_message(&conn, "iv-2", Role::User, "other").unwrap();

        let recent = recent_messages(&conn, "iv-1", 3).unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q2", "q3", "q4"]);
        assert!(recent.iter().all(|m| m.interview_id == "iv-1"));
    }

    #[test]
    fn stored_message_converts_to_turn() {
        let conn = conn();
        add_message(&conn, "iv-1", Role::Assistant, "Merhaba").unwrap();
        let turn: ConversationTurn = recent_messages(&conn, "iv-1", 10)
            .unwrap()
            .remove(0)
            .into();
        assert_eq!(turn, ConversationTurn::assistant("Merhaba"));
    }
}
