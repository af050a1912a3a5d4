//! Per-run message assembly.
//!
//! The stored history only ever holds real conversation. Editor and
//! whiteboard snapshots are session state, so they are injected fresh into
//! each run's message list and never written back.

use wingman_types::{ConversationTurn, Role};

/// Appended to every message list so replies stay short enough to speak.
pub const BREVITY_REMINDER: &str = "[Reminder: your reply is read aloud. Answer in 2-3 short \
     sentences, without markdown, lists or code blocks.]";

/// The candidate's current editor contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeSnapshot {
    pub code: String,
    pub language: String,
}

impl CodeSnapshot {
    fn to_turn(&self) -> ConversationTurn {
        ConversationTurn::system(format!(
            "[Candidate's current code ({lang})]:\n```{lang}\n{code}\n```",
            lang = self.language,
            code = self.code
        ))
    }
}

fn whiteboard_turn(text: &str) -> ConversationTurn {
    ConversationTurn::system(format!("[Candidate's current whiteboard design]\n{text}"))
}

/// Builds the message list for one run.
///
/// Snapshots go immediately before the most recent user turn (or at the end
/// when there is none), code first. The brevity reminder always comes last.
pub fn build_messages(
    history: &[ConversationTurn],
    code: Option<&CodeSnapshot>,
    whiteboard: Option<&str>,
) -> Vec<ConversationTurn> {
    let mut messages = history.to_vec();

    let injections: Vec<ConversationTurn> = code
        .filter(|c| !c.code.trim().is_empty())
        .map(CodeSnapshot::to_turn)
        .into_iter()
        .chain(
            whiteboard
                .filter(|w| !w.trim().is_empty())
                .map(whiteboard_turn),
        )
        .collect();

    let at = messages
        .iter()
        .rposition(|turn| turn.role == Role::User)
        .unwrap_or(messages.len());
    messages.splice(at..at, injections);

    messages.push(ConversationTurn::system(BREVITY_REMINDER));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> CodeSnapshot {
        CodeSnapshot {
            code: "fn main() {}".to_string(),
            language: "rust".to_string(),
        }
    }

    #[test]
    fn injections_precede_last_user_turn() {
        let history = vec![
            ConversationTurn::system("prompt"),
            ConversationTurn::user("first"),
            ConversationTurn::assistant("reply"),
            ConversationTurn::user("second"),
        ];
        let messages = build_messages(&history, Some(&snapshot()), Some("LB -> API -> DB"));

        assert_eq!(messages.len(), 7);
        assert!(messages[3].content.contains("```rust\nfn main() {}\n```"));
        assert!(messages[4].content.contains("LB -> API -> DB"));
        assert_eq!(messages[5], ConversationTurn::user("second"));
        assert_eq!(messages[6].content, BREVITY_REMINDER);
    }

    #[test]
    fn injections_append_when_no_user_turn() {
        let history = vec![ConversationTurn::system("prompt")];
        let messages = build_messages(&history, None, Some("cache"));
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::System);
        assert!(messages[1].content.ends_with("cache"));
    }

    #[test]
    fn empty_snapshots_are_skipped() {
        let history = vec![ConversationTurn::user("hi")];
        let empty = CodeSnapshot {
            code: "  \n".to_string(),
            language: "python".to_string(),
        };
        let messages = build_messages(&history, Some(&empty), Some(""));
        assert_eq!(
            messages,
            vec![
                ConversationTurn::user("hi"),
                ConversationTurn::system(BREVITY_REMINDER)
            ]
        );
    }

    #[test]
    fn history_is_not_modified() {
        let history = vec![ConversationTurn::user("hi")];
        let _ = build_messages(&history, Some(&snapshot()), None);
        assert_eq!(history, vec![ConversationTurn::user("hi")]);
    }
}
