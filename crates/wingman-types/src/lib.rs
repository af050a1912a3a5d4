//! Shared types for the Wingman voice interview platform.
//!
//! This crate holds the vocabulary every other Wingman crate speaks:
//! conversation turns, pipeline modes, interview descriptors, and the
//! duplex session event contract (see [`events`]).
//!
//! Nothing in here performs I/O. Keeping the types dependency-free lets the
//! voice clients, the pipeline, and the server agree on one definition
//! without circular crate dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod events;

pub use events::{ClientEvent, ErrorKind, ServerEvent};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and injected context.
    System,
    /// The candidate (or a system-generated stand-in such as a hint prompt).
    User,
    /// The AI interviewer.
    Assistant,
}

impl Role {
    /// Returns the wire label for this role.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// One entry in a session's conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The pipeline mode of a voice session.
///
/// A session is in exactly one mode at any instant. Every change is mirrored
/// to the client as a `state_change` event so it can render mic/AI affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    #[default]
    Idle,
    Listening,
    Processing,
    Speaking,
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
        };
        f.write_str(label)
    }
}

/// Interview formats offered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterviewType {
    LiveCoding,
    SystemDesign,
    PhoneScreen,
    Practice,
}

impl InterviewType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LiveCoding => "live-coding",
            Self::SystemDesign => "system-design",
            Self::PhoneScreen => "phone-screen",
            Self::Practice => "practice",
        }
    }
}

impl FromStr for InterviewType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live-coding" => Ok(Self::LiveCoding),
            "system-design" => Ok(Self::SystemDesign),
            "phone-screen" => Ok(Self::PhoneScreen),
            "practice" => Ok(Self::Practice),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Interview difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Returned when a stored label does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant: {}", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

/// The interview a voice session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewInfo {
    pub id: String,
    pub kind: InterviewType,
    pub difficulty: Difficulty,
    /// BCP-47-ish language code used for STT hints and TTS normalization.
    pub language: String,
    /// Planned number of questions (phone screens only).
    pub question_count: Option<u32>,
}

/// Whether a problem is a coding exercise or a system-design prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemKind {
    #[default]
    Coding,
    Design,
}

impl ProblemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coding => "coding",
            Self::Design => "design",
        }
    }
}

/// A problem assigned to an interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemInfo {
    pub id: String,
    pub kind: ProblemKind,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Requirement bullet points (design problems).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimal_solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_complexity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space_complexity: Option<String>,
}

/// Outcome of one test case run in the candidate's sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub passed: bool,
    #[serde(default)]
    pub expected: Option<serde_json::Value>,
    #[serde(default)]
    pub actual: Option<serde_json::Value>,
}

/// Snapshot of the system-design whiteboard.
///
/// Only `textRepresentation` is interpreted by the server; everything else the
/// client sends is kept verbatim so the raw state can be persisted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WhiteboardState {
    #[serde(rename = "textRepresentation", default)]
    pub text_representation: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_labels_round_trip() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn interview_type_uses_kebab_case() {
        let json = serde_json::to_string(&InterviewType::PhoneScreen).unwrap();
        assert_eq!(json, "\"phone-screen\"");
        assert_eq!(
            "live-coding".parse::<InterviewType>(),
            Ok(InterviewType::LiveCoding)
        );
    }

    #[test]
    fn pipeline_mode_serializes_lowercase() {
        let json = serde_json::to_string(&PipelineMode::Speaking).unwrap();
        assert_eq!(json, "\"speaking\"");
        assert_eq!(PipelineMode::default(), PipelineMode::Idle);
    }

    #[test]
    fn whiteboard_state_keeps_unknown_fields() {
        let raw = r#"{"textRepresentation":"LB -> API","components":[{"id":"a"}]}"#;
        let state: WhiteboardState = serde_json::from_str(raw).unwrap();
        assert_eq!(state.text_representation, "LB -> API");
        assert!(state.extra.contains_key("components"));

        let back = serde_json::to_value(&state).unwrap();
        assert_eq!(back["components"][0]["id"], "a");
    }

    #[test]
    fn problem_info_omits_empty_optionals() {
        let problem = ProblemInfo {
            id: "p-1".to_string(),
            kind: ProblemKind::Coding,
            title: "Two Sum".to_string(),
            description: "Find two numbers".to_string(),
            difficulty: Difficulty::Easy,
            category: None,
            requirements: Vec::new(),
            optimal_solution: None,
            time_complexity: None,
            space_complexity: None,
        };
        let json = serde_json::to_value(&problem).unwrap();
        assert!(json.get("optimalSolution").is_none());
        assert!(json.get("requirements").is_none());
        assert_eq!(json["difficulty"], "easy");
    }
}
