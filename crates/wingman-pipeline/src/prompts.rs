//! Interviewer instructions and the system turns injected during a session.

use std::fmt::Write as _;
use std::time::Duration;
use wingman_types::{Difficulty, InterviewType, ProblemInfo, ProblemKind, TestResult};

/// Question count for phone screens whose interview row has none.
pub const DEFAULT_QUESTION_COUNT: u32 = 5;

/// Suggested time per question when the interview has no time limit.
pub const DEFAULT_SECONDS_PER_QUESTION: u64 = 180;

/// Fraction of the time limit after which the candidate is warned.
pub const TIME_WARNING_FRACTION: f64 = 0.8;

pub const TIME_UP_NOTICE: &str = "[SYSTEM: The interview time is over. Thank the candidate \
     and close the interview. Be brief and kind.]";

const ALL_QUESTIONS_MARKER: &str = "[SYSTEM: All questions have been asked";

/// Interview duration for timed formats.
pub fn time_limit(kind: InterviewType, difficulty: Difficulty) -> Option<Duration> {
    let minutes = match (kind, difficulty) {
        (InterviewType::PhoneScreen, Difficulty::Easy) => 15,
        (InterviewType::PhoneScreen, Difficulty::Medium) => 25,
        (InterviewType::PhoneScreen, Difficulty::Hard) => 35,
        (InterviewType::LiveCoding, Difficulty::Easy) => 20,
        (InterviewType::LiveCoding, Difficulty::Medium) => 30,
        (InterviewType::LiveCoding, Difficulty::Hard) => 45,
        (InterviewType::SystemDesign | InterviewType::Practice, _) => return None,
    };
    Some(Duration::from_secs(minutes * 60))
}

pub fn recommended_seconds(limit: Option<Duration>, questions: u32) -> u64 {
    match limit {
        Some(limit) if questions > 0 => limit.as_secs() / u64::from(questions),
        _ => DEFAULT_SECONDS_PER_QUESTION,
    }
}

fn language_instruction(language: &str) -> String {
    match language {
        "tr" => "Conduct the entire conversation in Turkish.".to_string(),
        "en" => "Conduct the entire conversation in English.".to_string(),
        other => format!("Conduct the entire conversation in the language with code '{other}'."),
    }
}

fn difficulty_guide(kind: InterviewType, difficulty: Difficulty) -> &'static str {
    match (kind, difficulty) {
        (InterviewType::PhoneScreen, Difficulty::Easy) => {
            "Ask simple behavioral and technical questions. Start with an introduction. Be supportive."
        }
        (InterviewType::PhoneScreen, Difficulty::Medium) => {
            "Mix behavioral and technical questions. Expect STAR-style answers and ask follow-ups."
        }
        (InterviewType::PhoneScreen, Difficulty::Hard) => {
            "Ask demanding behavioral questions (conflict, failure) and go deep on technical topics."
        }
        (InterviewType::LiveCoding, Difficulty::Easy) => {
            "Guide the candidate gently and offer small nudges when they are stuck."
        }
        (InterviewType::LiveCoding, Difficulty::Medium) => {
            "Let the candidate drive. Ask about complexity and edge cases once they have a solution."
        }
        (InterviewType::LiveCoding, Difficulty::Hard) => {
            "Expect an optimal solution. Push on trade-offs, complexity and edge cases."
        }
        (InterviewType::SystemDesign, Difficulty::Easy) => {
            "Focus on the main components and the data flow between them."
        }
        (InterviewType::SystemDesign, Difficulty::Medium) => {
            "Probe scaling, storage choices and failure handling."
        }
        (InterviewType::SystemDesign, Difficulty::Hard) => {
            "Challenge every decision: consistency, partitioning, capacity estimates and bottlenecks."
        }
        (InterviewType::Practice, Difficulty::Easy) => {
            "Start with fundamentals, explain each step and give plenty of hints."
        }
        (InterviewType::Practice, Difficulty::Medium) => {
            "Let the candidate think first, then hint. Discuss alternative solutions."
        }
        (InterviewType::Practice, Difficulty::Hard) => {
            "Wait for real attempts before hinting and steer towards the optimal solution."
        }
    }
}

/// The interviewer persona for an interview.
pub fn system_prompt(kind: InterviewType, difficulty: Difficulty, language: &str) -> String {
    let role = match kind {
        InterviewType::PhoneScreen => {
            "You are a technical recruiter running a first-round phone screen. Ask one question \
             at a time, mixing behavioral and technical topics, and move between them naturally."
        }
        InterviewType::LiveCoding => {
            "You are a senior engineer running a live coding interview. Present the assigned \
             problem, let the candidate code, and discuss their approach as they go. Never write \
             the solution for them."
        }
        InterviewType::SystemDesign => {
            "You are a staff engineer running a system design interview. Present the assigned \
             problem, let the candidate design on the whiteboard, and react to their changes."
        }
        InterviewType::Practice => {
            "You are a patient mentor practicing interview problems with the candidate. Mistakes \
             are fine; correct them together and summarize what was learned."
        }
    };
    format!(
        "{role}\n\n{}\n\nKeep every reply to 2-4 spoken sentences. {}",
        difficulty_guide(kind, difficulty),
        language_instruction(language)
    )
}

/// The default persona for sessions without an interview.
pub fn free_mode_prompt(language: &str) -> String {
    format!(
        "You are Wingman, an experienced technical interviewer. Greet the candidate warmly but \
         professionally, ask clear questions and give constructive feedback. Keep every reply to \
         2-3 sentences. {}",
        language_instruction(language)
    )
}

/// System turn describing the problem assigned to the interview.
pub fn problem_context(problem: &ProblemInfo) -> String {
    let mut out = String::new();
    match problem.kind {
        ProblemKind::Coding => {
            let _ = writeln!(out, "[Assigned problem]");
            let _ = writeln!(out, "Title: {}", problem.title);
            let _ = writeln!(out, "Difficulty: {}", problem.difficulty.as_str());
            if let Some(category) = &problem.category {
                let _ = writeln!(out, "Category: {category}");
            }
            let _ = writeln!(out, "Description: {}", problem.description);
            out.push_str(
                "\nAsk the candidate this problem. Explain it briefly out loud and wait for them \
                 to solve it.",
            );
        }
        ProblemKind::Design => {
            let _ = writeln!(out, "[Assigned system design problem]");
            let _ = writeln!(out, "Title: {}", problem.title);
            let _ = writeln!(out, "Difficulty: {}", problem.difficulty.as_str());
            let _ = writeln!(out, "Description: {}", problem.description);
            if !problem.requirements.is_empty() {
                let _ = writeln!(out, "Requirements:");
                for requirement in &problem.requirements {
                    let _ = writeln!(out, "  - {requirement}");
                }
            }
            out.push_str(
                "\nAsk the candidate this problem. Explain it briefly, share the requirements and \
                 let them design on the whiteboard. Follow and comment on whiteboard changes.",
            );
        }
    }
    out
}

/// Hint level for the `count`th hint request.
pub fn hint_level(count: u32) -> u32 {
    count.clamp(1, 3)
}

/// User turn asking the model for a hint at `level`.
pub fn hint_instruction(level: u32, total: u32) -> String {
    let detail = match level {
        1 => "Give a general direction only: which data structure or algorithm could help. No details.",
        2 => "Give more detailed guidance. Outline the steps roughly but do not write code.",
        _ => "Give a pseudo-code level hint. Show the skeleton of the solution but not the full code.",
    };
    format!(
        "[SYSTEM: The candidate asked for a hint (hint level {level}, requested {total} times in \
         total). {detail} Keep it to 2-3 sentences.]"
    )
}

/// Persisted in place of the hint instruction.
pub fn hint_marker(level: u32) -> String {
    format!("[Hint requested, level {level}]")
}

pub fn time_warning_notice(minutes_left: u64) -> String {
    format!(
        "[SYSTEM: About {minutes_left} minutes remain in the interview. If you have not yet, ask \
         one final question and start wrapping up politely.]"
    )
}

pub fn all_questions_asked(total: u32) -> String {
    format!(
        "{ALL_QUESTIONS_MARKER} ({total}/{total}). Thank the candidate and close the interview.]"
    )
}

/// Textual report of a sandbox run, appended as a user turn.
pub fn code_result_summary(results: &[TestResult], stderr: &str, error: Option<&str>) -> String {
    let passed = results.iter().filter(|r| r.passed).count();
    let mut out = String::from("[Code run result]\n");
    let _ = writeln!(out, "{passed}/{} tests passed.", results.len());
    for (i, result) in results.iter().enumerate() {
        if result.passed {
            let _ = writeln!(out, "Test {}: passed", i + 1);
        } else {
            let _ = writeln!(
                out,
                "Test {}: failed (expected: {}, actual: {})",
                i + 1,
                display_value(result.expected.as_ref()),
                display_value(result.actual.as_ref())
            );
        }
    }
    if let Some(error) = error.filter(|e| !e.is_empty()) {
        let _ = writeln!(out, "Error: {error}");
    }
    if !stderr.is_empty() {
        let _ = writeln!(out, "Stderr: {stderr}");
    }
    out
}

fn display_value(value: Option<&serde_json::Value>) -> String {
    match value {
        None => "-".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn time_limits_follow_format_and_difficulty() {
        assert_eq!(
            time_limit(InterviewType::PhoneScreen, Difficulty::Medium),
            Some(Duration::from_secs(25 * 60))
        );
        assert_eq!(
            time_limit(InterviewType::LiveCoding, Difficulty::Hard),
            Some(Duration::from_secs(45 * 60))
        );
        assert_eq!(time_limit(InterviewType::Practice, Difficulty::Hard), None);
        assert_eq!(time_limit(InterviewType::SystemDesign, Difficulty::Easy), None);
    }

    #[test]
    fn recommended_seconds_splits_limit() {
        assert_eq!(
            recommended_seconds(Some(Duration::from_secs(25 * 60)), 5),
            300
        );
        assert_eq!(recommended_seconds(None, 5), DEFAULT_SECONDS_PER_QUESTION);
        assert_eq!(
            recommended_seconds(Some(Duration::from_secs(60)), 0),
            DEFAULT_SECONDS_PER_QUESTION
        );
    }

    #[test]
    fn hint_level_caps_at_three() {
        assert_eq!(
            (1..=5).map(hint_level).collect::<Vec<_>>(),
            vec![1, 2, 3, 3, 3]
        );
        assert!(hint_instruction(3, 5).contains("pseudo-code"));
        assert_eq!(hint_marker(2), "[Hint requested, level 2]");
    }

    #[test]
    fn code_summary_lists_each_test() {
        let results = vec![
            TestResult {
                passed: true,
                expected: Some(json!([0, 1])),
                actual: Some(json!([0, 1])),
            },
            TestResult {
                passed: false,
                expected: Some(json!("abc")),
                actual: None,
            },
        ];
        let summary = code_result_summary(&results, "warning: unused", Some("panicked"));
        assert!(summary.contains("1/2 tests passed."));
        assert!(summary.contains("Test 1: passed"));
        assert!(summary.contains("Test 2: failed (expected: abc, actual: -)"));
        assert!(summary.contains("Error: panicked"));
        assert!(summary.contains("Stderr: warning: unused"));
    }

    #[test]
    fn design_context_lists_requirements() {
        let problem = ProblemInfo {
            id: "d-1".to_string(),
            kind: ProblemKind::Design,
            title: "URL Shortener".to_string(),
            description: "Shorten links".to_string(),
            difficulty: Difficulty::Medium,
            category: None,
            requirements: vec!["Custom aliases".to_string()],
            optimal_solution: None,
            time_complexity: None,
            space_complexity: None,
        };
        let context = problem_context(&problem);
        assert!(context.starts_with("[Assigned system design problem]"));
        assert!(context.contains("  - Custom aliases"));
    }

    #[test]
    fn prompts_carry_language_instruction() {
        assert!(system_prompt(InterviewType::LiveCoding, Difficulty::Easy, "tr").contains("Turkish"));
        assert!(free_mode_prompt("en").contains("English"));
    }
}
