//! Interview and problem lookups used when a voice session starts.

use crate::DbError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use wingman_types::{Difficulty, InterviewInfo, InterviewType, ProblemInfo, ProblemKind};

/// Parameters for creating an interview record.
#[derive(Debug, Clone)]
pub struct CreateInterviewParams {
    pub interview_id: String,
    pub kind: InterviewType,
    pub difficulty: Difficulty,
    pub language: String,
    pub question_count: Option<u32>,
}

/// Parameters for inserting a problem into the bank.
#[derive(Debug, Clone)]
pub struct NewProblem {
    pub problem_id: String,
    pub kind: ProblemKind,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub category: Option<String>,
    pub requirements: Vec<String>,
    pub optimal_solution: Option<String>,
    pub time_complexity: Option<String>,
    pub space_complexity: Option<String>,
}

/// Creates an interview record.
pub fn create_interview(conn: &Connection, p: &CreateInterviewParams) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO interviews (interview_id, interview_type, difficulty, language, question_count)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            p.interview_id,
            p.kind.as_str(),
            p.difficulty.as_str(),
            p.language,
            p.question_count,
        ],
    )?;
    Ok(())
}

/// Loads an interview by its public id.
pub fn get_interview(conn: &Connection, interview_id: &str) -> Result<InterviewInfo, DbError> {
    let row = conn
        .query_row(
            "SELECT interview_id, interview_type, difficulty, language, question_count
             FROM interviews WHERE interview_id = ?1",
            [interview_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<u32>>(4)?,
                ))
            },
        )
        .optional()?;

    let (id, kind, difficulty, language, question_count) =
        row.ok_or_else(|| DbError::InterviewNotFound(interview_id.to_string()))?;

    Ok(InterviewInfo {
        id,
        kind: parse_column("interviews.interview_type", kind)?,
        difficulty: parse_column("interviews.difficulty", difficulty)?,
        language,
        question_count,
    })
}

/// Inserts a problem into the bank.
pub fn insert_problem(conn: &Connection, p: &NewProblem) -> Result<(), DbError> {
    let requirements_json = if p.requirements.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&p.requirements)?)
    };
    conn.execute(
        "INSERT INTO problems (
            problem_id, kind, title, description, difficulty, category,
            requirements_json, optimal_solution, time_complexity, space_complexity
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            p.problem_id,
            p.kind.as_str(),
            p.title,
            p.description,
            p.difficulty.as_str(),
            p.category,
            requirements_json,
            p.optimal_solution,
            p.time_complexity,
            p.space_complexity,
        ],
    )?;
    Ok(())
}

type RawProblem = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn read_problem_row(row: &Row<'_>) -> rusqlite::Result<RawProblem> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

/// Picks a random problem of the given kind and difficulty, if any exist.
pub fn random_problem(
    conn: &Connection,
    kind: ProblemKind,
    difficulty: Difficulty,
) -> Result<Option<ProblemInfo>, DbError> {
    let raw = conn
        .query_row(
            "SELECT problem_id, kind, title, description, difficulty, category,
                    requirements_json, optimal_solution, time_complexity, space_complexity
             FROM problems WHERE kind = ?1 AND difficulty = ?2
             ORDER BY RANDOM() LIMIT 1",
            params![kind.as_str(), difficulty.as_str()],
            read_problem_row,
        )
        .optional()?;

    let Some((
        id,
        kind,
        title,
        description,
        difficulty,
        category,
        requirements_json,
        optimal_solution,
        time_complexity,
        space_complexity,
    )) = raw
    else {
        return Ok(None);
    };

    let kind = match kind.as_str() {
        "coding" => ProblemKind::Coding,
        "design" => ProblemKind::Design,
        _ => {
            return Err(DbError::InvalidValue {
                column: "problems.kind",
                value: kind,
            })
        }
    };
    let requirements = match requirements_json {
        Some(json) => serde_json::from_str(&json)?,
        None => Vec::new(),
    };

    Ok(Some(ProblemInfo {
        id,
        kind,
        title,
        description,
        difficulty: parse_column("problems.difficulty", difficulty)?,
        category,
        requirements,
        optimal_solution,
        time_complexity,
        space_complexity,
    }))
}

/// Links a problem to an interview.
pub fn assign_problem(
    conn: &Connection,
    interview_id: &str,
    problem_id: &str,
) -> Result<(), DbError> {
    let updated = conn.execute(
        "UPDATE interviews SET problem_id = ?1 WHERE interview_id = ?2",
        params![problem_id, interview_id],
    )?;
    if updated == 0 {
        return Err(DbError::InterviewNotFound(interview_id.to_string()));
    }
    Ok(())
}

/// Stores the latest whiteboard state for an interview, replacing any previous one.
pub fn save_whiteboard(
    conn: &Connection,
    interview_id: &str,
    state_json: &str,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO interview_whiteboards (interview_id, state_json) VALUES (?1, ?2)
         ON CONFLICT(interview_id) DO UPDATE SET
            state_json = excluded.state_json,
            updated_at = datetime('now')",
        params![interview_id, state_json],
    )?;
    Ok(())
}

fn parse_column<T: std::str::FromStr>(column: &'static str, value: String) -> Result<T, DbError> {
    value
        .parse()
        .map_err(|_| DbError::InvalidValue { column, value })
}
