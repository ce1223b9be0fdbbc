use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ChatTurn, QuizAttempt, QuizQuestion};
use crate::services::datastore::{DataStore, StoreError, QUIZ_ATTEMPTS};

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("generation endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("generation refused: {0}")]
    Refused(String),
    #[error("model returned malformed quiz JSON: {0}")]
    MalformedQuiz(#[from] serde_json::Error),
}

/// Text-generation collaborator: one prompt in, plain text out. Used for both
/// structured quiz generation and free-form practice chat.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AssistantError>;

    /// Free-form chat over role-tagged history. The default folds the history
    /// into a single prompt; providers with a native chat endpoint override.
    async fn chat(&self, history: &[ChatTurn]) -> Result<String, AssistantError> {
        let mut prompt = String::new();
        for turn in history {
            prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
        prompt.push_str("assistant:");
        self.generate(&prompt).await
    }
}

/// Prompt instructing strict JSON-array output for a lesson quiz.
pub fn quiz_prompt(lesson_title: &str, count: usize) -> String {
    format!(
        "Generate {count} multiple-choice questions for the lesson \"{lesson_title}\". \
         Respond with ONLY a JSON array, no prose, where each element is \
         {{\"question\": string, \"options\": [string, string, string, string], \
         \"correct_index\": number}}."
    )
}

/// Generate and parse a quiz for a lesson.
pub async fn generate_quiz(
    generator: &dyn TextGenerator,
    lesson_title: &str,
    count: usize,
) -> Result<Vec<QuizQuestion>, AssistantError> {
    let raw = generator.generate(&quiz_prompt(lesson_title, count)).await?;
    parse_quiz_response(&raw)
}

/// Models routinely wrap "JSON only" answers in markdown fences anyway;
/// strip them before parsing.
pub fn parse_quiz_response(raw: &str) -> Result<Vec<QuizQuestion>, AssistantError> {
    let trimmed = strip_markdown_fences(raw);
    Ok(serde_json::from_str(trimmed)?)
}

/// Persist a finished quiz run for the student's progress view.
pub async fn record_quiz_attempt(
    store: &dyn DataStore,
    student_id: &str,
    lesson_id: &str,
    score: i32,
    total: i32,
) -> Result<QuizAttempt, StoreError> {
    let attempt = QuizAttempt {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        lesson_id: lesson_id.to_string(),
        score,
        total,
        attempted_at: Utc::now().to_rfc3339(),
    };
    store
        .insert(QUIZ_ATTEMPTS, serde_json::to_value(&attempt)?)
        .await?;
    Ok(attempt)
}

fn strip_markdown_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
