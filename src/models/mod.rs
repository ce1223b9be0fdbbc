use serde::{Deserialize, Serialize};

// ============================================================
// Accounts & profiles
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub full_name: String,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: String,
}

// ============================================================
// Scheduling
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledClass {
    pub id: String,
    pub teacher_id: String,
    pub student_id: String,
    pub scheduled_at: String,
    pub duration_minutes: i32,
    /// "scheduled" | "in_progress" | "completed" | "cancelled"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_id: Option<String>,
}

// ============================================================
// Curriculum & progress
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    pub title: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub unit_id: String,
    pub title: String,
    pub position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProgress {
    pub student_id: String,
    pub lesson_id: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

// ============================================================
// Quizzes & AI practice chat
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: String,
    pub student_id: String,
    pub lesson_id: String,
    pub score: i32,
    pub total: i32,
    pub attempted_at: String,
}

/// One turn of role-tagged history sent to the text-generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// "user" | "assistant"
    pub role: String,
    pub content: String,
}
