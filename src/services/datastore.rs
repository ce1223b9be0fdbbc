use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

// Table names the client reads and writes. The store itself is a remote
// collaborator; nothing here owns the schema.
pub const STUDENTS: &str = "students";
pub const TEACHERS: &str = "teachers";
pub const SCHEDULED_CLASSES: &str = "scheduled_classes";
pub const LESSONS: &str = "lessons";
pub const UNITS: &str = "units";
pub const STUDENT_PROGRESS: &str = "student_progress";
pub const QUIZZES: &str = "quizzes";
pub const QUIZ_ATTEMPTS: &str = "quiz_attempts";
pub const CHAT_CONVERSATIONS: &str = "chat_conversations";
pub const CHAT_MESSAGES: &str = "chat_messages";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),
    #[error("row not found in {0}")]
    NotFound(&'static str),
    #[error("malformed row: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("store rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub enum Filter {
    Eq(&'static str, Value),
    Gte(&'static str, Value),
    Lte(&'static str, Value),
}

/// A row query against one named table. Built with the struct-literal style
/// rather than a builder; the surface is small enough.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    /// Column plus ascending flag.
    pub order: Option<(&'static str, bool)>,
    pub limit: Option<usize>,
    /// Related tables to expand inline on each row.
    pub relations: Vec<&'static str>,
}

/// One realtime change delivered by a table subscription.
#[derive(Debug, Clone)]
pub enum RowChange {
    Inserted(Value),
    Updated(Value),
    Deleted(Value),
}

/// Live subscription handle. Dropping it (or calling `unsubscribe`)
/// releases the server-side channel.
pub struct Subscription {
    pub changes: mpsc::Receiver<RowChange>,
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(changes: mpsc::Receiver<RowChange>, unsubscribe: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            changes,
            unsubscribe: Some(unsubscribe),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

/// Generic queryable data store with row-level relations and realtime change
/// subscriptions — the shape the managed backend exposes. Rows travel as
/// `serde_json::Value` and are deserialized into `models` types by callers.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: &'static str, query: Query) -> Result<Vec<Value>, StoreError>;

    async fn insert(&self, table: &'static str, row: Value) -> Result<Value, StoreError>;

    async fn update(
        &self,
        table: &'static str,
        filters: Vec<Filter>,
        patch: Value,
    ) -> Result<Vec<Value>, StoreError>;

    /// Realtime change feed for a table, optionally narrowed by one filter.
    async fn subscribe(
        &self,
        table: &'static str,
        filter: Option<Filter>,
    ) -> Result<Subscription, StoreError>;
}

/// Deserialize a selected row into a model type.
pub fn row<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(value)?)
}
