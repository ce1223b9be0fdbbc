use chrono::Utc;
use serde_json::json;
use thiserror::Error;

use crate::call::{CallParams, CallRole, DEFAULT_JOIN_TIMEOUT};
use crate::credentials::{CredentialError, CredentialProvider};
use crate::models::{Profile, ScheduledClass};
use crate::services::datastore::{row, DataStore, Filter, Query, StoreError};
use crate::services::datastore::{SCHEDULED_CLASSES, STUDENTS, TEACHERS};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("user {0} is not a participant of class {1}")]
    NotParticipant(String, String),
}

/// Stable engine participant id for a platform user. Both clients derive ids
/// the same way, so the values never collide within a 1:1 class. Zero is
/// reserved for "not joined yet".
pub fn participant_id(user_id: &str) -> u32 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    (hasher.finish() as u32).max(1)
}

/// Classes scheduled for a user, soonest first.
pub async fn upcoming_classes(
    store: &dyn DataStore,
    user: &Profile,
) -> Result<Vec<ScheduledClass>, ScheduleError> {
    let column = match user.role {
        crate::models::UserRole::Teacher => "teacher_id",
        _ => "student_id",
    };
    let rows = store
        .select(
            SCHEDULED_CLASSES,
            Query {
                filters: vec![
                    Filter::Eq(column, json!(user.id)),
                    Filter::Eq("status", json!("scheduled")),
                    Filter::Gte("scheduled_at", json!(Utc::now().to_rfc3339())),
                ],
                order: Some(("scheduled_at", true)),
                ..Default::default()
            },
        )
        .await?;
    rows.into_iter()
        .map(|r| row::<ScheduledClass>(r).map_err(ScheduleError::from))
        .collect()
}

/// Resolve a scheduled class into everything the waiting room needs: the
/// caller's role, both display names, the deterministic channel name, and a
/// fresh join credential. Fails fast when the credential cannot be issued —
/// join must never proceed without one.
pub async fn call_params_for_class(
    store: &dyn DataStore,
    credentials: &dyn CredentialProvider,
    class_id: &str,
    user: &Profile,
) -> Result<CallParams, ScheduleError> {
    let rows = store
        .select(
            SCHEDULED_CLASSES,
            Query {
                filters: vec![Filter::Eq("id", json!(class_id))],
                limit: Some(1),
                ..Default::default()
            },
        )
        .await?;
    let class: ScheduledClass = row(
        rows.into_iter()
            .next()
            .ok_or(StoreError::NotFound(SCHEDULED_CLASSES))?,
    )?;

    let (role, counterpart_table, counterpart_id) = if user.id == class.teacher_id {
        (CallRole::Teacher, STUDENTS, class.student_id.clone())
    } else if user.id == class.student_id {
        (CallRole::Student, TEACHERS, class.teacher_id.clone())
    } else {
        return Err(ScheduleError::NotParticipant(
            user.id.clone(),
            class_id.to_string(),
        ));
    };

    let remote_display_name = display_name(store, counterpart_table, &counterpart_id).await?;

    let grant = credentials.issue(&class.id, participant_id(&user.id)).await?;
    Ok(CallParams {
        session_id: class.id,
        channel_name: grant.channel_name,
        credential: grant.credential,
        local_participant_id: grant.participant_id,
        role,
        local_display_name: user.full_name.clone(),
        remote_display_name,
        join_timeout: DEFAULT_JOIN_TIMEOUT,
    })
}

async fn display_name(
    store: &dyn DataStore,
    table: &'static str,
    user_id: &str,
) -> Result<String, ScheduleError> {
    let rows = store
        .select(
            table,
            Query {
                filters: vec![Filter::Eq("id", json!(user_id))],
                limit: Some(1),
                ..Default::default()
            },
        )
        .await?;
    let record = rows.into_iter().next().ok_or(StoreError::NotFound(table))?;
    Ok(record
        .get("full_name")
        .and_then(|v| v.as_str())
        .unwrap_or(user_id)
        .to_string())
}
