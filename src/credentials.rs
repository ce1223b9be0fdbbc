use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Validity window the issuing service stamps on a grant.
pub const CREDENTIAL_TTL_SECS: i64 = 3600;

/// Derive the media channel name from a scheduled-class id.
/// Deterministic so both parties compute the same value without coordinating.
pub fn channel_name(session_id: &str) -> String {
    format!("class_{}", session_id)
}

/// Everything needed to join a channel, issued per participant.
#[derive(Debug, Clone)]
pub struct JoinGrant {
    /// Opaque, time-bounded authorization artifact. Callers never inspect it.
    pub credential: String,
    pub channel_name: String,
    pub participant_id: u32,
    pub expires_at: DateTime<Utc>,
}

impl JoinGrant {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential service unreachable: {0}")]
    Unreachable(String),
    #[error("credential service misconfigured: {0}")]
    Misconfigured(String),
}

/// The signing collaborator. Consumed exactly once per call attempt, before
/// the waiting room is entered; a failure here is fatal to call entry.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn issue(&self, session_id: &str, participant_id: u32)
        -> Result<JoinGrant, CredentialError>;
}

/// Local issuer for the simulator and tests. Mints unsigned grants with the
/// production TTL; the real deployment swaps in the backend signing endpoint
/// behind the same trait.
#[derive(Default)]
pub struct DevCredentialProvider;

#[async_trait]
impl CredentialProvider for DevCredentialProvider {
    async fn issue(
        &self,
        session_id: &str,
        participant_id: u32,
    ) -> Result<JoinGrant, CredentialError> {
        use rand::Rng;
        let nonce: u64 = rand::thread_rng().gen();
        Ok(JoinGrant {
            credential: format!("dev-{}-{}-{:016x}", session_id, participant_id, nonce),
            channel_name: channel_name(session_id),
            participant_id,
            expires_at: Utc::now() + Duration::seconds(CREDENTIAL_TTL_SECS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_is_deterministic() {
        assert_eq!(channel_name("abc123"), "class_abc123");
        assert_eq!(channel_name("abc123"), channel_name("abc123"));
    }

    #[tokio::test]
    async fn dev_grant_carries_ttl() {
        let grant = DevCredentialProvider
            .issue("abc123", 7)
            .await
            .unwrap();
        assert_eq!(grant.channel_name, "class_abc123");
        assert_eq!(grant.participant_id, 7);
        assert!(!grant.is_expired(Utc::now()));
        assert!(grant.is_expired(Utc::now() + Duration::seconds(CREDENTIAL_TTL_SECS + 1)));
    }
}
