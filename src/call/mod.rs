pub mod presentation;
pub mod readiness;
pub mod session;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::EngineEvent;

/// Which side of the 1:1 class this participant is. Display labeling only;
/// the call protocol is symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallRole {
    Teacher,
    Student,
}

/// Local device flags as shown to the user. Optimistic: they flip on user
/// action regardless of the engine call outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMediaState {
    pub mic_muted: bool,
    pub camera_off: bool,
}

/// What we know about the remote participant's media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMediaState {
    pub audio_muted: bool,
    pub video_off: bool,
    pub present: bool,
}

/// Macro state of an in-call session. `Active` is re-entrant: inbound events
/// mutate remote state without changing the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    Connecting,
    Active,
    Ending,
    Ended,
}

/// Everything carried over from the waiting room into the in-call task.
#[derive(Debug, Clone)]
pub struct CallParams {
    /// Scheduled-class id this call is tied to. Owned externally.
    pub session_id: String,
    pub channel_name: String,
    pub credential: String,
    pub local_participant_id: u32,
    pub role: CallRole,
    pub local_display_name: String,
    pub remote_display_name: String,
    /// Bound on join_channel and on the wait for the engine's join ack.
    pub join_timeout: Duration,
}

pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Notable outcomes of feeding one engine event through the reducer. The
/// session loop maps these to app events; plain remote-state updates that
/// need no notice return `RemoteMediaChanged`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    JoinConfirmed { local_id: u32 },
    RemoteJoined { peer_id: u32 },
    RemoteLeft { peer_id: u32, reason: String },
    RemoteMediaChanged,
    Warning { code: i32, message: String },
}

/// Aggregate state for one call attempt. All mutation from engine events goes
/// through [`CallSession::apply_engine_event`]; user actions only touch
/// `local` (and `phase` on teardown).
#[derive(Debug, Clone)]
pub struct CallSession {
    pub channel_name: String,
    pub role: CallRole,
    /// 0 until the engine confirms the join.
    pub local_participant_id: u32,
    /// Set iff `remote.present`; at most one remote is modeled.
    pub remote_participant_id: Option<u32>,
    pub local: LocalMediaState,
    pub remote: RemoteMediaState,
    pub phase: ConnectionPhase,
    pub local_display_name: String,
    pub remote_display_name: String,
}

impl CallSession {
    pub fn new(params: &CallParams, local: LocalMediaState) -> Self {
        Self {
            channel_name: params.channel_name.clone(),
            role: params.role,
            local_participant_id: 0,
            remote_participant_id: None,
            local,
            remote: RemoteMediaState::default(),
            phase: ConnectionPhase::Connecting,
            local_display_name: params.local_display_name.clone(),
            remote_display_name: params.remote_display_name.clone(),
        }
    }

    /// Single reducer for inbound engine events. Stale or out-of-phase events
    /// are dropped without mutating state.
    pub fn apply_engine_event(&mut self, event: &EngineEvent) -> Option<SessionUpdate> {
        match event {
            EngineEvent::JoinSucceeded { local_id } => {
                if self.phase != ConnectionPhase::Connecting {
                    warn!("duplicate join ack (id {}) ignored", local_id);
                    return None;
                }
                self.local_participant_id = *local_id;
                self.phase = ConnectionPhase::Active;
                Some(SessionUpdate::JoinConfirmed { local_id: *local_id })
            }
            // Engines may reorder; nothing before our own join ack is meaningful.
            _ if self.phase != ConnectionPhase::Active => None,
            EngineEvent::PeerJoined { peer_id } => {
                if let Some(current) = self.remote_participant_id {
                    // Single-remote model: a second joiner is out of contract.
                    warn!(
                        "peer {} joined while {} is present, ignoring",
                        peer_id, current
                    );
                    return None;
                }
                self.remote_participant_id = Some(*peer_id);
                self.remote = RemoteMediaState {
                    audio_muted: false,
                    video_off: false,
                    present: true,
                };
                Some(SessionUpdate::RemoteJoined { peer_id: *peer_id })
            }
            EngineEvent::PeerLeft { peer_id, reason } => {
                if self.remote_participant_id != Some(*peer_id) {
                    return None;
                }
                // Cleared together: presence and id are one fact.
                self.remote_participant_id = None;
                self.remote = RemoteMediaState::default();
                Some(SessionUpdate::RemoteLeft {
                    peer_id: *peer_id,
                    reason: reason.clone(),
                })
            }
            EngineEvent::PeerVideoStateChanged { peer_id, is_on } => {
                if self.remote_participant_id != Some(*peer_id) {
                    return None;
                }
                self.remote.video_off = !is_on;
                Some(SessionUpdate::RemoteMediaChanged)
            }
            EngineEvent::PeerAudioStateChanged { peer_id, is_on } => {
                if self.remote_participant_id != Some(*peer_id) {
                    return None;
                }
                self.remote.audio_muted = !is_on;
                Some(SessionUpdate::RemoteMediaChanged)
            }
            EngineEvent::EngineError { code, message } => Some(SessionUpdate::Warning {
                code: *code,
                message: message.clone(),
            }),
        }
    }

    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            phase: self.phase,
            role: self.role,
            channel_name: self.channel_name.clone(),
            local_participant_id: self.local_participant_id,
            remote_participant_id: self.remote_participant_id,
            local: self.local,
            remote: self.remote,
            local_display_name: self.local_display_name.clone(),
            remote_display_name: self.remote_display_name.clone(),
        }
    }
}

/// Point-in-time call state published over `watch` for the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSnapshot {
    pub phase: ConnectionPhase,
    pub role: CallRole,
    pub channel_name: String,
    pub local_participant_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_participant_id: Option<u32>,
    pub local: LocalMediaState,
    pub remote: RemoteMediaState,
    pub local_display_name: String,
    pub remote_display_name: String,
}

impl Default for CallSnapshot {
    fn default() -> Self {
        Self {
            phase: ConnectionPhase::Connecting,
            role: CallRole::Student,
            channel_name: String::new(),
            local_participant_id: 0,
            remote_participant_id: None,
            local: LocalMediaState::default(),
            remote: RemoteMediaState::default(),
            local_display_name: String::new(),
            remote_display_name: String::new(),
        }
    }
}
