use serde::Serialize;
use tokio::sync::broadcast;

use crate::call::ConnectionPhase;

/// UI-facing application events.
/// Emitted by the call controllers, consumed by the platform shell layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum AppEvent {
    /// The in-call macro state changed.
    CallPhaseChanged { phase: ConnectionPhase },
    /// Local mic/camera display flags changed (optimistic).
    LocalMediaChanged { mic_muted: bool, camera_off: bool },
    /// The remote participant arrived.
    RemoteJoined { peer_id: u32 },
    /// The remote participant left. The shell shows a modal requiring
    /// acknowledgment before the session ends.
    RemoteLeft { peer_id: u32, reason: String },
    /// Remote mute/camera state changed.
    RemoteMediaChanged { audio_muted: bool, video_off: bool },
    /// Recoverable in-call problem, shown as a non-blocking notice.
    CallWarning { code: i32, message: String },
    /// Teardown finished; the shell may navigate away.
    CallEnded,
}

pub type EventSender = broadcast::Sender<AppEvent>;
pub type EventReceiver = broadcast::Receiver<AppEvent>;

pub fn create_event_bus() -> (EventSender, EventReceiver) {
    broadcast::channel(256)
}
