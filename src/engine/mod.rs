pub mod loopback;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Events surfaced by the media engine to whichever controller currently
/// holds the subscription. This is a closed set: the engine's internal
/// transport state never leaks past these variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    /// Local join completed; the engine assigned us a participant id.
    JoinSucceeded { local_id: u32 },
    /// A remote participant joined the channel.
    PeerJoined { peer_id: u32 },
    /// A remote participant left the channel.
    PeerLeft { peer_id: u32, reason: String },
    /// Remote participant turned their video on/off.
    PeerVideoStateChanged { peer_id: u32, is_on: bool },
    /// Remote participant unmuted/muted their audio.
    PeerAudioStateChanged { peer_id: u32, is_on: bool },
    /// Non-fatal engine failure. Logged and surfaced, never state-mutating.
    EngineError { code: i32, message: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine not initialized")]
    NotInitialized,
    #[error("already joined channel {0}")]
    AlreadyJoined(String),
    #[error("invalid or expired join credential")]
    InvalidCredential,
    #[error("an event subscription is already active")]
    HandlerAlreadyRegistered,
    #[error("engine failure {code}: {message}")]
    Internal { code: i32, message: String },
}

/// The media capability the call controllers drive. Transport, codecs, and
/// mixing live behind this seam; the production implementation wraps the
/// vendor RTC SDK, while [`loopback::LoopbackEngine`] serves the simulator
/// and tests.
///
/// The engine is a process-wide resource injected from the composition root.
/// At most one event subscription may be live at a time: the waiting room and
/// the in-call controller hand it off strictly, never overlap.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Configure the engine for two-way audio/video publishing with default
    /// routing to the loudspeaker. Idempotent; a no-op when already done.
    async fn initialize(&self) -> Result<(), EngineError>;

    /// Start rendering the local camera feed. Independent of channel state.
    async fn start_preview(&self) -> Result<(), EngineError>;

    /// Stop the local camera feed.
    async fn stop_preview(&self) -> Result<(), EngineError>;

    /// Join a named channel, publishing local mic + camera tracks and
    /// auto-subscribing to remote tracks. Fails when not initialized or the
    /// credential is invalid/expired.
    async fn join_channel(
        &self,
        credential: &str,
        channel_name: &str,
        local_id: u32,
    ) -> Result<(), EngineError>;

    /// Leave the current channel. Idempotent; safe when never joined.
    async fn leave_channel(&self) -> Result<(), EngineError>;

    async fn mute_local_audio(&self, muted: bool) -> Result<(), EngineError>;

    async fn mute_local_video(&self, muted: bool) -> Result<(), EngineError>;

    async fn switch_camera(&self) -> Result<(), EngineError>;

    async fn set_speakerphone(&self, on: bool) -> Result<(), EngineError>;

    /// Take the single event subscription. Errors if a receiver is already
    /// out; call [`MediaEngine::unsubscribe_events`] to give it back.
    async fn subscribe_events(&self) -> Result<mpsc::Receiver<EngineEvent>, EngineError>;

    /// Release the event subscription so a later controller can take it.
    async fn unsubscribe_events(&self);

    /// Tear the engine down entirely. App-level cleanup only, not per-call.
    async fn release(&self) -> Result<(), EngineError>;
}
