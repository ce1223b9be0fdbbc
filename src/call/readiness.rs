use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::{EngineError, MediaEngine};
use crate::events::EventSender;

use super::session::{spawn_call_session, CallHandle};
use super::{CallParams, LocalMediaState};

/// Waiting-room phases. `Failed` is recoverable via [`ReadinessController::retry`];
/// `Cancelled` and the hand-off out of `Joining` are terminal for this controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessPhase {
    Initializing,
    Ready,
    Joining,
    Failed,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("could not start call: {0}")]
    Entry(#[source] EngineError),
    #[error("could not join call: {0}")]
    Join(#[source] EngineError),
    #[error("join timed out after {0:?}")]
    JoinTimeout(Duration),
}

/// Pre-join device controller. Owns the camera preview and the mic/camera
/// toggles the user can flip before committing; nothing is published until
/// [`ReadinessController::confirm`] joins the channel and hands the engine's
/// event subscription to the in-call task.
pub struct ReadinessController {
    engine: Arc<dyn MediaEngine>,
    event_tx: EventSender,
    params: CallParams,
    local: LocalMediaState,
    phase: ReadinessPhase,
}

impl ReadinessController {
    pub fn new(engine: Arc<dyn MediaEngine>, event_tx: EventSender, params: CallParams) -> Self {
        Self {
            engine,
            event_tx,
            params,
            local: LocalMediaState::default(),
            phase: ReadinessPhase::Initializing,
        }
    }

    pub fn phase(&self) -> ReadinessPhase {
        self.phase
    }

    pub fn local_state(&self) -> LocalMediaState {
        self.local
    }

    /// Bring up the engine and local preview. On failure the controller sits
    /// in `Failed` and the caller offers retry or cancel.
    pub async fn enter(&mut self) -> Result<(), ReadinessError> {
        self.phase = ReadinessPhase::Initializing;
        if let Err(e) = self.engine.initialize().await {
            self.phase = ReadinessPhase::Failed;
            return Err(ReadinessError::Entry(e));
        }
        if let Err(e) = self.engine.start_preview().await {
            self.phase = ReadinessPhase::Failed;
            return Err(ReadinessError::Entry(e));
        }
        self.phase = ReadinessPhase::Ready;
        info!("waiting room ready for channel {}", self.params.channel_name);
        Ok(())
    }

    /// Re-enter `Initializing` after a failed entry.
    pub async fn retry(&mut self) -> Result<(), ReadinessError> {
        self.enter().await
    }

    /// Flip the mic flag the user will join with. Optimistic: the display
    /// flag flips even if the engine call fails.
    pub async fn toggle_mic(&mut self) {
        let next = !self.local.mic_muted;
        if let Err(e) = self.engine.mute_local_audio(next).await {
            warn!("pre-join mic toggle not applied by engine: {}", e);
        }
        self.local.mic_muted = next;
    }

    /// Flip the camera flag the user will join with. A user who turns the
    /// camera off here joins with camera off.
    pub async fn toggle_camera(&mut self) {
        let next = !self.local.camera_off;
        if let Err(e) = self.engine.mute_local_video(next).await {
            warn!("pre-join camera toggle not applied by engine: {}", e);
        }
        self.local.camera_off = next;
    }

    /// Abort back to the caller's flow. Stops the preview so no device
    /// resource dangles; stop failures are logged, never propagated.
    pub async fn cancel(mut self) {
        if let Err(e) = self.engine.stop_preview().await {
            warn!("stop_preview failed during cancel: {}", e);
        }
        self.phase = ReadinessPhase::Cancelled;
        info!("waiting room cancelled for channel {}", self.params.channel_name);
    }

    /// User confirmed: join the channel with the flags chosen here, then hand
    /// off to the in-call task. The join itself is bounded by the configured
    /// timeout so a stalled engine cannot pin us in `Joining` forever.
    pub async fn confirm(mut self) -> Result<CallHandle, ReadinessError> {
        self.phase = ReadinessPhase::Joining;

        // Subscribe before joining so the join ack cannot be missed.
        let events_rx = match self.engine.subscribe_events().await {
            Ok(rx) => rx,
            Err(e) => {
                self.phase = ReadinessPhase::Failed;
                return Err(ReadinessError::Join(e));
            }
        };

        let join = self.engine.join_channel(
            &self.params.credential,
            &self.params.channel_name,
            self.params.local_participant_id,
        );
        match tokio::time::timeout(self.params.join_timeout, join).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.abandon_join().await;
                return Err(ReadinessError::Join(e));
            }
            Err(_) => {
                self.abandon_join().await;
                return Err(ReadinessError::JoinTimeout(self.params.join_timeout));
            }
        }

        info!("joined channel {}, handing off to call session", self.params.channel_name);
        Ok(spawn_call_session(
            self.engine.clone(),
            self.event_tx.clone(),
            self.params.clone(),
            self.local,
            events_rx,
        ))
    }

    /// Failed join: give back the subscription and preview, report `Failed`.
    /// A timed-out join may still have completed inside the engine, so the
    /// channel is left too; leave is idempotent, so this is safe when the
    /// join never landed. No partial state stays active.
    async fn abandon_join(&mut self) {
        self.engine.unsubscribe_events().await;
        if let Err(e) = self.engine.stop_preview().await {
            warn!("stop_preview failed after join failure: {}", e);
        }
        if let Err(e) = self.engine.leave_channel().await {
            warn!("leave_channel failed after join failure: {}", e);
        }
        self.phase = ReadinessPhase::Failed;
    }
}
