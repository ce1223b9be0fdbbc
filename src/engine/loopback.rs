use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use super::{EngineError, EngineEvent, MediaEngine};

/// Everything the loopback engine remembers about calls made against it.
/// The simulator prints from it; lifecycle tests assert on it.
#[derive(Debug, Default)]
struct CallLog {
    joins: Vec<JoinRecord>,
    leaves: usize,
    audio_mutes: Vec<bool>,
    video_mutes: Vec<bool>,
    camera_switches: usize,
}

#[derive(Debug, Clone)]
pub struct JoinRecord {
    pub credential: String,
    pub channel_name: String,
    pub local_id: u32,
}

/// Failure injection knobs. All off by default.
#[derive(Debug, Default)]
struct Faults {
    fail_initialize: bool,
    fail_preview: bool,
    reject_credential: bool,
    fail_mute_audio: bool,
    fail_mute_video: bool,
    /// Accept the join but never emit `JoinSucceeded` (stalled-join case).
    drop_join_ack: bool,
    /// Never return from `join_channel` at all (unresponsive-transport case).
    stall_join: bool,
}

#[derive(Debug, Default)]
struct Inner {
    initialized: bool,
    previewing: bool,
    joined_channel: Option<String>,
    events_tx: Option<mpsc::Sender<EngineEvent>>,
    speakerphone: bool,
    front_camera: bool,
    log: CallLog,
    faults: Faults,
}

/// In-process [`MediaEngine`] used by the `--simulate` binary and the
/// lifecycle tests. Honors the adapter contract (idempotent initialize/leave,
/// single event subscription, credential check on join) without any real
/// transport; remote-peer activity is injected through [`LoopbackEngine::push_event`].
#[derive(Default)]
pub struct LoopbackEngine {
    inner: Mutex<Inner>,
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a remote-peer or engine event, as if the transport produced it.
    /// Dropped silently when nobody is subscribed.
    pub async fn push_event(&self, event: EngineEvent) {
        // Clone the sender out so the send never blocks the engine lock.
        let tx = self.inner.lock().await.events_tx.clone();
        match tx {
            Some(tx) => {
                if tx.send(event).await.is_err() {
                    debug!("loopback: subscriber gone, event dropped");
                }
            }
            None => debug!("loopback: no subscriber, event dropped"),
        }
    }

    pub async fn leave_calls(&self) -> usize {
        self.inner.lock().await.log.leaves
    }

    pub async fn audio_mute_calls(&self) -> Vec<bool> {
        self.inner.lock().await.log.audio_mutes.clone()
    }

    pub async fn video_mute_calls(&self) -> Vec<bool> {
        self.inner.lock().await.log.video_mutes.clone()
    }

    pub async fn camera_switches(&self) -> usize {
        self.inner.lock().await.log.camera_switches
    }

    pub async fn last_join(&self) -> Option<JoinRecord> {
        self.inner.lock().await.log.joins.last().cloned()
    }

    pub async fn joined_channel(&self) -> Option<String> {
        self.inner.lock().await.joined_channel.clone()
    }

    pub async fn is_previewing(&self) -> bool {
        self.inner.lock().await.previewing
    }

    pub async fn has_subscriber(&self) -> bool {
        self.inner.lock().await.events_tx.is_some()
    }

    pub async fn set_fail_initialize(&self, fail: bool) {
        self.inner.lock().await.faults.fail_initialize = fail;
    }

    pub async fn set_fail_preview(&self, fail: bool) {
        self.inner.lock().await.faults.fail_preview = fail;
    }

    pub async fn set_reject_credential(&self, reject: bool) {
        self.inner.lock().await.faults.reject_credential = reject;
    }

    pub async fn set_fail_mute_audio(&self, fail: bool) {
        self.inner.lock().await.faults.fail_mute_audio = fail;
    }

    pub async fn set_fail_mute_video(&self, fail: bool) {
        self.inner.lock().await.faults.fail_mute_video = fail;
    }

    pub async fn set_drop_join_ack(&self, drop: bool) {
        self.inner.lock().await.faults.drop_join_ack = drop;
    }

    pub async fn set_stall_join(&self, stall: bool) {
        self.inner.lock().await.faults.stall_join = stall;
    }
}

#[async_trait::async_trait]
impl MediaEngine for LoopbackEngine {
    async fn initialize(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        if inner.faults.fail_initialize {
            return Err(EngineError::Internal {
                code: 1,
                message: "simulated initialize failure".into(),
            });
        }
        if inner.initialized {
            return Ok(());
        }
        inner.initialized = true;
        // Loudspeaker is the default route for a video call.
        inner.speakerphone = true;
        inner.front_camera = true;
        info!("loopback engine initialized");
        Ok(())
    }

    async fn start_preview(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        if !inner.initialized {
            return Err(EngineError::NotInitialized);
        }
        if inner.faults.fail_preview {
            return Err(EngineError::Internal {
                code: 2,
                message: "simulated preview failure".into(),
            });
        }
        inner.previewing = true;
        Ok(())
    }

    async fn stop_preview(&self) -> Result<(), EngineError> {
        self.inner.lock().await.previewing = false;
        Ok(())
    }

    async fn join_channel(
        &self,
        credential: &str,
        channel_name: &str,
        local_id: u32,
    ) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        if !inner.initialized {
            return Err(EngineError::NotInitialized);
        }
        if inner.faults.stall_join {
            drop(inner);
            // Caller-side timeout is the only way out.
            return std::future::pending().await;
        }
        if let Some(ref joined) = inner.joined_channel {
            return Err(EngineError::AlreadyJoined(joined.clone()));
        }
        if credential.is_empty() || inner.faults.reject_credential {
            return Err(EngineError::InvalidCredential);
        }

        inner.joined_channel = Some(channel_name.to_string());
        inner.log.joins.push(JoinRecord {
            credential: credential.to_string(),
            channel_name: channel_name.to_string(),
            local_id,
        });
        info!("loopback: joined channel {} as {}", channel_name, local_id);

        let ack_tx = if inner.faults.drop_join_ack {
            None
        } else {
            inner.events_tx.clone()
        };
        drop(inner);
        if let Some(tx) = ack_tx {
            let _ = tx.send(EngineEvent::JoinSucceeded { local_id }).await;
        }
        Ok(())
    }

    async fn leave_channel(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        inner.log.leaves += 1;
        if let Some(channel) = inner.joined_channel.take() {
            info!("loopback: left channel {}", channel);
        }
        Ok(())
    }

    async fn mute_local_audio(&self, muted: bool) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        inner.log.audio_mutes.push(muted);
        if inner.faults.fail_mute_audio {
            return Err(EngineError::Internal {
                code: 3,
                message: "simulated audio mute failure".into(),
            });
        }
        Ok(())
    }

    async fn mute_local_video(&self, muted: bool) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        inner.log.video_mutes.push(muted);
        if inner.faults.fail_mute_video {
            return Err(EngineError::Internal {
                code: 4,
                message: "simulated video mute failure".into(),
            });
        }
        Ok(())
    }

    async fn switch_camera(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        inner.front_camera = !inner.front_camera;
        inner.log.camera_switches += 1;
        Ok(())
    }

    async fn set_speakerphone(&self, on: bool) -> Result<(), EngineError> {
        self.inner.lock().await.speakerphone = on;
        Ok(())
    }

    async fn subscribe_events(&self) -> Result<mpsc::Receiver<EngineEvent>, EngineError> {
        let mut inner = self.inner.lock().await;
        if inner.events_tx.is_some() {
            return Err(EngineError::HandlerAlreadyRegistered);
        }
        let (tx, rx) = mpsc::channel(64);
        inner.events_tx = Some(tx);
        Ok(rx)
    }

    async fn unsubscribe_events(&self) {
        self.inner.lock().await.events_tx = None;
    }

    async fn release(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        *inner = Inner::default();
        info!("loopback engine released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let engine = LoopbackEngine::new();
        engine.initialize().await.unwrap();
        engine.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn preview_requires_initialize() {
        let engine = LoopbackEngine::new();
        assert!(matches!(
            engine.start_preview().await,
            Err(EngineError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn join_rejects_empty_credential() {
        let engine = LoopbackEngine::new();
        engine.initialize().await.unwrap();
        assert!(matches!(
            engine.join_channel("", "class_1", 7).await,
            Err(EngineError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn second_join_fails_while_joined() {
        let engine = LoopbackEngine::new();
        engine.initialize().await.unwrap();
        engine.join_channel("cred", "class_1", 7).await.unwrap();
        assert!(matches!(
            engine.join_channel("cred", "class_2", 7).await,
            Err(EngineError::AlreadyJoined(_))
        ));
    }

    #[tokio::test]
    async fn single_event_subscription() {
        let engine = LoopbackEngine::new();
        let _rx = engine.subscribe_events().await.unwrap();
        assert!(matches!(
            engine.subscribe_events().await,
            Err(EngineError::HandlerAlreadyRegistered)
        ));
        engine.unsubscribe_events().await;
        assert!(engine.subscribe_events().await.is_ok());
    }

    #[tokio::test]
    async fn join_emits_ack_to_subscriber() {
        let engine = LoopbackEngine::new();
        engine.initialize().await.unwrap();
        let mut rx = engine.subscribe_events().await.unwrap();
        engine.join_channel("cred", "class_1", 7).await.unwrap();
        match rx.recv().await {
            Some(EngineEvent::JoinSucceeded { local_id }) => assert_eq!(local_id, 7),
            other => panic!("expected JoinSucceeded, got {:?}", other),
        }
    }
}
