use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineEvent, MediaEngine};
use crate::events::{AppEvent, EventSender};

use super::{CallParams, CallSession, CallSnapshot, ConnectionPhase, LocalMediaState, SessionUpdate};

/// Warning code attached to a local toggle the engine refused.
pub const WARN_SYNC_FAILED: i32 = -2;
/// Warning code attached to a join that never got its ack.
pub const WARN_JOIN_TIMEOUT: i32 = -1;

/// User actions while in the call. `HangUp` arrives only after the shell's
/// explicit confirmation dialog; `AcknowledgeRemoteLeft` is the single
/// follow-up action on the peer-left modal.
#[derive(Debug)]
pub enum CallCommand {
    ToggleMic,
    ToggleCamera,
    SwitchCamera,
    SetSpeakerphone(bool),
    HangUp,
    AcknowledgeRemoteLeft,
}

/// Handle held by the shell for the lifetime of the call screen. Dropping it
/// closes the command channel, which the session task treats as the
/// unconditional cleanup path: the channel is left and the event subscription
/// released even when the user navigates away without pressing anything.
pub struct CallHandle {
    commands: mpsc::Sender<CallCommand>,
    snapshot_rx: watch::Receiver<CallSnapshot>,
    task: JoinHandle<()>,
}

impl CallHandle {
    pub fn snapshot(&self) -> CallSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<CallSnapshot> {
        self.snapshot_rx.clone()
    }

    pub async fn toggle_mic(&self) {
        let _ = self.commands.send(CallCommand::ToggleMic).await;
    }

    pub async fn toggle_camera(&self) {
        let _ = self.commands.send(CallCommand::ToggleCamera).await;
    }

    pub async fn switch_camera(&self) {
        let _ = self.commands.send(CallCommand::SwitchCamera).await;
    }

    pub async fn set_speakerphone(&self, on: bool) {
        let _ = self.commands.send(CallCommand::SetSpeakerphone(on)).await;
    }

    pub async fn hang_up(&self) {
        let _ = self.commands.send(CallCommand::HangUp).await;
    }

    pub async fn acknowledge_remote_left(&self) {
        let _ = self.commands.send(CallCommand::AcknowledgeRemoteLeft).await;
    }

    /// Wait for the session task to finish teardown.
    pub async fn ended(self) {
        let _ = self.task.await;
    }
}

/// Spawn the in-call task. The engine event receiver comes from the waiting
/// room, which subscribed before joining so the join ack cannot be missed.
pub fn spawn_call_session(
    engine: Arc<dyn MediaEngine>,
    event_tx: EventSender,
    params: CallParams,
    local: LocalMediaState,
    events_rx: mpsc::Receiver<EngineEvent>,
) -> CallHandle {
    let session = CallSession::new(&params, local);
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
    let task = tokio::spawn(run_call_session(
        engine, event_tx, params, session, events_rx, cmd_rx, snapshot_tx,
    ));
    CallHandle {
        commands: cmd_tx,
        snapshot_rx,
        task,
    }
}

async fn run_call_session(
    engine: Arc<dyn MediaEngine>,
    event_tx: EventSender,
    params: CallParams,
    mut session: CallSession,
    mut events_rx: mpsc::Receiver<EngineEvent>,
    mut cmd_rx: mpsc::Receiver<CallCommand>,
    snapshot_tx: watch::Sender<CallSnapshot>,
) {
    info!("call session started for channel {}", params.channel_name);
    let connect_deadline = tokio::time::sleep(params.join_timeout);
    tokio::pin!(connect_deadline);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None => {
                        info!("call handle dropped, running unconditional cleanup");
                        break;
                    }
                    Some(CallCommand::HangUp) => {
                        info!("user ended the call");
                        break;
                    }
                    Some(CallCommand::AcknowledgeRemoteLeft) => {
                        info!("remote departure acknowledged, ending call");
                        break;
                    }
                    // Media controls only make sense once the join is
                    // confirmed; hang-up and acknowledge stay available above.
                    Some(cmd) if session.phase != ConnectionPhase::Active => {
                        debug!("ignoring {:?} outside the active phase", cmd);
                    }
                    Some(CallCommand::ToggleMic) => {
                        let next = !session.local.mic_muted;
                        if let Err(e) = engine.mute_local_audio(next).await {
                            warn!("mic toggle not applied by engine: {}", e);
                            let _ = event_tx.send(AppEvent::CallWarning {
                                code: WARN_SYNC_FAILED,
                                message: "microphone state may be out of sync".into(),
                            });
                        }
                        // Optimistic: the display flag flips regardless.
                        session.local.mic_muted = next;
                        let _ = event_tx.send(AppEvent::LocalMediaChanged {
                            mic_muted: session.local.mic_muted,
                            camera_off: session.local.camera_off,
                        });
                    }
                    Some(CallCommand::ToggleCamera) => {
                        let next = !session.local.camera_off;
                        if let Err(e) = engine.mute_local_video(next).await {
                            warn!("camera toggle not applied by engine: {}", e);
                            let _ = event_tx.send(AppEvent::CallWarning {
                                code: WARN_SYNC_FAILED,
                                message: "camera state may be out of sync".into(),
                            });
                        }
                        session.local.camera_off = next;
                        let _ = event_tx.send(AppEvent::LocalMediaChanged {
                            mic_muted: session.local.mic_muted,
                            camera_off: session.local.camera_off,
                        });
                    }
                    Some(CallCommand::SwitchCamera) => {
                        // Fire and forget; no tracked state beyond the engine's.
                        if let Err(e) = engine.switch_camera().await {
                            warn!("switch_camera failed: {}", e);
                        }
                    }
                    Some(CallCommand::SetSpeakerphone(on)) => {
                        if let Err(e) = engine.set_speakerphone(on).await {
                            warn!("set_speakerphone({}) failed: {}", on, e);
                        }
                    }
                }
                publish(&snapshot_tx, &session);
            }

            event = events_rx.recv() => {
                let Some(event) = event else {
                    warn!("engine event stream closed, ending call");
                    break;
                };
                debug!("engine event: {:?}", event);
                match session.apply_engine_event(&event) {
                    Some(SessionUpdate::JoinConfirmed { local_id }) => {
                        info!("join confirmed, local participant {}", local_id);
                        let _ = event_tx.send(AppEvent::CallPhaseChanged {
                            phase: ConnectionPhase::Active,
                        });
                    }
                    Some(SessionUpdate::RemoteJoined { peer_id }) => {
                        let _ = event_tx.send(AppEvent::RemoteJoined { peer_id });
                    }
                    Some(SessionUpdate::RemoteLeft { peer_id, reason }) => {
                        // Not fatal on its own: the shell raises a modal and
                        // sends AcknowledgeRemoteLeft when the user confirms.
                        let _ = event_tx.send(AppEvent::RemoteLeft { peer_id, reason });
                    }
                    Some(SessionUpdate::RemoteMediaChanged) => {
                        let _ = event_tx.send(AppEvent::RemoteMediaChanged {
                            audio_muted: session.remote.audio_muted,
                            video_off: session.remote.video_off,
                        });
                    }
                    Some(SessionUpdate::Warning { code, message }) => {
                        warn!("engine reported {}: {}", code, message);
                        let _ = event_tx.send(AppEvent::CallWarning { code, message });
                    }
                    None => {}
                }
                publish(&snapshot_tx, &session);
            }

            () = &mut connect_deadline, if session.phase == ConnectionPhase::Connecting => {
                error!("no join ack within {:?}, ending call", params.join_timeout);
                let _ = event_tx.send(AppEvent::CallWarning {
                    code: WARN_JOIN_TIMEOUT,
                    message: "could not connect to the class".into(),
                });
                break;
            }
        }
    }

    teardown(&engine, &event_tx, &mut session, &snapshot_tx).await;
}

/// Runs exactly once per session, on every exit path. Failures here are
/// logged and swallowed so navigation away always succeeds.
async fn teardown(
    engine: &Arc<dyn MediaEngine>,
    event_tx: &EventSender,
    session: &mut CallSession,
    snapshot_tx: &watch::Sender<CallSnapshot>,
) {
    session.phase = ConnectionPhase::Ending;
    publish(snapshot_tx, session);
    let _ = event_tx.send(AppEvent::CallPhaseChanged {
        phase: ConnectionPhase::Ending,
    });

    engine.unsubscribe_events().await;
    if let Err(e) = engine.stop_preview().await {
        warn!("stop_preview failed during teardown: {}", e);
    }
    if let Err(e) = engine.leave_channel().await {
        warn!("leave_channel failed during teardown: {}", e);
    }

    session.phase = ConnectionPhase::Ended;
    publish(snapshot_tx, session);
    let _ = event_tx.send(AppEvent::CallPhaseChanged {
        phase: ConnectionPhase::Ended,
    });
    let _ = event_tx.send(AppEvent::CallEnded);
    info!("call session ended for channel {}", session.channel_name);
}

fn publish(snapshot_tx: &watch::Sender<CallSnapshot>, session: &CallSession) {
    let _ = snapshot_tx.send(session.snapshot());
}
