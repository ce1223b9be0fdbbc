//! End-to-end lifecycle checks: waiting room through teardown against the
//! loopback engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use tutorlink::call::readiness::ReadinessController;
use tutorlink::call::session::{CallHandle, WARN_JOIN_TIMEOUT, WARN_SYNC_FAILED};
use tutorlink::call::{CallParams, CallRole, ConnectionPhase, DEFAULT_JOIN_TIMEOUT};
use tutorlink::engine::loopback::LoopbackEngine;
use tutorlink::engine::{EngineEvent, MediaEngine};
use tutorlink::events::{create_event_bus, AppEvent, EventReceiver, EventSender};

const WAIT: Duration = Duration::from_secs(2);

fn params() -> CallParams {
    CallParams {
        session_id: "abc123".into(),
        channel_name: "class_abc123".into(),
        credential: "cred".into(),
        local_participant_id: 7,
        role: CallRole::Teacher,
        local_display_name: "Ms. Rivera".into(),
        remote_display_name: "Sam".into(),
        join_timeout: DEFAULT_JOIN_TIMEOUT,
    }
}

fn setup() -> (Arc<LoopbackEngine>, EventSender, EventReceiver) {
    let engine = Arc::new(LoopbackEngine::new());
    let (event_tx, event_rx) = create_event_bus();
    (engine, event_tx, event_rx)
}

fn waiting_room(
    engine: &Arc<LoopbackEngine>,
    event_tx: &EventSender,
    params: CallParams,
) -> ReadinessController {
    ReadinessController::new(engine.clone() as Arc<dyn MediaEngine>, event_tx.clone(), params)
}

/// Join and wait for the session to report `Active`.
async fn join_active(room: ReadinessController) -> CallHandle {
    let handle = room.confirm().await.expect("join should succeed");
    let mut snapshots = handle.subscribe_snapshots();
    timeout(WAIT, snapshots.wait_for(|s| s.phase == ConnectionPhase::Active))
        .await
        .expect("timed out waiting for Active")
        .expect("snapshot channel closed");
    handle
}

async fn next_event<F>(rx: &mut EventReceiver, mut matches: F) -> AppEvent
where
    F: FnMut(&AppEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for app event")
}

async fn wait_for_leave(engine: &LoopbackEngine, expected: usize) {
    timeout(WAIT, async {
        while engine.leave_calls().await < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for leave_channel");
}

// Full happy path: device bring-up, camera pre-toggle, join with that state,
// Active with the engine-assigned participant id.
#[tokio::test]
async fn waiting_room_to_active_call() {
    let (engine, event_tx, _event_rx) = setup();
    let mut room = waiting_room(&engine, &event_tx, params());
    room.enter().await.unwrap();

    room.toggle_camera().await;
    assert!(room.local_state().camera_off);
    assert_eq!(engine.video_mute_calls().await, vec![true]);

    let handle = join_active(room).await;
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.local_participant_id, 7);
    assert!(snapshot.local.camera_off);

    let join = engine.last_join().await.unwrap();
    assert_eq!(join.channel_name, "class_abc123");
    assert_eq!(join.credential, "cred");
    assert_eq!(join.local_id, 7);

    handle.hang_up().await;
    handle.ended().await;
}

// Remote joins then leaves; the session survives until the user
// acknowledges, then leaves the channel exactly once.
#[tokio::test]
async fn remote_departure_ends_after_acknowledgment() {
    let (engine, event_tx, mut event_rx) = setup();
    let mut room = waiting_room(&engine, &event_tx, params());
    room.enter().await.unwrap();
    let handle = join_active(room).await;

    engine.push_event(EngineEvent::PeerJoined { peer_id: 42 }).await;
    next_event(&mut event_rx, |e| matches!(e, AppEvent::RemoteJoined { peer_id: 42 })).await;

    engine
        .push_event(EngineEvent::PeerLeft { peer_id: 42, reason: "quit".into() })
        .await;
    let left = next_event(&mut event_rx, |e| matches!(e, AppEvent::RemoteLeft { .. })).await;
    assert!(matches!(left, AppEvent::RemoteLeft { peer_id: 42, .. }));

    // Still up: departure alone never tears the call down.
    let snapshot = handle.snapshot();
    assert_eq!(snapshot.phase, ConnectionPhase::Active);
    assert_eq!(snapshot.remote_participant_id, None);
    assert!(!snapshot.remote.present);
    assert_eq!(engine.leave_calls().await, 0);

    handle.acknowledge_remote_left().await;
    handle.ended().await;
    assert_eq!(engine.leave_calls().await, 1);
    assert!(!engine.has_subscriber().await);
}

// Hanging up releases the camera preview started in the waiting room.
#[tokio::test]
async fn hang_up_stops_preview() {
    let (engine, event_tx, _event_rx) = setup();
    let mut room = waiting_room(&engine, &event_tx, params());
    room.enter().await.unwrap();
    let handle = join_active(room).await;
    assert!(engine.is_previewing().await);

    handle.hang_up().await;
    handle.ended().await;
    assert!(!engine.is_previewing().await);
}

// Leave is idempotent at the adapter seam.
#[tokio::test]
async fn leave_channel_is_idempotent() {
    let (engine, _event_tx, _event_rx) = setup();
    engine.initialize().await.unwrap();
    engine.join_channel("cred", "class_abc123", 7).await.unwrap();

    engine.leave_channel().await.unwrap();
    let after_first = engine.joined_channel().await;
    engine.leave_channel().await.unwrap();
    assert_eq!(engine.joined_channel().await, after_first);
    assert_eq!(after_first, None);
}

// Two quick mic toggles cancel out, with alternating engine args.
#[tokio::test]
async fn double_mic_toggle_cancels_out() {
    let (engine, event_tx, _event_rx) = setup();
    let mut room = waiting_room(&engine, &event_tx, params());
    room.enter().await.unwrap();
    let handle = join_active(room).await;

    handle.toggle_mic().await;
    handle.toggle_mic().await;

    let mut snapshots = handle.subscribe_snapshots();
    timeout(WAIT, snapshots.wait_for(|s| !s.local.mic_muted))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(engine.audio_mute_calls().await, vec![true, false]);

    handle.hang_up().await;
    handle.ended().await;
}

// The display flag flips even when the engine refuses the call, and the
// user sees a sync warning.
#[tokio::test]
async fn mic_toggle_is_optimistic_under_engine_failure() {
    let (engine, event_tx, mut event_rx) = setup();
    engine.set_fail_mute_audio(true).await;
    let mut room = waiting_room(&engine, &event_tx, params());
    room.enter().await.unwrap();
    let handle = join_active(room).await;

    handle.toggle_mic().await;
    let mut snapshots = handle.subscribe_snapshots();
    timeout(WAIT, snapshots.wait_for(|s| s.local.mic_muted))
        .await
        .unwrap()
        .unwrap();

    let warning = next_event(&mut event_rx, |e| matches!(e, AppEvent::CallWarning { .. })).await;
    assert!(matches!(warning, AppEvent::CallWarning { code: WARN_SYNC_FAILED, .. }));

    handle.hang_up().await;
    handle.ended().await;
}

// Dropping the handle (navigation away) runs the same teardown as the
// end-call button: handler released, channel left exactly once.
#[tokio::test]
async fn dropped_handle_triggers_full_teardown() {
    let (engine, event_tx, _event_rx) = setup();
    let mut room = waiting_room(&engine, &event_tx, params());
    room.enter().await.unwrap();
    let handle = join_active(room).await;

    drop(handle);
    wait_for_leave(&engine, 1).await;
    assert_eq!(engine.leave_calls().await, 1);
    assert!(!engine.has_subscriber().await);
    assert!(!engine.is_previewing().await);
}

// Media controls sent before the join ack are dropped, not queued: the flag
// stays put and the engine is never called.
#[tokio::test]
async fn media_commands_are_ignored_before_join_ack() {
    let (engine, event_tx, _event_rx) = setup();
    engine.set_drop_join_ack(true).await;
    let mut stalled = params();
    stalled.join_timeout = Duration::from_millis(200);

    let mut room = waiting_room(&engine, &event_tx, stalled);
    room.enter().await.unwrap();
    let handle = room.confirm().await.expect("join_channel itself succeeds");

    handle.toggle_mic().await;
    let mut snapshots = handle.subscribe_snapshots();
    timeout(WAIT, snapshots.wait_for(|s| s.phase == ConnectionPhase::Ended))
        .await
        .unwrap()
        .unwrap();
    assert!(!handle.snapshot().local.mic_muted);
    assert!(engine.audio_mute_calls().await.is_empty());
}

// In-call engine errors warn but never drop the call.
#[tokio::test]
async fn engine_error_is_soft() {
    let (engine, event_tx, mut event_rx) = setup();
    let mut room = waiting_room(&engine, &event_tx, params());
    room.enter().await.unwrap();
    let handle = join_active(room).await;

    engine
        .push_event(EngineEvent::EngineError { code: 17, message: "network degraded".into() })
        .await;
    let warning = next_event(&mut event_rx, |e| matches!(e, AppEvent::CallWarning { .. })).await;
    assert!(matches!(warning, AppEvent::CallWarning { code: 17, .. }));
    assert_eq!(handle.snapshot().phase, ConnectionPhase::Active);

    handle.hang_up().await;
    handle.ended().await;
}

// Redesigned gap: a join whose ack never arrives ends the session instead of
// pinning it in Connecting forever.
#[tokio::test]
async fn missing_join_ack_times_out_and_tears_down() {
    let (engine, event_tx, mut event_rx) = setup();
    engine.set_drop_join_ack(true).await;
    let mut short = params();
    short.join_timeout = Duration::from_millis(100);

    let mut room = waiting_room(&engine, &event_tx, short);
    room.enter().await.unwrap();
    let handle = room.confirm().await.expect("join_channel itself succeeds");

    let warning = next_event(&mut event_rx, |e| matches!(e, AppEvent::CallWarning { .. })).await;
    assert!(matches!(warning, AppEvent::CallWarning { code: WARN_JOIN_TIMEOUT, .. }));

    let mut snapshots = handle.subscribe_snapshots();
    timeout(WAIT, snapshots.wait_for(|s| s.phase == ConnectionPhase::Ended))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(engine.leave_calls().await, 1);
    assert!(!engine.has_subscriber().await);
}
