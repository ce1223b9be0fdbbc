use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use tutorlink::call::{CallParams, CallRole};
use tutorlink::credentials::{CredentialProvider, DevCredentialProvider};
use tutorlink::engine::loopback::LoopbackEngine;
use tutorlink::engine::EngineEvent;
use tutorlink::events::{create_event_bus, AppEvent};
use tutorlink::services::scheduling::participant_id;
use tutorlink::state::ServiceContext;

#[derive(Parser)]
#[command(name = "tutorlink", about = "TutorLink live class call core (headless simulator)")]
struct Cli {
    /// Scheduled class id to simulate
    #[arg(long, default_value = "demo-class")]
    class_id: String,

    /// Join as "teacher" or "student"
    #[arg(long, default_value = "teacher")]
    role: String,

    /// Enter the waiting room with the camera already off
    #[arg(long)]
    camera_off: bool,

    /// Join timeout in seconds
    #[arg(long, default_value = "15")]
    join_timeout: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_simulation(cli))
}

/// Scripted 1:1 call against the loopback engine: waiting room, join, a
/// remote peer joining and muting video, a stale event, then remote departure
/// acknowledged by the local user.
async fn run_simulation(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(LoopbackEngine::new());
    let credentials = Arc::new(DevCredentialProvider);
    let (event_tx, mut event_rx) = create_event_bus();

    let (role, user_id, display_name, remote_name) = if cli.role == "student" {
        (CallRole::Student, "s-demo", "Sam", "Ms. Rivera")
    } else {
        (CallRole::Teacher, "t-demo", "Ms. Rivera", "Sam")
    };

    let ctx = ServiceContext {
        engine: engine.clone(),
        credentials: credentials.clone(),
        event_tx,
        user_id: user_id.to_string(),
        display_name: display_name.to_string(),
    };

    let grant = ctx
        .credentials
        .issue(&cli.class_id, participant_id(&ctx.user_id))
        .await?;
    let params = CallParams {
        session_id: cli.class_id.clone(),
        channel_name: grant.channel_name,
        credential: grant.credential,
        local_participant_id: grant.participant_id,
        role,
        local_display_name: ctx.display_name.clone(),
        remote_display_name: remote_name.to_string(),
        join_timeout: Duration::from_secs(cli.join_timeout),
    };

    let mut room = tutorlink::open_waiting_room(&ctx, params);
    room.enter().await?;
    if cli.camera_off {
        room.toggle_camera().await;
        info!("joining with camera off");
    }
    let handle = room.confirm().await?;

    // Remote side of the script.
    let script_engine = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        script_engine.push_event(EngineEvent::PeerJoined { peer_id: 42 }).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        script_engine
            .push_event(EngineEvent::PeerVideoStateChanged { peer_id: 42, is_on: false })
            .await;
        // Stale peer id, must be a no-op.
        script_engine
            .push_event(EngineEvent::PeerAudioStateChanged { peer_id: 99, is_on: false })
            .await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        script_engine
            .push_event(EngineEvent::PeerLeft { peer_id: 42, reason: "quit".into() })
            .await;
    });

    loop {
        match event_rx.recv().await {
            Ok(AppEvent::RemoteLeft { peer_id, reason }) => {
                info!("remote {} left ({}), acknowledging", peer_id, reason);
                handle.acknowledge_remote_left().await;
            }
            Ok(AppEvent::CallEnded) => break,
            Ok(event) => info!("app event: {:?}", event),
            Err(_) => break,
        }
    }
    handle.ended().await;

    info!(
        "simulation done: {} leave call(s), previewing={}",
        engine.leave_calls().await,
        engine.is_previewing().await
    );
    Ok(())
}
