//! End-to-end lifecycle tests for the live session controller, against a
//! real local WebSocket analysis server and a capturing HTTP backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use formsight::camera::{CameraProvider, SyntheticCameraProvider};
use formsight::{
    Camera, CameraConfig, CameraState, ChannelState, Config, ExerciseKind, SessionController,
    SessionState,
};

/// Scripted analysis service: sends the given messages on connect, then
/// records everything the client sends.
struct AnalysisServer {
    url: String,
    inbound: mpsc::UnboundedReceiver<Value>,
    _handle: JoinHandle<()>,
}

async fn spawn_analysis_server(script: Vec<Value>) -> AnalysisServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut sink, mut stream) = socket.split();

        for message in script {
            sink.send(Message::Text(message.to_string())).await.unwrap();
        }

        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    let _ = tx.send(serde_json::from_str(&text).unwrap());
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    AnalysisServer {
        url: format!("ws://{addr}"),
        inbound: rx,
        _handle: handle,
    }
}

/// Minimal analytics backend: captures `log-workout` bodies for assertions.
async fn spawn_log_server() -> (String, mpsc::UnboundedReceiver<Value>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = axum::Router::new().route(
        "/api/analytics/log-workout",
        axum::routing::post(move |axum::Json(body): axum::Json<Value>| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(body);
                axum::Json(json!({"status": "success"}))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), rx, handle)
}

fn test_config(ws_url: String, api_base: String) -> Config {
    Config {
        api_base,
        ws_url,
        sample_interval_ms: 50,
        camera: CameraConfig {
            width: 32,
            height: 24,
            jpeg_quality: 50,
        },
    }
}

fn controller_with(config: Config) -> SessionController {
    SessionController::new(config, Arc::new(SyntheticCameraProvider::default()))
}

async fn wait_for(
    updates: &mut watch::Receiver<SessionState>,
    what: &str,
    predicate: impl Fn(&SessionState) -> bool,
) {
    let waited = timeout(Duration::from_secs(3), async {
        loop {
            if predicate(&updates.borrow_and_update()) {
                return;
            }
            updates.changed().await.expect("state watch closed");
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

fn analysis(rep_count: u32, form_score: u32, feedback: &[&str]) -> Value {
    json!({
        "type": "analysis",
        "rep_count": rep_count,
        "form_score": form_score,
        "feedback": feedback,
    })
}

#[tokio::test]
async fn full_session_submits_derived_record() -> Result<()> {
    let server = spawn_analysis_server(vec![
        analysis(1, 40, &["go lower"]),
        analysis(2, 55, &[]),
        analysis(5, 70, &["nice depth"]),
    ])
    .await;
    let (api_base, mut logged, _backend) = spawn_log_server().await;

    let controller = controller_with(test_config(server.url.clone(), api_base));
    let mut updates = controller.subscribe();

    let snapshot = controller.start().await?;
    assert_eq!(snapshot.channel, ChannelState::Open);
    assert_eq!(snapshot.camera, CameraState::Active);
    assert!(snapshot.session_id.is_some());

    // Last-value-wins: the final analysis message determines the counters.
    wait_for(&mut updates, "last analysis message", |state| {
        state.rep_count == 5 && state.form_score == 70
    })
    .await;

    let record = controller.stop().await?.expect("record for 5 reps");
    assert_eq!(record.exercise_type, ExerciseKind::Squat);
    assert_eq!(record.duration_minutes, 10);
    assert_eq!(record.calories_burned, 40);
    assert_eq!(record.intensity, 7);
    assert_eq!(record.reps, 5);
    assert_eq!(record.sets, 1);

    let submitted = timeout(Duration::from_secs(3), logged.recv())
        .await
        .expect("submission deadline")
        .expect("one submitted record");
    assert_eq!(submitted["exercise_type"], "squat");
    assert_eq!(submitted["duration_minutes"], 10);
    assert_eq!(submitted["calories_burned"], 40);
    assert_eq!(submitted["intensity"], 7);
    assert_eq!(submitted["reps"], 5);
    assert_eq!(submitted["sets"], 1);

    // Everything released and reset after stop.
    let after = controller.snapshot().await;
    assert_eq!(after.camera, CameraState::Inactive);
    assert_eq!(after.channel, ChannelState::Closed);
    assert_eq!(after.rep_count, 0);
    assert!(after.session_id.is_none());
    Ok(())
}

#[tokio::test]
async fn frames_and_control_messages_reach_the_service() -> Result<()> {
    let mut server = spawn_analysis_server(Vec::new()).await;
    let (api_base, _logged, _backend) = spawn_log_server().await;
    let controller = controller_with(test_config(server.url.clone(), api_base));

    controller.start().await?;

    let frame = timeout(Duration::from_secs(3), server.inbound.recv())
        .await
        .expect("frame deadline")
        .expect("one frame message");
    assert_eq!(frame["type"], "frame");
    assert_eq!(frame["exercise"], "squat");
    let image = frame["image"].as_str().unwrap();
    assert!(image.starts_with("data:image/jpeg;base64,"));

    controller.change_exercise(ExerciseKind::Lunge).await;
    let notified = timeout(Duration::from_secs(3), async {
        loop {
            let message = server.inbound.recv().await.expect("service inbound");
            if message["type"] == "change_exercise" {
                return message;
            }
        }
    })
    .await
    .expect("change_exercise deadline");
    assert_eq!(notified["exercise"], "lunge");

    controller.reset_counter().await;
    let reset = timeout(Duration::from_secs(3), async {
        loop {
            let message = server.inbound.recv().await.expect("service inbound");
            if message["type"] == "reset" {
                return message;
            }
        }
    })
    .await
    .expect("reset deadline");
    assert_eq!(reset, json!({"type": "reset"}));

    controller.stop().await?;
    Ok(())
}

#[tokio::test]
async fn stop_is_idempotent_and_submits_once() -> Result<()> {
    let server = spawn_analysis_server(vec![analysis(3, 60, &[])]).await;
    let (api_base, mut logged, _backend) = spawn_log_server().await;
    let controller = controller_with(test_config(server.url.clone(), api_base));
    let mut updates = controller.subscribe();

    controller.start().await?;
    wait_for(&mut updates, "analysis message", |state| state.rep_count == 3).await;

    assert!(controller.stop().await?.is_some());
    assert!(controller.stop().await?.is_none());

    timeout(Duration::from_secs(3), logged.recv())
        .await
        .expect("submission deadline")
        .expect("first record");
    assert!(
        logged.try_recv().is_err(),
        "second stop must not submit again"
    );
    Ok(())
}

#[tokio::test]
async fn stop_on_never_started_controller_is_a_no_op() -> Result<()> {
    let controller = controller_with(test_config(
        "ws://127.0.0.1:1/ws/pose".into(),
        "http://127.0.0.1:1".into(),
    ));
    assert!(controller.stop().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn zero_reps_submit_nothing() -> Result<()> {
    let server = spawn_analysis_server(Vec::new()).await;
    let (api_base, mut logged, _backend) = spawn_log_server().await;
    let controller = controller_with(test_config(server.url.clone(), api_base));

    controller.start().await?;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(controller.stop().await?.is_none());
    assert!(logged.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn channel_failure_keeps_camera_until_explicit_stop() -> Result<()> {
    // Nothing is listening on the channel port; connect fails immediately.
    let (api_base, _logged, _backend) = spawn_log_server().await;
    let controller = controller_with(test_config("ws://127.0.0.1:1/ws/pose".into(), api_base));

    let snapshot = controller.start().await?;
    assert_eq!(snapshot.channel, ChannelState::Erroring);
    assert_eq!(snapshot.camera, CameraState::Active);
    assert!(snapshot.last_error.is_some());

    // Local reset still works with the channel down.
    let after_reset = controller.reset_counter().await;
    assert_eq!(after_reset.rep_count, 0);
    assert_eq!(after_reset.form_score, 0);

    // stop still releases everything from the Erroring state.
    assert!(controller.stop().await?.is_none());
    let after = controller.snapshot().await;
    assert_eq!(after.camera, CameraState::Inactive);
    assert_eq!(after.channel, ChannelState::Closed);
    Ok(())
}

struct DeniedCameraProvider;

impl CameraProvider for DeniedCameraProvider {
    fn open(&self, _config: &CameraConfig) -> Result<Box<dyn Camera>> {
        anyhow::bail!("permission denied")
    }
}

#[tokio::test]
async fn camera_denial_leaves_session_idle() -> Result<()> {
    let server = spawn_analysis_server(Vec::new()).await;
    let (api_base, _logged, _backend) = spawn_log_server().await;
    let controller = SessionController::new(
        test_config(server.url.clone(), api_base),
        Arc::new(DeniedCameraProvider),
    );

    let result = controller.start().await;
    assert!(result.is_err());

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.camera, CameraState::Inactive);
    assert_eq!(snapshot.channel, ChannelState::Closed);
    assert!(snapshot.last_error.as_deref().unwrap().contains("camera unavailable"));

    // No session was created, so stop has nothing to do.
    assert!(controller.stop().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn submission_failure_never_blocks_teardown() -> Result<()> {
    let server = spawn_analysis_server(vec![analysis(4, 80, &[])]).await;
    // Analytics backend is down.
    let controller = controller_with(test_config(
        server.url.clone(),
        "http://127.0.0.1:1".into(),
    ));
    let mut updates = controller.subscribe();

    controller.start().await?;
    wait_for(&mut updates, "analysis message", |state| state.rep_count == 4).await;

    let record = controller.stop().await?.expect("record derived regardless");
    assert_eq!(record.reps, 4);

    let after = controller.snapshot().await;
    assert_eq!(after.camera, CameraState::Inactive);
    assert_eq!(after.channel, ChannelState::Closed);
    Ok(())
}

#[tokio::test]
async fn service_error_halts_sampling_but_not_the_camera() -> Result<()> {
    let mut server = spawn_analysis_server(vec![json!({"error": "model crashed"})]).await;
    let (api_base, _logged, _backend) = spawn_log_server().await;
    let controller = controller_with(test_config(server.url.clone(), api_base));
    let mut updates = controller.subscribe();

    controller.start().await?;
    wait_for(&mut updates, "erroring channel", |state| {
        state.channel == ChannelState::Erroring
    })
    .await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.camera, CameraState::Active);
    assert_eq!(snapshot.last_error.as_deref(), Some("model crashed"));

    // Let in-flight frames land, then verify ticks stop producing output.
    tokio::time::sleep(Duration::from_millis(150)).await;
    while server.inbound.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        server.inbound.try_recv().is_err(),
        "no frames may be sent while the channel is erroring"
    );

    controller.stop().await?;
    Ok(())
}

#[tokio::test]
async fn double_start_is_rejected() -> Result<()> {
    let server = spawn_analysis_server(Vec::new()).await;
    let (api_base, _logged, _backend) = spawn_log_server().await;
    let controller = controller_with(test_config(server.url.clone(), api_base));

    controller.start().await?;
    assert!(controller.start().await.is_err());
    controller.stop().await?;
    Ok(())
}
