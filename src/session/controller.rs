use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::camera::CameraProvider;
use crate::channel::{
    AnalysisChannel, ChannelEvent, ClientMessage, ServerEvent, ServerMessage,
};
use crate::config::Config;
use crate::exercise::ExerciseKind;
use crate::session::sampler::{sampling_loop, SharedCamera};
use crate::session::state::{ChannelState, SessionState, SharedState};
use crate::workout::WorkoutRecord;

/// Runtime half of an active session: everything `stop` must tear down.
///
/// The camera and the channel are scarce resources; funneling all exits
/// through one ordered teardown keeps a tick from ever firing against a
/// released device or a message from landing after close.
struct LiveLink {
    cancel_token: CancellationToken,
    sampler: Option<JoinHandle<()>>,
    inbound: Option<JoinHandle<()>>,
    channel: Option<AnalysisChannel>,
    camera: SharedCamera,
}

/// Owns the lifecycle of one live analysis session: camera acquisition, the
/// analysis channel, the periodic frame sampler, and the derived session
/// state. All mutation goes through these operations; observers read
/// snapshots from [`SessionController::subscribe`].
#[derive(Clone)]
pub struct SessionController {
    config: Config,
    api: ApiClient,
    camera_provider: Arc<dyn CameraProvider>,
    state: Arc<SharedState>,
    link: Arc<Mutex<Option<LiveLink>>>,
}

impl SessionController {
    pub fn new(config: Config, camera_provider: Arc<dyn CameraProvider>) -> Self {
        let api = ApiClient::new(config.api_base.clone());
        Self {
            config,
            api,
            camera_provider,
            state: SharedState::new(),
            link: Arc::new(Mutex::new(None)),
        }
    }

    /// REST client for the collaborator endpoints, sharing the controller's
    /// configuration.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await
    }

    /// Start a session: acquire the camera, connect the analysis channel,
    /// begin sampling.
    ///
    /// Camera failure (permission denied, no device) is returned to the
    /// caller and leaves everything Idle. Channel failure is surfaced on the
    /// snapshot instead: the session stays up in the Erroring state with the
    /// live camera running, and only an explicit `stop` tears it down.
    pub async fn start(&self) -> Result<SessionState> {
        let mut link_guard = self.link.lock().await;
        if link_guard.is_some() {
            bail!("session already active");
        }

        let camera = match self.camera_provider.open(&self.config.camera) {
            Ok(camera) => camera,
            Err(err) => {
                self.state
                    .update(|state| {
                        state.last_error = Some(format!("camera unavailable: {err:#}"));
                    })
                    .await;
                return Err(err.context("camera unavailable"));
            }
        };

        let session_id = Uuid::new_v4().to_string();
        let exercise = self.state.read().await.exercise;
        info!("starting live session {session_id} ({exercise})");
        self.state
            .update(|state| state.begin(session_id.clone(), exercise, Utc::now()))
            .await;

        let camera: SharedCamera = Arc::new(Mutex::new(Some(camera)));
        let cancel_token = CancellationToken::new();

        let (event_tx, event_rx) = mpsc::channel(16);
        let channel = match AnalysisChannel::connect(&self.config.ws_url, event_tx).await {
            Ok(channel) => channel,
            Err(err) => {
                warn!("session {session_id}: {err:#}");
                let snapshot = self
                    .state
                    .update(|state| state.mark_channel_error(format!("{err:#}")))
                    .await;
                // Camera keeps running so the user still sees the live feed.
                *link_guard = Some(LiveLink {
                    cancel_token,
                    sampler: None,
                    inbound: None,
                    channel: None,
                    camera,
                });
                return Ok(snapshot);
            }
        };

        let inbound = tokio::spawn(inbound_loop(Arc::clone(&self.state), event_rx));
        let sampler = tokio::spawn(sampling_loop(
            Arc::clone(&self.state),
            Arc::clone(&camera),
            channel.sender(),
            self.config.sample_interval(),
            self.config.camera.jpeg_quality,
            cancel_token.clone(),
        ));

        let snapshot = self
            .state
            .update(|state| state.channel = ChannelState::Open)
            .await;
        *link_guard = Some(LiveLink {
            cancel_token,
            sampler: Some(sampler),
            inbound: Some(inbound),
            channel: Some(channel),
            camera,
        });
        Ok(snapshot)
    }

    /// Update the tracked exercise; the remote side is notified when the
    /// channel is up so subsequent analysis uses the new kind.
    pub async fn change_exercise(&self, exercise: ExerciseKind) -> SessionState {
        let snapshot = self
            .state
            .update(|state| state.exercise = exercise)
            .await;

        if snapshot.channel == ChannelState::Open {
            let link_guard = self.link.lock().await;
            if let Some(channel) = link_guard.as_ref().and_then(|link| link.channel.as_ref()) {
                if let Err(err) = channel.send(ClientMessage::ChangeExercise { exercise }).await {
                    warn!("could not notify exercise change: {err:#}");
                }
            }
        }
        snapshot
    }

    /// Zero the local counters; the remote counter is reset too when the
    /// channel is up.
    pub async fn reset_counter(&self) -> SessionState {
        let snapshot = self.state.update(SessionState::reset_counts).await;

        if snapshot.channel == ChannelState::Open {
            let link_guard = self.link.lock().await;
            if let Some(channel) = link_guard.as_ref().and_then(|link| link.channel.as_ref()) {
                if let Err(err) = channel.send(ClientMessage::Reset).await {
                    warn!("could not notify counter reset: {err:#}");
                }
            }
        }
        snapshot
    }

    /// End the session: submit the workout record if any reps were counted,
    /// then tear everything down in order (sampler, channel, camera, state).
    ///
    /// Idempotent on an Idle session: returns `Ok(None)` and submits
    /// nothing. Submission failure is logged and never blocks teardown.
    pub async fn stop(&self) -> Result<Option<WorkoutRecord>> {
        let mut link_guard = self.link.lock().await;
        let Some(link) = link_guard.take() else {
            return Ok(None);
        };

        let snapshot = self.state.read().await;
        let record = if snapshot.rep_count > 0 {
            let record = WorkoutRecord::derive(
                snapshot.exercise,
                snapshot.rep_count,
                snapshot.form_score,
            );
            if let Err(err) = self.api.log_workout(&record).await {
                error!("failed to log workout: {err:#}");
            }
            Some(record)
        } else {
            None
        };

        // Ordered teardown: the sampler must be gone before the channel
        // closes, and the channel before the camera is released.
        link.cancel_token.cancel();
        if let Some(sampler) = link.sampler {
            if let Err(err) = sampler.await {
                warn!("frame sampler task failed to join: {err}");
            }
        }
        if let Some(inbound) = link.inbound {
            inbound.abort();
            let _ = inbound.await;
        }
        if let Some(channel) = link.channel {
            channel.close().await;
        }
        link.camera.lock().await.take();

        let session_id = snapshot.session_id.as_deref().unwrap_or("<unknown>");
        info!("session {session_id} stopped");
        self.state.update(SessionState::clear).await;
        Ok(record)
    }
}

/// Pump inbound channel events into the session state.
async fn inbound_loop(shared: Arc<SharedState>, mut events: mpsc::Receiver<ChannelEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Message(ServerMessage::Event(ServerEvent::Analysis(payload))) => {
                shared
                    .update(|state| state.apply_analysis(&payload))
                    .await;
            }
            ChannelEvent::Message(ServerMessage::Event(ServerEvent::ExerciseChanged {
                exercise,
            })) => {
                info!("analysis service tracking exercise: {exercise}");
            }
            ChannelEvent::Message(ServerMessage::Event(ServerEvent::ResetComplete)) => {
                info!("analysis service reset its rep counter");
            }
            ChannelEvent::Message(ServerMessage::Error(err)) => {
                error!("analysis service error: {}", err.error);
                shared
                    .update(|state| state.mark_channel_error(err.error.clone()))
                    .await;
            }
            ChannelEvent::Closed => {
                shared
                    .update(|state| {
                        if state.channel == ChannelState::Open {
                            state.mark_channel_error("analysis channel closed");
                        }
                    })
                    .await;
                break;
            }
        }
    }
}
