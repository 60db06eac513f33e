use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};

use crate::channel::AnalysisPayload;
use crate::exercise::ExerciseKind;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ChannelState {
    #[default]
    Closed,
    Connecting,
    Open,
    /// The channel failed or closed underneath us. Sampling halts; the
    /// camera keeps running until the user stops the session.
    Erroring,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CameraState {
    #[default]
    Inactive,
    Active,
}

/// Ephemeral, process-local session state. Exists only while the camera is
/// active; mutated exclusively through the controller's operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: Option<String>,
    pub exercise: ExerciseKind,
    pub rep_count: u32,
    /// 0-100, last-value-wins from analysis messages.
    pub form_score: u32,
    /// Replaced wholesale per analysis message, never accumulated.
    pub feedback: Vec<String>,
    pub channel: ChannelState,
    pub camera: CameraState,
    pub started_at: Option<DateTime<Utc>>,
    /// Most recent surfaced error (camera denial, channel failure). Cleared
    /// on the next start.
    pub last_error: Option<String>,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        self.camera == CameraState::Active
    }

    /// Initialize for a new session: camera up, channel attempt underway,
    /// counters zeroed.
    pub fn begin(&mut self, session_id: String, exercise: ExerciseKind, now: DateTime<Utc>) {
        *self = Self {
            session_id: Some(session_id),
            exercise,
            rep_count: 0,
            form_score: 0,
            feedback: Vec::new(),
            channel: ChannelState::Connecting,
            camera: CameraState::Active,
            started_at: Some(now),
            last_error: None,
        };
    }

    /// Apply one analysis message: counters and feedback are replaced with
    /// the payload's values, whatever arrived before.
    pub fn apply_analysis(&mut self, payload: &AnalysisPayload) {
        self.rep_count = payload.rep_count;
        self.form_score = payload.form_score;
        self.feedback = payload.feedback.clone();
    }

    /// Local part of `reset_counter`: zero the counters regardless of
    /// channel state.
    pub fn reset_counts(&mut self) {
        self.rep_count = 0;
        self.form_score = 0;
    }

    pub fn mark_channel_error(&mut self, error: impl Into<String>) {
        self.channel = ChannelState::Erroring;
        self.last_error = Some(error.into());
    }

    /// Back to Idle defaults. The selected exercise survives so the next
    /// session starts where the user left off.
    pub fn clear(&mut self) {
        *self = Self {
            exercise: self.exercise,
            ..Self::default()
        };
    }
}

/// Session state behind a lock, with every mutation published on a watch
/// channel so an embedding UI can observe transitions without reaching into
/// controller internals.
pub(crate) struct SharedState {
    inner: Mutex<SessionState>,
    watch_tx: watch::Sender<SessionState>,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        let initial = SessionState::default();
        let (watch_tx, _watch_rx) = watch::channel(initial.clone());
        Arc::new(Self {
            inner: Mutex::new(initial),
            watch_tx,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.watch_tx.subscribe()
    }

    pub async fn read(&self) -> SessionState {
        self.inner.lock().await.clone()
    }

    /// Mutate under the lock, publish the result, and return a snapshot.
    pub async fn update<F>(&self, mutate: F) -> SessionState
    where
        F: FnOnce(&mut SessionState),
    {
        let mut guard = self.inner.lock().await;
        mutate(&mut guard);
        let snapshot = guard.clone();
        drop(guard);
        let _ = self.watch_tx.send(snapshot.clone());
        snapshot
    }
}
