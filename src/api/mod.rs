use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::exercise::ExerciseKind;
use crate::workout::WorkoutRecord;

/// One entry from the exercise catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct ExerciseInfo {
    pub name: String,
    pub supported: bool,
    pub description: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExercisesResponse {
    #[serde(default)]
    exercises: Vec<ExerciseInfo>,
}

/// Availability flags for the remote detection stack.
#[derive(Debug, Clone, Deserialize)]
pub struct PoseSystemStats {
    pub system_status: String,
    pub opencv_installed: bool,
    pub mediapipe_installed: bool,
    #[serde(default)]
    pub opencv_version: String,
    #[serde(default)]
    pub mediapipe_version: String,
    #[serde(default)]
    pub supported_exercises: Vec<String>,
    #[serde(default)]
    pub features: PoseFeatures,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoseFeatures {
    pub rep_counting: bool,
    pub form_scoring: bool,
    pub real_time_feedback: bool,
    pub angle_calculation: bool,
    pub body_alignment_check: bool,
}

/// One-shot form guidance from `POST /api/pose/analyze`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisResult {
    pub exercise: String,
    pub rep_count: u32,
    pub form_score: u32,
    #[serde(default)]
    pub feedback: Vec<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest {
    exercise_type: ExerciseKind,
}

/// REST client for the fitness backend. The backend owns all persisted data;
/// this client keeps nothing.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn exercises(&self) -> Result<Vec<ExerciseInfo>> {
        let url = format!("{}/api/pose/exercises", self.base_url);
        let response: ExercisesResponse = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("GET {url} failed"))?
            .json()
            .await
            .context("malformed exercise catalog")?;
        Ok(response.exercises)
    }

    pub async fn stats(&self) -> Result<PoseSystemStats> {
        let url = format!("{}/api/pose/stats", self.base_url);
        self.http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("GET {url} failed"))?
            .json()
            .await
            .context("malformed pose stats")
    }

    /// Static form guidance for an exercise (the backend's demo-mode
    /// analysis, no camera involved).
    pub async fn analyze(&self, exercise: ExerciseKind) -> Result<AnalysisResult> {
        let url = format!("{}/api/pose/analyze", self.base_url);
        self.http
            .post(&url)
            .json(&AnalyzeRequest {
                exercise_type: exercise,
            })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("POST {url} failed"))?
            .json()
            .await
            .context("malformed analysis result")
    }

    /// Submit an end-of-session workout record. Callers treat failure as
    /// non-fatal; the record is discarded either way.
    pub async fn log_workout(&self, record: &WorkoutRecord) -> Result<()> {
        let url = format!("{}/api/analytics/log-workout", self.base_url);
        self.http
            .post(&url)
            .json(record)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("POST {url} failed"))?;
        info!(
            "logged workout: {} x{} reps, {} kcal",
            record.exercise_type, record.reps, record.calories_burned
        );
        Ok(())
    }
}
