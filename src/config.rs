use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::camera::CameraConfig;

/// Endpoints and tuning for the live session client. Loadable from a JSON
/// file; anything missing falls back to the local-backend defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the REST backend.
    pub api_base: String,
    /// WebSocket endpoint of the analysis service.
    pub ws_url: String,
    /// Frame sampling period. 300 ms (~3 FPS) is plenty for rep counting.
    pub sample_interval_ms: u64,
    pub camera: CameraConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8001".into(),
            ws_url: "ws://127.0.0.1:8001/ws/pose".into(),
            sample_interval_ms: 300,
            camera: CameraConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        match serde_json::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(err) => {
                warn!("invalid config at {}, using defaults: {err}", path.display());
                Ok(Self::default())
            }
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}
