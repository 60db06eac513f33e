use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use formsight::camera::SyntheticCameraProvider;
use formsight::{Config, SessionController};

/// Demo driver: runs a live session against a running backend using the
/// synthetic camera, prints state snapshots, then stops and submits.
///
/// Usage: `formsight [config.json] [seconds]`
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "formsight.json".into());
    let seconds: u64 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 30,
    };

    let config = Config::load(&config_path)?;
    info!("formsight demo: backend {}, channel {}", config.api_base, config.ws_url);

    let controller =
        SessionController::new(config, Arc::new(SyntheticCameraProvider::default()));

    match controller.api().stats().await {
        Ok(stats) => info!(
            "backend status: {} (mediapipe: {}, opencv: {})",
            stats.system_status, stats.mediapipe_installed, stats.opencv_installed
        ),
        Err(err) => warn!("backend stats unavailable: {err:#}"),
    }

    let snapshot = controller.start().await?;
    info!("session started (channel {:?})", snapshot.channel);

    let mut updates = controller.subscribe();
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                info!(
                    "reps={} form={} feedback={:?} channel={:?}",
                    state.rep_count, state.form_score, state.feedback, state.channel
                );
            }
        }
    }

    match controller.stop().await? {
        Some(record) => info!(
            "submitted workout: {} for {} min, {} kcal, intensity {}",
            record.exercise_type, record.duration_minutes, record.calories_burned, record.intensity
        ),
        None => info!("no reps counted; nothing submitted"),
    }

    Ok(())
}
