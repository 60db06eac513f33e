use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::camera::{encode_frame_data_uri, Camera};
use crate::channel::ClientMessage;
use crate::session::state::{ChannelState, SharedState};

/// Camera handle shared between the sampler and the controller. The
/// controller takes it back out at teardown so the device is released at a
/// deterministic point, after the channel is closed.
pub(crate) type SharedCamera = Arc<Mutex<Option<Box<dyn Camera>>>>;

/// Periodic frame sampler: on each tick, capture the current frame, encode
/// it off the async executor, and hand it to the channel writer.
///
/// Best-effort and lossy on purpose: a tick that finds the channel not Open
/// or the camera without data is skipped silently, and nothing is queued.
pub(crate) async fn sampling_loop(
    shared: Arc<SharedState>,
    camera: SharedCamera,
    outbound: mpsc::Sender<ClientMessage>,
    interval: Duration,
    jpeg_quality: u8,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sample_once(&shared, &camera, &outbound, jpeg_quality).await;
            }
            _ = cancel_token.cancelled() => {
                info!("frame sampler shutting down");
                break;
            }
        }
    }
}

async fn sample_once(
    shared: &SharedState,
    camera: &SharedCamera,
    outbound: &mpsc::Sender<ClientMessage>,
    jpeg_quality: u8,
) {
    let snapshot = shared.read().await;
    if snapshot.channel != ChannelState::Open {
        return;
    }
    let exercise = snapshot.exercise;

    let frame = {
        let mut guard = camera.lock().await;
        let Some(device) = guard.as_mut() else {
            return;
        };
        match device.grab_frame() {
            Ok(frame) => frame,
            Err(err) => {
                warn!("frame capture failed: {err:#}");
                return;
            }
        }
    };
    let Some(frame) = frame else {
        // Device has no data ready yet; skip this tick.
        return;
    };

    let encoded =
        tokio::task::spawn_blocking(move || encode_frame_data_uri(&frame, jpeg_quality)).await;
    let image = match encoded {
        Ok(Ok(image)) => image,
        Ok(Err(err)) => {
            warn!("frame encoding failed: {err:#}");
            return;
        }
        Err(err) => {
            warn!("frame encoding worker join failed: {err}");
            return;
        }
    };

    if outbound
        .send(ClientMessage::Frame { image, exercise })
        .await
        .is_err()
    {
        debug!("channel writer gone, dropping frame");
    }
}
