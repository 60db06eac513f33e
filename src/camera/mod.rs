pub mod synthetic;

use anyhow::{Context, Result};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::{Deserialize, Serialize};

pub use synthetic::{SyntheticCamera, SyntheticCameraProvider};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    /// JPEG quality for transmitted frames (1-100). Analysis tolerates heavy
    /// compression, so this stays low to keep frame payloads small.
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            jpeg_quality: 50,
        }
    }
}

/// One raw captured still. Transient: encoded and sent immediately, never
/// queued.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8, row-major, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

/// A live capture device. Dropping the handle releases the device.
pub trait Camera: Send {
    /// Grab the current frame. `Ok(None)` means the device has no data ready
    /// yet (still warming up); the caller skips the sample.
    fn grab_frame(&mut self) -> Result<Option<Frame>>;
}

/// Opens capture devices. Fails on permission denial or when no device is
/// present; the controller surfaces that to the user and stays idle.
pub trait CameraProvider: Send + Sync {
    fn open(&self, config: &CameraConfig) -> Result<Box<dyn Camera>>;
}

/// Encode a frame as the `data:image/jpeg;base64,` URI the analysis service
/// expects. CPU-bound; callers run it off the async executor.
pub fn encode_frame_data_uri(frame: &Frame, quality: u8) -> Result<String> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .context("frame pixel buffer does not match its dimensions")?;

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    image.write_with_encoder(encoder).context("jpeg encoding failed")?;

    let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);
    Ok(format!("data:image/jpeg;base64,{encoded}"))
}
