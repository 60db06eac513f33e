use anyhow::Result;
use rand::Rng;

use super::{Camera, CameraConfig, CameraProvider, Frame};

/// Pattern-generating stand-in for a real capture device.
///
/// Produces a slowly shifting gradient with per-frame noise so consecutive
/// frames differ, which is enough to exercise the capture/encode/send path
/// in the demo binary and in tests without camera hardware.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    tick: u32,
    /// Frames to report as not-ready before the first real frame, imitating
    /// device warm-up.
    warmup_remaining: u32,
}

impl SyntheticCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self::with_warmup(config, 0)
    }

    pub fn with_warmup(config: &CameraConfig, warmup_frames: u32) -> Self {
        Self {
            width: config.width,
            height: config.height,
            tick: 0,
            warmup_remaining: warmup_frames,
        }
    }
}

impl Camera for SyntheticCamera {
    fn grab_frame(&mut self) -> Result<Option<Frame>> {
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return Ok(None);
        }

        let mut rng = rand::thread_rng();
        let phase = self.tick.wrapping_mul(7) as u8;
        self.tick = self.tick.wrapping_add(1);

        let mut pixels = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let noise: u8 = rng.gen_range(0..16);
                pixels.push((x as u8).wrapping_add(phase));
                pixels.push((y as u8).wrapping_add(phase));
                pixels.push(noise.wrapping_add(phase));
            }
        }

        Ok(Some(Frame {
            width: self.width,
            height: self.height,
            pixels,
        }))
    }
}

#[derive(Debug, Default)]
pub struct SyntheticCameraProvider {
    pub warmup_frames: u32,
}

impl CameraProvider for SyntheticCameraProvider {
    fn open(&self, config: &CameraConfig) -> Result<Box<dyn Camera>> {
        Ok(Box::new(SyntheticCamera::with_warmup(
            config,
            self.warmup_frames,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_frames_after_warmup() {
        let config = CameraConfig {
            width: 16,
            height: 12,
            jpeg_quality: 50,
        };
        let mut camera = SyntheticCamera::with_warmup(&config, 2);

        assert!(camera.grab_frame().unwrap().is_none());
        assert!(camera.grab_frame().unwrap().is_none());

        let frame = camera.grab_frame().unwrap().expect("frame after warmup");
        assert_eq!(frame.width, 16);
        assert_eq!(frame.height, 12);
        assert_eq!(frame.pixels.len(), 16 * 12 * 3);
    }
}
