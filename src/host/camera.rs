use std::thread;
use std::time::Duration;

use log::warn;

use crate::camera::{CameraSource, OwnedFrame, PixelFormat};
use crate::config::{CameraConfig, CaptureFormat};
use crate::encoder::FrameEncoder;
use crate::host::encoder::ImageJpegEncoder;

/// Stand-in for the sensor: renders a scrolling test pattern.
///
/// In JPEG mode the pattern is compressed here, the way the sensor would,
/// so the session streams it without touching its own encoder.
pub struct SyntheticCamera {
    config: CameraConfig,
    frame_interval: Duration,
    sequence: u32,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_interval: Duration::from_millis(40),
            sequence: 0,
        }
    }

    /// Delay before each frame is delivered. Zero disables pacing.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    fn render_rgb888(&self, width: usize, height: usize) -> Vec<u8> {
        let shift = self.sequence as usize * 4;
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.push(((x + shift) % 256) as u8);
                data.push(((y + shift) % 256) as u8);
                data.push(((x + y) % 256) as u8);
            }
        }
        data
    }

    fn render(&self) -> Option<OwnedFrame> {
        let (width, height) = self.config.resolution.dimensions();
        let rgb = self.render_rgb888(width, height);

        let frame = match self.config.format {
            CaptureFormat::Rgb888 => OwnedFrame::new(rgb, width, height, PixelFormat::Rgb888),
            CaptureFormat::Grayscale => {
                let gray = rgb
                    .chunks_exact(3)
                    .map(|px| ((px[0] as u16 + px[1] as u16 + px[2] as u16) / 3) as u8)
                    .collect();
                OwnedFrame::new(gray, width, height, PixelFormat::Grayscale)
            }
            CaptureFormat::Rgb565 => {
                let packed = rgb
                    .chunks_exact(3)
                    .flat_map(|px| {
                        let v = ((px[0] as u16 >> 3) << 11)
                            | ((px[1] as u16 >> 2) << 5)
                            | (px[2] as u16 >> 3);
                        v.to_be_bytes()
                    })
                    .collect();
                OwnedFrame::new(packed, width, height, PixelFormat::Rgb565)
            }
            CaptureFormat::Jpeg { .. } => {
                let raw = OwnedFrame::new(rgb, width, height, PixelFormat::Rgb888);
                let quality = sensor_to_encoder_quality(self.config.format.sensor_quality()?);
                match ImageJpegEncoder.encode_jpeg(&raw, quality) {
                    Ok(jpeg) => OwnedFrame::new(jpeg, width, height, PixelFormat::Jpeg),
                    Err(err) => {
                        warn!("Synthetic sensor failed to compress frame: {}", err);
                        return None;
                    }
                }
            }
        };
        Some(frame)
    }
}

/// Sensor quality runs 4 (best) to 63, the encoder 1 to 100 (best).
fn sensor_to_encoder_quality(sensor: u8) -> u8 {
    100u8.saturating_sub(sensor).max(1)
}

impl CameraSource for SyntheticCamera {
    type Frame = OwnedFrame;

    fn acquire_frame(&mut self) -> Option<OwnedFrame> {
        if !self.frame_interval.is_zero() {
            thread::sleep(self.frame_interval);
        }
        let frame = self.render();
        self.sequence = self.sequence.wrapping_add(1);
        frame
    }
}
