//! Host-side simulator: the streaming core over a synthetic camera and a
//! plain `std::net` HTTP server.

pub mod camera;
pub mod encoder;
pub mod server;

pub use camera::SyntheticCamera;
pub use encoder::{EncodeError, ImageJpegEncoder};
pub use server::HttpServer;

use anyhow::Context;

use crate::config::{CameraConfig, CaptureFormat};

/// Simulator settings, read from `CAM_STREAM_ADDR`, `CAM_STREAM_PRESET` and
/// `CAM_STREAM_FORMAT`. The format overrides the preset's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub bind: String,
    pub camera: CameraConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            camera: CameraConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if let Some(bind) = lookup("CAM_STREAM_ADDR") {
            config.bind = bind;
        }
        if let Some(preset) = lookup("CAM_STREAM_PRESET") {
            config.camera = CameraConfig::from_preset(&preset).context("invalid CAM_STREAM_PRESET")?;
        }
        if let Some(format) = lookup("CAM_STREAM_FORMAT") {
            config.camera.format = parse_format(&format)
                .with_context(|| format!("invalid CAM_STREAM_FORMAT {:?}", format))?;
        }
        Ok(config)
    }
}

fn parse_format(value: &str) -> anyhow::Result<CaptureFormat> {
    match value.to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => Ok(CaptureFormat::Jpeg { quality: 12 }),
        "rgb888" => Ok(CaptureFormat::Rgb888),
        "rgb565" => Ok(CaptureFormat::Rgb565),
        "grayscale" | "gray" => Ok(CaptureFormat::Grayscale),
        other => anyhow::bail!("expected jpeg, rgb888, rgb565 or grayscale, got {}", other),
    }
}
