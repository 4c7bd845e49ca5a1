//! MJPEG camera streaming for ESP32-class boards.
//!
//! The streaming loop in [`session`] is written against three small traits
//! (camera, encoder, transport) so the same code drives the real camera on
//! the device and a synthetic one on the host.

pub mod camera;
pub mod config;
pub mod encoder;
pub mod error;
pub mod mjpeg;
pub mod server;
pub mod session;

#[cfg(target_os = "espidf")]
pub mod esp;

#[cfg(not(target_os = "espidf"))]
pub mod host;

pub use camera::{CameraSource, Frame, OwnedFrame, PixelFormat, SharedCamera};
pub use encoder::FrameEncoder;
pub use error::StreamError;
pub use session::{FrameTiming, StreamSession, StreamTransport};
