//! The acquire -> encode -> transmit -> release loop behind `GET /stream`.

use std::fmt;
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::camera::{CameraSource, Frame};
use crate::config::StreamConfig;
use crate::encoder::FrameEncoder;
use crate::error::StreamError;
use crate::mjpeg;

/// Response side of one HTTP connection.
pub trait StreamTransport {
    type Error: fmt::Display;

    /// Sets the response headers. Called once, before the first chunk.
    fn set_headers(&mut self, headers: &[(&str, &str)]) -> Result<(), Self::Error>;

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), Self::Error>;
}

impl<T: StreamTransport> StreamTransport for &mut T {
    type Error = T::Error;

    fn set_headers(&mut self, headers: &[(&str, &str)]) -> Result<(), Self::Error> {
        (**self).set_headers(headers)
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), Self::Error> {
        (**self).send_chunk(chunk)
    }
}

pub trait Clock {
    /// Time since an arbitrary fixed origin. Never goes backwards.
    fn now(&self) -> Duration;
}

pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// JPEG bytes for one iteration.
///
/// Either the camera's own buffer (frame was already JPEG) or a buffer the
/// encoder allocated. Dropping it performs the matching release.
pub enum Payload<F, B> {
    Borrowed(F),
    Encoded(B),
}

impl<F: Frame, B: AsRef<[u8]>> AsRef<[u8]> for Payload<F, B> {
    fn as_ref(&self) -> &[u8] {
        match self {
            Payload::Borrowed(frame) => frame.data(),
            Payload::Encoded(buf) => buf.as_ref(),
        }
    }
}

/// Observability record for one transmitted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub bytes: usize,
    /// `None` for the first frame of a session.
    pub elapsed: Option<Duration>,
    /// `None` when the interval is zero or unknown.
    pub fps: Option<f64>,
}

impl fmt::Display for FrameTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MJPG: {}B ", self.bytes)?;
        match self.elapsed {
            Some(elapsed) => write!(f, "{}ms ", elapsed.as_millis())?,
            None => write!(f, "-ms ")?,
        }
        match self.fps {
            Some(fps) => write!(f, "({:.1}fps)", fps),
            None => write!(f, "(?fps)"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub frames: u64,
    pub bytes: u64,
}

pub fn frames_per_second(elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        Some(1.0 / secs)
    } else {
        None
    }
}

/// Serves one client an unbounded MJPEG stream.
pub struct StreamSession<C, E, T, K = MonotonicClock> {
    camera: C,
    encoder: E,
    transport: T,
    clock: K,
    config: StreamConfig,
    last_frame: Option<Duration>,
    stats: SessionStats,
}

impl<C, E, T> StreamSession<C, E, T, MonotonicClock>
where
    C: CameraSource,
    E: FrameEncoder,
    T: StreamTransport,
{
    pub fn new(camera: C, encoder: E, transport: T, config: StreamConfig) -> Self {
        Self {
            camera,
            encoder,
            transport,
            clock: MonotonicClock::new(),
            config,
            last_frame: None,
            stats: SessionStats::default(),
        }
    }
}

impl<C, E, T, K> StreamSession<C, E, T, K>
where
    C: CameraSource,
    E: FrameEncoder,
    T: StreamTransport,
    K: Clock,
{
    pub fn with_clock<K2: Clock>(self, clock: K2) -> StreamSession<C, E, T, K2> {
        StreamSession {
            camera: self.camera,
            encoder: self.encoder,
            transport: self.transport,
            clock,
            config: self.config,
            last_frame: None,
            stats: self.stats,
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Sets the multipart response headers.
    pub fn start(&mut self) -> Result<(), StreamError> {
        let framerate = self.config.framerate_hint.to_string();
        let headers = [
            ("Content-Type", mjpeg::STREAM_CONTENT_TYPE),
            ("Access-Control-Allow-Origin", "*"),
            ("X-Framerate", framerate.as_str()),
        ];
        self.transport
            .set_headers(&headers)
            .map_err(|e| StreamError::HeaderSetup(e.to_string()))
    }

    /// Starts the response and streams until something fails.
    ///
    /// Only ever returns an error; a healthy stream runs for as long as the
    /// client stays connected.
    pub fn run(&mut self) -> StreamError {
        if let Err(err) = self.start() {
            return err;
        }

        loop {
            if let Err(err) = self.stream_frame() {
                match err {
                    StreamError::Transport(_) => info!(
                        "Client disconnected after {} frames ({} bytes)",
                        self.stats.frames, self.stats.bytes
                    ),
                    _ => warn!(
                        "Stream stopped after {} frames: {}",
                        self.stats.frames, err
                    ),
                }
                return err;
            }
        }
    }

    /// One iteration of the loop.
    ///
    /// Whatever buffer the iteration holds is released before this returns,
    /// on the error paths too.
    pub fn stream_frame(&mut self) -> Result<FrameTiming, StreamError> {
        let frame = self.camera.acquire_frame().ok_or(StreamError::Capture)?;
        let payload = self.prepare(frame)?;

        let bytes = payload.as_ref().len();
        let sent = self.transmit(payload.as_ref());
        drop(payload);
        sent?;

        let timing = self.tick(bytes);
        info!("{}", timing);
        Ok(timing)
    }

    fn prepare(&mut self, frame: C::Frame) -> Result<Payload<C::Frame, E::Output>, StreamError> {
        if frame.format().is_jpeg() {
            return Ok(Payload::Borrowed(frame));
        }

        let encoded = self.encoder.encode_jpeg(&frame, self.config.jpeg_quality);
        self.camera.release_frame(frame);
        encoded
            .map(Payload::Encoded)
            .map_err(|e| StreamError::Encode(e.to_string()))
    }

    fn transmit(&mut self, jpeg: &[u8]) -> Result<(), StreamError> {
        let header = mjpeg::part_header(jpeg.len());
        for chunk in [mjpeg::STREAM_BOUNDARY.as_bytes(), header.as_bytes(), jpeg] {
            self.transport
                .send_chunk(chunk)
                .map_err(|e| StreamError::Transport(e.to_string()))?;
        }
        Ok(())
    }

    fn tick(&mut self, bytes: usize) -> FrameTiming {
        let now = self.clock.now();
        let elapsed = self.last_frame.map(|last| now.saturating_sub(last));
        self.last_frame = Some(now);

        self.stats.frames += 1;
        self.stats.bytes += bytes as u64;

        FrameTiming {
            bytes,
            elapsed,
            fps: elapsed.and_then(frames_per_second),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_from_interval() {
        assert_eq!(frames_per_second(Duration::from_millis(50)), Some(20.0));
        assert_eq!(frames_per_second(Duration::from_secs(2)), Some(0.5));
    }

    #[test]
    fn zero_interval_has_no_fps() {
        assert_eq!(frames_per_second(Duration::ZERO), None);
    }

    #[test]
    fn timing_record_format() {
        let timing = FrameTiming {
            bytes: 1234,
            elapsed: Some(Duration::from_millis(40)),
            fps: Some(25.0),
        };
        assert_eq!(timing.to_string(), "MJPG: 1234B 40ms (25.0fps)");

        let first = FrameTiming {
            bytes: 99,
            elapsed: None,
            fps: None,
        };
        assert_eq!(first.to_string(), "MJPG: 99B -ms (?fps)");
    }

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
