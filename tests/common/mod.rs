//! Recording fakes for the camera, encoder, transport and clock.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use cam_stream::camera::{CameraSource, Frame, PixelFormat};
use cam_stream::encoder::FrameEncoder;
use cam_stream::session::{Clock, StreamTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquire(usize),
    AcquireFailed,
    ReleaseFrame(usize),
    Encode(usize),
    FreeBuffer(usize),
    Chunk(usize),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn count(log: &EventLog, pred: impl Fn(&Event) -> bool) -> usize {
    log.borrow().iter().filter(|e| pred(e)).count()
}

pub fn position(log: &EventLog, event: &Event) -> Option<usize> {
    log.borrow().iter().position(|e| e == event)
}

pub struct MockFrame {
    pub id: usize,
    data: Vec<u8>,
    format: PixelFormat,
    log: EventLog,
}

impl Frame for MockFrame {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn width(&self) -> usize {
        self.data.len()
    }

    fn height(&self) -> usize {
        1
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}

impl Drop for MockFrame {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Event::ReleaseFrame(self.id));
    }
}

/// Hands out scripted frames; `None` entries and an exhausted script are
/// capture failures.
pub struct MockCamera {
    script: VecDeque<Option<(PixelFormat, usize)>>,
    next_id: usize,
    pub acquire_calls: usize,
    log: EventLog,
}

impl MockCamera {
    pub fn new(log: &EventLog, script: impl IntoIterator<Item = Option<(PixelFormat, usize)>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            next_id: 0,
            acquire_calls: 0,
            log: Rc::clone(log),
        }
    }

    pub fn jpeg(log: &EventLog, lengths: &[usize]) -> Self {
        Self::new(log, lengths.iter().map(|&len| Some((PixelFormat::Jpeg, len))))
    }

    pub fn raw(log: &EventLog, frames: usize) -> Self {
        Self::new(log, (0..frames).map(|_| Some((PixelFormat::Rgb888, 48))))
    }
}

/// Payload bytes for frame `id`: a recognizable pattern per frame.
pub fn payload(id: usize, len: usize) -> Vec<u8> {
    (0..len).map(|i| (id * 31 + i) as u8).collect()
}

impl CameraSource for MockCamera {
    type Frame = MockFrame;

    fn acquire_frame(&mut self) -> Option<MockFrame> {
        self.acquire_calls += 1;
        match self.script.pop_front().flatten() {
            Some((format, len)) => {
                let id = self.next_id;
                self.next_id += 1;
                self.log.borrow_mut().push(Event::Acquire(id));
                Some(MockFrame {
                    id,
                    data: payload(id, len),
                    format,
                    log: Rc::clone(&self.log),
                })
            }
            None => {
                self.log.borrow_mut().push(Event::AcquireFailed);
                None
            }
        }
    }
}

pub struct MockBuffer {
    id: usize,
    data: Vec<u8>,
    log: EventLog,
}

impl AsRef<[u8]> for MockBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for MockBuffer {
    fn drop(&mut self) {
        self.log.borrow_mut().push(Event::FreeBuffer(self.id));
    }
}

#[derive(Debug)]
pub struct MockEncodeError;

impl fmt::Display for MockEncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("mock encoder refused")
    }
}

/// Encodes to a fixed-size buffer. Fails on the calls listed in `fail_on`
/// (0-based).
pub struct MockEncoder {
    pub calls: usize,
    pub qualities: Vec<u8>,
    pub output_len: usize,
    pub fail_on: Vec<usize>,
    log: EventLog,
}

impl MockEncoder {
    pub fn new(log: &EventLog) -> Self {
        Self {
            calls: 0,
            qualities: Vec::new(),
            output_len: 20,
            fail_on: Vec::new(),
            log: Rc::clone(log),
        }
    }
}

impl FrameEncoder for MockEncoder {
    type Output = MockBuffer;
    type Error = MockEncodeError;

    fn encode_jpeg<F: Frame>(&mut self, _frame: &F, quality: u8) -> Result<MockBuffer, MockEncodeError> {
        let id = self.calls;
        self.calls += 1;
        self.qualities.push(quality);
        self.log.borrow_mut().push(Event::Encode(id));
        if self.fail_on.contains(&id) {
            return Err(MockEncodeError);
        }
        Ok(MockBuffer {
            id,
            data: vec![0xEE; self.output_len],
            log: Rc::clone(&self.log),
        })
    }
}

#[derive(Debug)]
pub struct MockIoError(pub &'static str);

impl fmt::Display for MockIoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Collects everything written. `fail_chunk` is the 0-based index of the
/// chunk write that errors.
pub struct MockTransport {
    pub headers: Option<Vec<(String, String)>>,
    pub chunks: Vec<Vec<u8>>,
    pub attempts: usize,
    pub fail_headers: bool,
    pub fail_chunk: Option<usize>,
    log: EventLog,
}

impl MockTransport {
    pub fn new(log: &EventLog) -> Self {
        Self {
            headers: None,
            chunks: Vec::new(),
            attempts: 0,
            fail_headers: false,
            fail_chunk: None,
            log: Rc::clone(log),
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.chunks.concat()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl StreamTransport for MockTransport {
    type Error = MockIoError;

    fn set_headers(&mut self, headers: &[(&str, &str)]) -> Result<(), MockIoError> {
        if self.fail_headers {
            return Err(MockIoError("headers rejected"));
        }
        self.headers = Some(
            headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        );
        Ok(())
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), MockIoError> {
        let index = self.attempts;
        self.attempts += 1;
        self.log.borrow_mut().push(Event::Chunk(index));
        if self.fail_chunk == Some(index) {
            return Err(MockIoError("connection reset"));
        }
        self.chunks.push(chunk.to_vec());
        Ok(())
    }
}

/// Clock that advances by `step` every time it is read.
pub struct StepClock {
    now: Cell<Duration>,
    step: Duration,
}

impl StepClock {
    pub fn new(step: Duration) -> Self {
        Self {
            now: Cell::new(Duration::from_secs(1)),
            step,
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> Duration {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

pub fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}
