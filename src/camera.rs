use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Jpeg,
    Rgb565,
    Rgb888,
    Yuv422,
    Grayscale,
}

impl PixelFormat {
    pub fn is_jpeg(self) -> bool {
        matches!(self, PixelFormat::Jpeg)
    }

    /// Bytes per pixel for uncompressed formats, `None` for JPEG.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Jpeg => None,
            PixelFormat::Rgb565 | PixelFormat::Yuv422 => Some(2),
            PixelFormat::Rgb888 => Some(3),
            PixelFormat::Grayscale => Some(1),
        }
    }
}

/// One captured image.
///
/// The buffer belongs to the camera that produced it. Dropping the frame
/// hands the buffer back.
pub trait Frame {
    fn data(&self) -> &[u8];
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn format(&self) -> PixelFormat;

    fn len(&self) -> usize {
        self.data().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait CameraSource {
    type Frame: Frame;

    /// Blocks until the hardware delivers a frame. `None` means the capture failed.
    fn acquire_frame(&mut self) -> Option<Self::Frame>;

    /// Hands a frame back to the source. Equivalent to dropping it.
    fn release_frame(&mut self, frame: Self::Frame) {
        drop(frame);
    }
}

impl<C: CameraSource> CameraSource for &mut C {
    type Frame = C::Frame;

    fn acquire_frame(&mut self) -> Option<Self::Frame> {
        (**self).acquire_frame()
    }

    fn release_frame(&mut self, frame: Self::Frame) {
        (**self).release_frame(frame)
    }
}

/// Heap-backed frame, used by the simulator and by tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
}

impl OwnedFrame {
    pub fn new(data: Vec<u8>, width: usize, height: usize, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }
}

impl Frame for OwnedFrame {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}

/// Cloneable handle to a single camera shared by several streaming sessions.
///
/// The lock is held only while one frame is being acquired, so sessions take
/// turns at the hardware but transmit in parallel.
pub struct SharedCamera<C> {
    inner: Arc<Mutex<C>>,
}

impl<C> SharedCamera<C> {
    pub fn new(camera: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(camera)),
        }
    }
}

impl<C> Clone for SharedCamera<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CameraSource> CameraSource for SharedCamera<C> {
    type Frame = C::Frame;

    fn acquire_frame(&mut self) -> Option<Self::Frame> {
        self.lock().acquire_frame()
    }

    fn release_frame(&mut self, frame: Self::Frame) {
        self.lock().release_frame(frame)
    }
}

impl<C> SharedCamera<C> {
    fn lock(&self) -> std::sync::MutexGuard<'_, C> {
        // A session that panicked mid-acquire leaves the camera itself intact.
        match self.inner.lock() {
            Ok(camera) => camera,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        next: u8,
    }

    impl CameraSource for Counter {
        type Frame = OwnedFrame;

        fn acquire_frame(&mut self) -> Option<OwnedFrame> {
            self.next += 1;
            Some(OwnedFrame::new(vec![self.next], 1, 1, PixelFormat::Grayscale))
        }
    }

    #[test]
    fn shared_camera_clones_draw_from_one_source() {
        let mut a = SharedCamera::new(Counter { next: 0 });
        let mut b = a.clone();

        assert_eq!(a.acquire_frame().unwrap().data, vec![1]);
        assert_eq!(b.acquire_frame().unwrap().data, vec![2]);
        assert_eq!(a.acquire_frame().unwrap().data, vec![3]);
    }

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(PixelFormat::Jpeg.bytes_per_pixel(), None);
        assert_eq!(PixelFormat::Rgb888.bytes_per_pixel(), Some(3));
        assert_eq!(PixelFormat::Rgb565.bytes_per_pixel(), Some(2));
        assert_eq!(PixelFormat::Grayscale.bytes_per_pixel(), Some(1));
        assert!(PixelFormat::Jpeg.is_jpeg());
        assert!(!PixelFormat::Yuv422.is_jpeg());
    }
}
