use std::fmt;

use crate::camera::Frame;

/// Converts raw frames to JPEG.
///
/// The returned buffer is owned by the caller and released when dropped.
pub trait FrameEncoder {
    type Output: AsRef<[u8]>;
    type Error: fmt::Display;

    fn encode_jpeg<F: Frame>(&mut self, frame: &F, quality: u8) -> Result<Self::Output, Self::Error>;
}

impl<E: FrameEncoder> FrameEncoder for &mut E {
    type Output = E::Output;
    type Error = E::Error;

    fn encode_jpeg<F: Frame>(&mut self, frame: &F, quality: u8) -> Result<Self::Output, Self::Error> {
        (**self).encode_jpeg(frame, quality)
    }
}
