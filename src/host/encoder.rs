use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use thiserror::Error;

use crate::camera::{Frame, PixelFormat};
use crate::encoder::FrameEncoder;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no software encoder for {0:?} frames")]
    Unsupported(PixelFormat),
    #[error("frame is {actual} bytes, expected {expected} for {width}x{height}")]
    BadLength {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Software JPEG encoder built on the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageJpegEncoder;

impl FrameEncoder for ImageJpegEncoder {
    type Output = Vec<u8>;
    type Error = EncodeError;

    fn encode_jpeg<F: Frame>(&mut self, frame: &F, quality: u8) -> Result<Vec<u8>, EncodeError> {
        let format = frame.format();
        let bpp = format
            .bytes_per_pixel()
            .ok_or(EncodeError::Unsupported(format))?;
        let (width, height) = (frame.width(), frame.height());
        let expected = width * height * bpp;
        if frame.len() != expected {
            return Err(EncodeError::BadLength {
                width,
                height,
                expected,
                actual: frame.len(),
            });
        }

        let mut out = Vec::with_capacity(expected / 8);
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
            let (w, h) = (width as u32, height as u32);
            match format {
                PixelFormat::Rgb888 => encoder.encode(frame.data(), w, h, ExtendedColorType::Rgb8)?,
                PixelFormat::Grayscale => encoder.encode(frame.data(), w, h, ExtendedColorType::L8)?,
                PixelFormat::Rgb565 => {
                    let rgb = rgb565_to_rgb888(frame.data());
                    encoder.encode(&rgb, w, h, ExtendedColorType::Rgb8)?
                }
                other => return Err(EncodeError::Unsupported(other)),
            }
        }
        Ok(out)
    }
}

/// Expands big-endian RGB565, the byte order the camera DMA produces.
pub fn rgb565_to_rgb888(data: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 2 * 3);
    for px in data.chunks_exact(2) {
        let v = u16::from_be_bytes([px[0], px[1]]);
        let r = ((v >> 11) & 0x1f) as u8;
        let g = ((v >> 5) & 0x3f) as u8;
        let b = (v & 0x1f) as u8;
        rgb.push((r << 3) | (r >> 2));
        rgb.push((g << 2) | (g >> 4));
        rgb.push((b << 3) | (b >> 2));
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::OwnedFrame;

    fn is_jpeg(bytes: &[u8]) -> bool {
        bytes.starts_with(&[0xFF, 0xD8]) && bytes.ends_with(&[0xFF, 0xD9])
    }

    #[test]
    fn encodes_rgb888() {
        let frame = OwnedFrame::new(vec![128; 16 * 8 * 3], 16, 8, PixelFormat::Rgb888);
        let jpeg = ImageJpegEncoder.encode_jpeg(&frame, 80).unwrap();
        assert!(is_jpeg(&jpeg));
    }

    #[test]
    fn encodes_grayscale_and_rgb565() {
        let gray = OwnedFrame::new(vec![10; 8 * 8], 8, 8, PixelFormat::Grayscale);
        assert!(is_jpeg(&ImageJpegEncoder.encode_jpeg(&gray, 80).unwrap()));

        let rgb565 = OwnedFrame::new(vec![0xF8, 0x00].repeat(8 * 8), 8, 8, PixelFormat::Rgb565);
        assert!(is_jpeg(&ImageJpegEncoder.encode_jpeg(&rgb565, 80).unwrap()));
    }

    #[test]
    fn rejects_unsupported_and_short_frames() {
        let yuv = OwnedFrame::new(vec![0; 4 * 4 * 2], 4, 4, PixelFormat::Yuv422);
        assert!(matches!(
            ImageJpegEncoder.encode_jpeg(&yuv, 80),
            Err(EncodeError::Unsupported(PixelFormat::Yuv422))
        ));

        let short = OwnedFrame::new(vec![0; 10], 4, 4, PixelFormat::Rgb888);
        assert!(matches!(
            ImageJpegEncoder.encode_jpeg(&short, 80),
            Err(EncodeError::BadLength { expected: 48, actual: 10, .. })
        ));
    }

    #[test]
    fn rgb565_expansion() {
        assert_eq!(rgb565_to_rgb888(&[0xF8, 0x00]), vec![255, 0, 0]);
        assert_eq!(rgb565_to_rgb888(&[0x07, 0xE0]), vec![0, 255, 0]);
        assert_eq!(rgb565_to_rgb888(&[0x00, 0x1F]), vec![0, 0, 255]);
    }
}
