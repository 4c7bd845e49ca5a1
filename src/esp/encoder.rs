use std::ffi::c_void;

use esp_idf_svc::sys::camera::fmt2jpg;
use esp_idf_svc::sys::free;
use thiserror::Error;

use crate::camera::{Frame, PixelFormat};
use crate::encoder::FrameEncoder;
use crate::esp::camera::to_pixformat;

#[derive(Debug, Error)]
pub enum EspJpegError {
    #[error("frame of {0}x{1} exceeds converter limits")]
    TooLarge(usize, usize),
    #[error("fmt2jpg failed for {0:?} frame")]
    Conversion(PixelFormat),
}

/// JPEG buffer allocated by the camera component's converter. Freed on drop.
pub struct EspJpegBuffer {
    ptr: *mut u8,
    len: usize,
}

impl AsRef<[u8]> for EspJpegBuffer {
    fn as_ref(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl Drop for EspJpegBuffer {
    fn drop(&mut self) {
        unsafe { free(self.ptr as *mut c_void) };
    }
}

/// Software JPEG conversion from `img_converters.h`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EspJpegEncoder;

impl FrameEncoder for EspJpegEncoder {
    type Output = EspJpegBuffer;
    type Error = EspJpegError;

    fn encode_jpeg<F: Frame>(&mut self, frame: &F, quality: u8) -> Result<EspJpegBuffer, EspJpegError> {
        let (width, height) = (frame.width(), frame.height());
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(EspJpegError::TooLarge(width, height));
        };

        let mut out: *mut u8 = std::ptr::null_mut();
        let mut out_len: usize = 0;
        let converted = unsafe {
            fmt2jpg(
                frame.data().as_ptr() as *mut u8,
                frame.len(),
                w,
                h,
                to_pixformat(frame.format()),
                quality,
                &mut out,
                &mut out_len,
            )
        };

        if !converted || out.is_null() {
            if !out.is_null() {
                unsafe { free(out as *mut c_void) };
            }
            return Err(EspJpegError::Conversion(frame.format()));
        }
        Ok(EspJpegBuffer { ptr: out, len: out_len })
    }
}
