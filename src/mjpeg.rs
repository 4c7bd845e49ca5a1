//! Multipart framing for the MJPEG stream.
//!
//! Each frame goes out as three chunks, always in this order:
//!
//! ```text
//! \r\n--<boundary>\r\n
//! Content-Type: image/jpeg\r\nContent-Length: <N>\r\n\r\n
//! <N bytes of JPEG>
//! ```

pub const BOUNDARY: &str = "123456789000000000000987654321";

pub const STREAM_CONTENT_TYPE: &str = concat!(
    "multipart/x-mixed-replace;boundary=",
    "123456789000000000000987654321"
);

pub const STREAM_BOUNDARY: &str = concat!("\r\n--", "123456789000000000000987654321", "\r\n");

/// Part header for a JPEG payload of `len` bytes.
pub fn part_header(len: usize) -> String {
    format!("Content-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n", len)
}
