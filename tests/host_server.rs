//! End-to-end over loopback against the simulator's HTTP server.

#![cfg(not(target_os = "espidf"))]

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use cam_stream::camera::SharedCamera;
use cam_stream::config::{CameraConfig, CaptureFormat, ClockSpeed, Resolution, StreamConfig};
use cam_stream::host::{HttpServer, ImageJpegEncoder, SyntheticCamera};
use cam_stream::mjpeg::{BOUNDARY, STREAM_CONTENT_TYPE};

fn start(format: CaptureFormat) -> HttpServer {
    let camera = SyntheticCamera::new(CameraConfig::new(format, Resolution::Qvga, false, ClockSpeed::High))
        .with_frame_interval(Duration::from_millis(5));
    HttpServer::start(
        "127.0.0.1:0",
        SharedCamera::new(camera),
        ImageJpegEncoder,
        StreamConfig::default(),
    )
    .unwrap()
}

fn request(addr: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    write!(stream, "GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path).unwrap();
    stream
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

/// Reads until `needle` has appeared `times` times or five seconds pass.
fn read_until(stream: &mut TcpStream, needle: &[u8], times: usize) -> Vec<u8> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut received = Vec::new();
    let mut buf = [0u8; 16 * 1024];
    while count(&received, needle) < times && Instant::now() < deadline {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }
    received
}

#[test]
fn serves_index_page() {
    let server = start(CaptureFormat::Jpeg { quality: 12 });
    let mut stream = request(server.local_addr(), "/");

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();

    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/html\r\n"));
    assert!(response.contains(r#"<img src="/stream""#));
    server.shutdown();
}

#[test]
fn unknown_path_is_404() {
    let server = start(CaptureFormat::Jpeg { quality: 12 });
    let mut stream = request(server.local_addr(), "/capture");

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();

    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    server.shutdown();
}

#[test]
fn oversized_request_line_gets_431() {
    let server = start(CaptureFormat::Jpeg { quality: 12 });
    let mut stream = TcpStream::connect(server.local_addr()).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    // One byte past the 8 KiB head limit, no line ending anywhere.
    let mut line = b"GET /".to_vec();
    line.resize(8 * 1024 + 1, b'a');
    stream.write_all(&line).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    assert!(response.starts_with("HTTP/1.1 431 "), "{:?}", response);
    server.shutdown();
}

#[test]
fn streams_sensor_jpeg_frames() {
    let server = start(CaptureFormat::Jpeg { quality: 12 });
    let mut stream = request(server.local_addr(), "/stream");

    let marker = format!("\r\n--{}\r\n", BOUNDARY);
    let received = read_until(&mut stream, marker.as_bytes(), 3);
    let text = String::from_utf8_lossy(&received);

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.contains(&format!("Content-Type: {}\r\n", STREAM_CONTENT_TYPE)));
    assert!(text.contains("Transfer-Encoding: chunked\r\n"));
    assert!(text.contains("X-Framerate: 60\r\n"));
    assert!(count(&received, marker.as_bytes()) >= 3);
    assert!(count(&received, b"Content-Type: image/jpeg\r\nContent-Length: ") >= 2);
    assert!(count(&received, &[0xFF, 0xD8, 0xFF]) >= 2);

    drop(stream);
    server.shutdown();
}

#[test]
fn streams_raw_frames_through_the_encoder() {
    let server = start(CaptureFormat::Rgb888);
    let mut stream = request(server.local_addr(), "/stream");

    let marker = format!("\r\n--{}\r\n", BOUNDARY);
    let received = read_until(&mut stream, marker.as_bytes(), 2);

    assert!(count(&received, marker.as_bytes()) >= 2);
    assert!(count(&received, &[0xFF, 0xD8, 0xFF]) >= 1);

    drop(stream);
    server.shutdown();
}
