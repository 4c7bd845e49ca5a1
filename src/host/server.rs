use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use log::{debug, info, warn};
use thiserror::Error;

use crate::camera::{CameraSource, SharedCamera};
use crate::config::StreamConfig;
use crate::encoder::FrameEncoder;
use crate::server::{Route, INDEX_HTML};
use crate::session::{StreamSession, StreamTransport};

const MAX_REQUEST_HEAD: usize = 8 * 1024;

#[derive(Debug, Error)]
enum RequestError {
    #[error("request head exceeds {} bytes", MAX_REQUEST_HEAD)]
    TooLarge,
    #[error("malformed request line {0:?}")]
    Malformed(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// HTTP/1.1 response body written with `Transfer-Encoding: chunked`,
/// one HTTP chunk per `send_chunk` call.
pub struct ChunkedTransport<W> {
    writer: W,
}

impl<W: Write> ChunkedTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StreamTransport for ChunkedTransport<W> {
    type Error = io::Error;

    fn set_headers(&mut self, headers: &[(&str, &str)]) -> io::Result<()> {
        let mut head = String::from("HTTP/1.1 200 OK\r\n");
        for (name, value) in headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n");
        self.writer.write_all(head.as_bytes())?;
        self.writer.flush()
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        // A zero-length chunk would terminate the body.
        if chunk.is_empty() {
            return Ok(());
        }
        write!(self.writer, "{:X}\r\n", chunk.len())?;
        self.writer.write_all(chunk)?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()
    }
}

/// Owned server instance. Accepts connections on a background thread and
/// runs one streaming session per `/stream` client.
pub struct HttpServer {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl HttpServer {
    pub fn start<A, C, E>(
        addr: A,
        camera: SharedCamera<C>,
        encoder: E,
        config: StreamConfig,
    ) -> anyhow::Result<Self>
    where
        A: ToSocketAddrs,
        C: CameraSource + Send + 'static,
        E: FrameEncoder + Clone + Send + 'static,
    {
        let listener = TcpListener::bind(addr).context("failed to bind HTTP listener")?;
        let local_addr = listener.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));

        let stop = Arc::clone(&shutdown);
        let acceptor = thread::Builder::new()
            .name("httpd".into())
            .spawn(move || accept_loop(listener, stop, camera, encoder, config))
            .context("failed to spawn accept thread")?;

        info!("HTTP server started on {}", local_addr);
        Ok(Self {
            local_addr,
            shutdown,
            acceptor: Some(acceptor),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections. Streams already running end when their
    /// client disconnects.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(acceptor) = self.acceptor.take() else {
            return;
        };
        self.shutdown.store(true, Ordering::SeqCst);

        // Wake the blocking accept().
        let mut wake = self.local_addr;
        if wake.ip().is_unspecified() {
            wake.set_ip(Ipv4Addr::LOCALHOST.into());
        }
        let _ = TcpStream::connect(wake);

        if acceptor.join().is_err() {
            warn!("HTTP accept thread panicked");
        }
        info!("HTTP server on {} stopped", self.local_addr);
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop<C, E>(
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    camera: SharedCamera<C>,
    encoder: E,
    config: StreamConfig,
) where
    C: CameraSource + Send + 'static,
    E: FrameEncoder + Clone + Send + 'static,
{
    for conn in listener.incoming() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let stream = match conn {
            Ok(stream) => stream,
            Err(err) => {
                warn!("accept failed: {}", err);
                continue;
            }
        };

        let camera = camera.clone();
        let encoder = encoder.clone();
        let spawned = thread::Builder::new()
            .name("httpd-conn".into())
            .spawn(move || {
                if let Err(err) = handle_connection(stream, camera, encoder, config) {
                    debug!("connection ended: {:#}", err);
                }
            });
        if let Err(err) = spawned {
            warn!("failed to spawn connection thread: {}", err);
        }
    }
}

fn handle_connection<C, E>(
    stream: TcpStream,
    camera: SharedCamera<C>,
    encoder: E,
    config: StreamConfig,
) -> anyhow::Result<()>
where
    C: CameraSource,
    E: FrameEncoder,
{
    stream.set_nodelay(true)?;
    let peer = stream.peer_addr()?;
    let mut stream = stream;
    let (method, target) = match read_request_line(&stream) {
        Ok(request) => request,
        Err(RequestError::Io(err)) => return Err(err.into()),
        Err(err) => {
            let status = match err {
                RequestError::TooLarge => "431 Request Header Fields Too Large",
                _ => "400 Bad Request",
            };
            write_response(&mut stream, status, "text/plain", status.as_bytes())?;
            return Err(err.into());
        }
    };
    debug!("{} {} from {}", method, target, peer);

    match Route::resolve(&method, &target) {
        Some(Route::Index) => {
            write_response(&mut stream, "200 OK", "text/html", INDEX_HTML.as_bytes())?;
        }
        Some(Route::Stream) => {
            info!("Client {} connected to stream", peer);
            let err = {
                let transport = ChunkedTransport::new(&mut stream);
                StreamSession::new(camera, encoder, transport, config).run()
            };
            let _ = stream.shutdown(Shutdown::Both);
            return Err(err.into());
        }
        None => {
            write_response(&mut stream, "404 Not Found", "text/plain", b"Not Found")?;
        }
    }
    Ok(())
}

/// Reads the request head and returns the method and target. Reads at most
/// one byte past `MAX_REQUEST_HEAD`.
fn read_request_line<R: Read>(stream: R) -> Result<(String, String), RequestError> {
    let mut reader = BufReader::new(stream.take(MAX_REQUEST_HEAD as u64 + 1));
    let mut request_line: Option<String> = None;
    let mut consumed = 0;
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        consumed += n;
        if consumed > MAX_REQUEST_HEAD {
            return Err(RequestError::TooLarge);
        }
        if n == 0 {
            break;
        }
        if request_line.is_none() {
            request_line = Some(String::from_utf8_lossy(&line).into_owned());
        } else if line == b"\r\n" || line == b"\n" {
            break;
        }
    }

    let request_line = request_line.unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => Ok((method.to_string(), target.to_string())),
        _ => Err(RequestError::Malformed(request_line.trim_end().to_string())),
    }
}

fn write_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> io::Result<()> {
    write!(
        stream,
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    )?;
    stream.write_all(body)?;
    stream.flush()
}
