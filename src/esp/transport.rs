use esp_idf_svc::http::server::Connection;
use esp_idf_svc::io::{EspIOError, Write};

use crate::session::StreamTransport;

/// Chunked response on an `esp_http_server` connection.
pub struct HttpdTransport<C> {
    conn: C,
}

impl<C> HttpdTransport<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

impl<C> StreamTransport for HttpdTransport<C>
where
    C: Connection<Error = EspIOError>,
{
    type Error = EspIOError;

    fn set_headers(&mut self, headers: &[(&str, &str)]) -> Result<(), EspIOError> {
        self.conn.initiate_response(200, Some("OK"), headers)
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), EspIOError> {
        self.conn.write_all(chunk)
    }
}
