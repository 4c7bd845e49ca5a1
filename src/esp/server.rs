use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::http::Method;
use esp_idf_svc::io::Write;
use log::info;

use crate::camera::SharedCamera;
use crate::config::{ServerConfig, StreamConfig};
use crate::esp::camera::EspCamera;
use crate::esp::encoder::EspJpegEncoder;
use crate::esp::transport::HttpdTransport;
use crate::server::{Route, INDEX_HTML};
use crate::session::StreamSession;

/// Starts `esp_http_server` with the index and stream routes.
///
/// The server runs until the returned value is dropped.
pub fn start(
    config: &ServerConfig,
    stream: StreamConfig,
    camera: SharedCamera<EspCamera>,
) -> anyhow::Result<EspHttpServer<'static>> {
    config.validate()?;
    let mut server = EspHttpServer::new(&Configuration {
        http_port: config.port,
        ctrl_port: config.ctrl_port,
        max_open_sockets: config.max_open_sockets,
        max_uri_handlers: config.max_uri_handlers,
        stack_size: config.stack_size,
        ..Default::default()
    })?;

    for route in Route::ALL {
        match route {
            Route::Index => {
                server.fn_handler::<anyhow::Error, _>(route.path(), Method::Get, |request| {
                    request
                        .into_response(200, Some("OK"), &[("Content-Type", "text/html")])?
                        .write_all(INDEX_HTML.as_bytes())?;
                    Ok(())
                })?;
            }
            Route::Stream => {
                let camera = camera.clone();
                server.fn_handler::<anyhow::Error, _>(route.path(), Method::Get, move |mut request| {
                    info!("Client connected to stream");
                    let transport = HttpdTransport::new(request.connection());
                    let err = StreamSession::new(camera.clone(), EspJpegEncoder, transport, stream).run();
                    Err(err.into())
                })?;
            }
        }
    }

    info!("HTTP server started on port {}", config.port);
    Ok(server)
}
