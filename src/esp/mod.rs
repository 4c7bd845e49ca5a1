//! ESP-IDF bindings: camera driver, JPEG converter, WiFi and `esp_http_server`.

pub mod camera;
pub mod encoder;
pub mod server;
pub mod transport;
pub mod wifi;

pub use camera::{EspCamera, EspFrame};
pub use encoder::{EspJpegBuffer, EspJpegEncoder};
pub use transport::HttpdTransport;
