#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use std::thread;
    use std::time::Duration;

    use cam_stream::camera::{CameraSource, Frame, SharedCamera};
    use cam_stream::config::{BoardConfig, SensorTuning, ServerConfig, StreamConfig, WifiConfig};
    use cam_stream::esp::{self, EspCamera};
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{info, warn};

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // 1. Camera
    let board = BoardConfig::from_build_env()?;
    let psram = esp::camera::has_psram();
    info!("PSRAM {}", if psram { "found" } else { "not found" });
    let camera_config = board.camera_config(psram);
    let mut camera = EspCamera::init(&camera_config, &board.pins)?;
    camera.tune(&SensorTuning::default(), camera_config.format);

    match camera.acquire_frame() {
        Some(frame) => info!("Captured image: width={}, height={}", frame.width(), frame.height()),
        None => warn!("Test capture failed"),
    }

    // 2. WiFi
    let wifi_config = WifiConfig::from_build_env()?;
    let mut wifi = esp::wifi::connect(peripherals.modem, sys_loop, nvs, &wifi_config)?;
    let ip = wifi.wifi().sta_netif().get_ip_info()?.ip;

    // 3. HTTP server
    let _server = esp::server::start(
        &ServerConfig::default(),
        StreamConfig::default(),
        SharedCamera::new(camera),
    )?;
    info!("Camera stream available at: http://{}/", ip);

    loop {
        esp::wifi::ensure_connected(&mut wifi);
        thread::sleep(Duration::from_secs(1));
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use std::thread;

    use cam_stream::camera::SharedCamera;
    use cam_stream::config::StreamConfig;
    use cam_stream::host::{HostConfig, HttpServer, ImageJpegEncoder, SyntheticCamera};
    use log::info;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = HostConfig::from_env()?;
    let camera = SharedCamera::new(SyntheticCamera::new(config.camera));
    let server = HttpServer::start(
        config.bind.as_str(),
        camera,
        ImageJpegEncoder,
        StreamConfig::default(),
    )?;
    info!(
        "Simulated camera ({:?}) streaming at http://{}/",
        config.camera.format,
        server.local_addr()
    );

    loop {
        thread::park();
    }
}
