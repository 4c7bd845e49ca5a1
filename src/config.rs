use std::net::Ipv4Addr;

use anyhow::Context;

use crate::camera::PixelFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureFormat {
    /// Compressed on the sensor. 4-63, lower is higher quality.
    Jpeg { quality: u8 },
    Rgb565,
    /// 24-bit true color. High RAM usage, every frame must be re-encoded.
    Rgb888,
    /// 8-bit grayscale
    Grayscale,
}

impl CaptureFormat {
    pub fn pixel_format(self) -> PixelFormat {
        match self {
            CaptureFormat::Jpeg { .. } => PixelFormat::Jpeg,
            CaptureFormat::Rgb565 => PixelFormat::Rgb565,
            CaptureFormat::Rgb888 => PixelFormat::Rgb888,
            CaptureFormat::Grayscale => PixelFormat::Grayscale,
        }
    }

    /// Sensor-side JPEG quality clamped to the range the driver accepts.
    pub fn sensor_quality(self) -> Option<u8> {
        match self {
            CaptureFormat::Jpeg { quality } => Some(quality.clamp(4, 63)),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// 320x240
    Qvga,
    /// 640x480
    Vga,
    /// 800x600
    Svga,
    /// 2048x1536, single frame buffer only
    Qxga,
}

impl Resolution {
    pub fn dimensions(self) -> (usize, usize) {
        match self {
            Resolution::Qvga => (320, 240),
            Resolution::Vga => (640, 480),
            Resolution::Svga => (800, 600),
            Resolution::Qxga => (2048, 1536),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockSpeed {
    /// 20MHz
    High,
    /// 10MHz, for boards where WiFi gets unstable at 20MHz
    Low,
}

impl ClockSpeed {
    pub fn hz(self) -> i32 {
        match self {
            ClockSpeed::High => 20_000_000,
            ClockSpeed::Low => 10_000_000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    pub format: CaptureFormat,
    pub resolution: Resolution,
    pub double_buffered: bool,
    pub clock_speed: ClockSpeed,
}

impl CameraConfig {
    pub fn new(
        format: CaptureFormat,
        resolution: Resolution,
        double_buffered: bool,
        clock_speed: ClockSpeed,
    ) -> Self {
        Self {
            format,
            resolution,
            double_buffered,
            clock_speed,
        }
    }

    /// VGA JPEG, double buffered. Needs PSRAM.
    pub fn streaming() -> Self {
        Self::new(CaptureFormat::Jpeg { quality: 12 }, Resolution::Vga, true, ClockSpeed::High)
    }

    /// SVGA JPEG in a single buffer, for modules without PSRAM.
    pub fn low_memory() -> Self {
        Self::new(CaptureFormat::Jpeg { quality: 12 }, Resolution::Svga, false, ClockSpeed::High)
    }

    /// Picks the streaming preset the module's memory can hold.
    pub fn for_memory(has_psram: bool) -> Self {
        if has_psram {
            Self::streaming()
        } else {
            Self::low_memory()
        }
    }

    pub fn fast_streaming() -> Self {
        Self::new(CaptureFormat::Jpeg { quality: 12 }, Resolution::Qvga, true, ClockSpeed::High)
    }

    pub fn high_quality() -> Self {
        Self::new(CaptureFormat::Jpeg { quality: 10 }, Resolution::Qxga, false, ClockSpeed::Low)
    }

    pub fn frame_buffer_count(&self) -> usize {
        if self.double_buffered {
            2
        } else {
            1
        }
    }

    /// Looks up a preset by name: `streaming`, `low-memory`, `fast` or
    /// `high-quality`.
    pub fn from_preset(name: &str) -> anyhow::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "streaming" => Ok(Self::streaming()),
            "low-memory" => Ok(Self::low_memory()),
            "fast" => Ok(Self::fast_streaming()),
            "high-quality" => Ok(Self::high_quality()),
            other => anyhow::bail!(
                "expected streaming, low-memory, fast or high-quality, got {}",
                other
            ),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::streaming()
    }
}

/// GPIO assignment for the camera connector. -1 means not connected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraPins {
    pub pwdn: i32,
    pub reset: i32,
    pub xclk: i32,
    pub sda: i32,
    pub scl: i32,
    pub d7: i32,
    pub d6: i32,
    pub d5: i32,
    pub d4: i32,
    pub d3: i32,
    pub d2: i32,
    pub d1: i32,
    pub d0: i32,
    pub vsync: i32,
    pub href: i32,
    pub pclk: i32,
}

impl CameraPins {
    /// Seeed XIAO ESP32S3 Sense
    pub const XIAO_ESP32S3: CameraPins = CameraPins {
        pwdn: -1,
        reset: -1,
        xclk: 10,
        sda: 40,
        scl: 39,
        d7: 48,
        d6: 11,
        d5: 12,
        d4: 14,
        d3: 16,
        d2: 18,
        d1: 17,
        d0: 15,
        vsync: 38,
        href: 47,
        pclk: 13,
    };

    /// Freenove WROVER-E (standard WROVER-KIT wiring)
    pub const WROVER: CameraPins = CameraPins {
        pwdn: -1,
        reset: -1,
        xclk: 21,
        sda: 26,
        scl: 27,
        d7: 35,
        d6: 34,
        d5: 39,
        d4: 36,
        d3: 19,
        d2: 18,
        d1: 5,
        d0: 4,
        vsync: 25,
        href: 23,
        pclk: 22,
    };

    /// Board wiring by name: `xiao-esp32s3` or `wrover`.
    pub fn for_board(name: &str) -> anyhow::Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "xiao-esp32s3" | "xiao" => Ok(Self::XIAO_ESP32S3),
            "wrover" => Ok(Self::WROVER),
            other => anyhow::bail!("expected xiao-esp32s3 or wrover, got {}", other),
        }
    }
}

/// Board and camera preset picked at build time through `CAMERA_BOARD` and
/// `CAMERA_PRESET`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoardConfig {
    pub pins: CameraPins,
    /// `None` lets the firmware choose by available PSRAM.
    pub camera: Option<CameraConfig>,
}

impl BoardConfig {
    pub fn from_build_env() -> anyhow::Result<Self> {
        Self::from_parts(option_env!("CAMERA_BOARD"), option_env!("CAMERA_PRESET"))
    }

    pub fn from_parts(board: Option<&str>, preset: Option<&str>) -> anyhow::Result<Self> {
        let pins = match board {
            Some(board) => CameraPins::for_board(board).context("invalid CAMERA_BOARD")?,
            None => CameraPins::XIAO_ESP32S3,
        };
        let camera = preset
            .map(CameraConfig::from_preset)
            .transpose()
            .context("invalid CAMERA_PRESET")?;
        Ok(Self { pins, camera })
    }

    pub fn camera_config(&self, has_psram: bool) -> CameraConfig {
        self.camera.unwrap_or_else(|| CameraConfig::for_memory(has_psram))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GainCeiling {
    X2,
    X4,
    X8,
    X16,
    X32,
    X64,
    X128,
}

impl GainCeiling {
    /// Value of the driver's `gainceiling_t`.
    pub fn level(self) -> u32 {
        self as u32
    }
}

/// Image tuning applied once to the sensor after init.
///
/// Ranges follow the sensor driver: levels are -2..=2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SensorTuning {
    pub brightness: i8,
    pub contrast: i8,
    pub saturation: i8,
    pub white_balance: bool,
    /// 0 auto, 1 sunny, 2 cloudy, 3 office, 4 home
    pub wb_mode: u8,
    pub auto_gain: bool,
    pub gain_ceiling: GainCeiling,
    pub auto_exposure: bool,
    pub ae_level: i8,
    pub aec_value: u16,
    pub lens_correction: bool,
    pub gamma_correction: bool,
    pub hmirror: bool,
    pub vflip: bool,
}

impl Default for SensorTuning {
    fn default() -> Self {
        Self {
            brightness: 1,
            contrast: 1,
            saturation: 0,
            white_balance: true,
            wb_mode: 2,
            auto_gain: true,
            gain_ceiling: GainCeiling::X2,
            auto_exposure: true,
            ae_level: 0,
            aec_value: 300,
            lens_correction: true,
            gamma_correction: true,
            hmirror: false,
            vflip: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Quality used when a raw frame has to be re-encoded (0-100, higher is better).
    pub jpeg_quality: u8,
    /// Value of the informational `X-Framerate` header.
    pub framerate_hint: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 80,
            framerate_hint: 60,
        }
    }
}

/// `CONFIG_LWIP_MAX_SOCKETS` from `sdkconfig.defaults`.
pub const LWIP_MAX_SOCKETS: usize = 16;

/// Sockets `httpd` keeps for itself on top of `max_open_sockets`.
const HTTPD_RESERVED_SOCKETS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub ctrl_port: u16,
    pub max_open_sockets: usize,
    pub max_uri_handlers: usize,
    pub stack_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 80,
            ctrl_port: 32767,
            max_open_sockets: 12,
            max_uri_handlers: 16,
            stack_size: 8192,
        }
    }
}

impl ServerConfig {
    /// `httpd_start` rejects more open sockets than lwIP leaves it.
    pub fn validate(&self) -> anyhow::Result<()> {
        let limit = LWIP_MAX_SOCKETS - HTTPD_RESERVED_SOCKETS;
        if self.max_open_sockets > limit {
            anyhow::bail!(
                "max_open_sockets {} exceeds {} (LWIP_MAX_SOCKETS {} - {})",
                self.max_open_sockets,
                limit,
                LWIP_MAX_SOCKETS,
                HTTPD_RESERVED_SOCKETS
            );
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticIp {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    /// Prefix length, e.g. 24 for 255.255.255.0
    pub mask: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
    pub static_ip: Option<StaticIp>,
}

impl WifiConfig {
    /// Reads credentials baked in at build time:
    /// `WIFI_SSID`, `WIFI_PASS`, and optionally `WIFI_STATIC_IP`,
    /// `WIFI_GATEWAY`, `WIFI_NETMASK`.
    pub fn from_build_env() -> anyhow::Result<Self> {
        Self::from_parts(
            option_env!("WIFI_SSID"),
            option_env!("WIFI_PASS"),
            option_env!("WIFI_STATIC_IP"),
            option_env!("WIFI_GATEWAY"),
            option_env!("WIFI_NETMASK"),
        )
    }

    pub fn from_parts(
        ssid: Option<&str>,
        password: Option<&str>,
        static_ip: Option<&str>,
        gateway: Option<&str>,
        netmask: Option<&str>,
    ) -> anyhow::Result<Self> {
        let ssid = ssid.context("WIFI_SSID was not set at build time")?;
        if ssid.len() > 32 {
            anyhow::bail!("SSID is longer than 32 bytes");
        }
        let password = password.unwrap_or_default();
        if password.len() > 64 {
            anyhow::bail!("WiFi password is longer than 64 bytes");
        }

        let static_ip = match static_ip {
            None => None,
            Some(ip) => {
                let ip: Ipv4Addr = ip.parse().context("invalid WIFI_STATIC_IP")?;
                let gateway = match gateway {
                    Some(gw) => gw.parse().context("invalid WIFI_GATEWAY")?,
                    None => {
                        let [a, b, c, _] = ip.octets();
                        Ipv4Addr::new(a, b, c, 1)
                    }
                };
                let mask = match netmask {
                    Some(mask) => prefix_len(mask.parse().context("invalid WIFI_NETMASK")?)?,
                    None => 24,
                };
                Some(StaticIp { ip, gateway, mask })
            }
        };

        Ok(Self {
            ssid: ssid.to_string(),
            password: password.to_string(),
            static_ip,
        })
    }
}

fn prefix_len(mask: Ipv4Addr) -> anyhow::Result<u8> {
    let bits = u32::from(mask);
    if bits.leading_ones() + bits.trailing_zeros() != 32 {
        anyhow::bail!("netmask {} is not contiguous", mask);
    }
    Ok(bits.leading_ones() as u8)
}
