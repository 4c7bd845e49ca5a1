use log::{info, warn};

use esp_idf_svc::sys::camera::*;
use esp_idf_svc::sys::{heap_caps_get_total_size, MALLOC_CAP_SPIRAM};

use crate::camera::{CameraSource, Frame, PixelFormat};
use crate::config::{CameraConfig, CameraPins, CaptureFormat, Resolution, SensorTuning};

pub fn has_psram() -> bool {
    unsafe { heap_caps_get_total_size(MALLOC_CAP_SPIRAM) > 0 }
}

pub(crate) fn to_pixformat(format: PixelFormat) -> pixformat_t {
    match format {
        PixelFormat::Jpeg => pixformat_t_PIXFORMAT_JPEG,
        PixelFormat::Rgb565 => pixformat_t_PIXFORMAT_RGB565,
        PixelFormat::Rgb888 => pixformat_t_PIXFORMAT_RGB888,
        PixelFormat::Yuv422 => pixformat_t_PIXFORMAT_YUV422,
        PixelFormat::Grayscale => pixformat_t_PIXFORMAT_GRAYSCALE,
    }
}

#[allow(non_upper_case_globals)]
fn from_pixformat(format: pixformat_t) -> Option<PixelFormat> {
    match format {
        pixformat_t_PIXFORMAT_JPEG => Some(PixelFormat::Jpeg),
        pixformat_t_PIXFORMAT_RGB565 => Some(PixelFormat::Rgb565),
        pixformat_t_PIXFORMAT_RGB888 => Some(PixelFormat::Rgb888),
        pixformat_t_PIXFORMAT_YUV422 => Some(PixelFormat::Yuv422),
        pixformat_t_PIXFORMAT_GRAYSCALE => Some(PixelFormat::Grayscale),
        _ => None,
    }
}

/// Handle to the initialized camera driver.
///
/// The driver is a process-wide singleton; wrap this in a
/// [`SharedCamera`](crate::camera::SharedCamera) when several streams use it.
pub struct EspCamera {
    _private: (),
}

impl EspCamera {
    pub fn init(config: &CameraConfig, pins: &CameraPins) -> anyhow::Result<Self> {
        let mut camera_config = camera_config_t::default();

        camera_config.pin_pwdn = pins.pwdn;
        camera_config.pin_reset = pins.reset;
        camera_config.pin_xclk = pins.xclk;
        camera_config.pin_d7 = pins.d7;
        camera_config.pin_d6 = pins.d6;
        camera_config.pin_d5 = pins.d5;
        camera_config.pin_d4 = pins.d4;
        camera_config.pin_d3 = pins.d3;
        camera_config.pin_d2 = pins.d2;
        camera_config.pin_d1 = pins.d1;
        camera_config.pin_d0 = pins.d0;
        camera_config.pin_vsync = pins.vsync;
        camera_config.pin_href = pins.href;
        camera_config.pin_pclk = pins.pclk;

        camera_config.xclk_freq_hz = config.clock_speed.hz();
        camera_config.ledc_timer = ledc_timer_t_LEDC_TIMER_0;
        camera_config.ledc_channel = ledc_channel_t_LEDC_CHANNEL_0;

        camera_config.pixel_format = to_pixformat(config.format.pixel_format());
        camera_config.frame_size = match config.resolution {
            Resolution::Qvga => framesize_t_FRAMESIZE_QVGA,
            Resolution::Vga => framesize_t_FRAMESIZE_VGA,
            Resolution::Svga => framesize_t_FRAMESIZE_SVGA,
            Resolution::Qxga => framesize_t_FRAMESIZE_QXGA,
        };
        camera_config.jpeg_quality = config.format.sensor_quality().unwrap_or(0) as i32;

        camera_config.fb_count = config.frame_buffer_count();
        camera_config.fb_location = if has_psram() {
            camera_fb_location_t_CAMERA_FB_IN_PSRAM
        } else {
            camera_fb_location_t_CAMERA_FB_IN_DRAM
        };
        // With two buffers always hand out the newest frame.
        camera_config.grab_mode = if config.double_buffered {
            camera_grab_mode_t_CAMERA_GRAB_LATEST
        } else {
            camera_grab_mode_t_CAMERA_GRAB_WHEN_EMPTY
        };

        unsafe {
            // Union fields for driver v2.x+
            camera_config.__bindgen_anon_1.pin_sccb_sda = pins.sda;
            camera_config.__bindgen_anon_2.pin_sccb_scl = pins.scl;

            let err = esp_camera_init(&camera_config);
            if err != ESP_OK {
                anyhow::bail!("Camera init failed with error 0x{:x}", err);
            }
        }

        let (width, height) = config.resolution.dimensions();
        info!(
            "Camera initialized: {}x{} {:?}, {} frame buffer(s)",
            width,
            height,
            config.format,
            config.frame_buffer_count()
        );
        Ok(Self { _private: () })
    }

    /// Applies sensor tuning. Settings the sensor doesn't support are skipped.
    pub fn tune(&self, tuning: &SensorTuning, format: CaptureFormat) {
        unsafe {
            let sensor = esp_camera_sensor_get();
            if sensor.is_null() {
                warn!("No sensor handle, skipping tuning");
                return;
            }

            macro_rules! set {
                ($setter:ident, $value:expr) => {
                    if let Some(setter) = (*sensor).$setter {
                        if setter(sensor, $value as _) != 0 {
                            warn!("Sensor rejected {}", stringify!($setter));
                        }
                    }
                };
            }

            set!(set_brightness, tuning.brightness);
            set!(set_contrast, tuning.contrast);
            set!(set_saturation, tuning.saturation);
            set!(set_whitebal, tuning.white_balance);
            set!(set_awb_gain, tuning.white_balance);
            set!(set_wb_mode, tuning.wb_mode);
            set!(set_gain_ctrl, tuning.auto_gain);
            set!(set_gainceiling, tuning.gain_ceiling.level());
            set!(set_exposure_ctrl, tuning.auto_exposure);
            set!(set_aec2, tuning.auto_exposure);
            set!(set_ae_level, tuning.ae_level);
            set!(set_aec_value, tuning.aec_value);
            set!(set_lenc, tuning.lens_correction);
            set!(set_raw_gma, tuning.gamma_correction);
            set!(set_hmirror, tuning.hmirror);
            set!(set_vflip, tuning.vflip);
            if let Some(quality) = format.sensor_quality() {
                set!(set_quality, quality);
            }
        }
    }
}

impl CameraSource for EspCamera {
    type Frame = EspFrame;

    fn acquire_frame(&mut self) -> Option<EspFrame> {
        let fb = unsafe { esp_camera_fb_get() };
        if fb.is_null() {
            warn!("Camera capture failed");
            return None;
        }
        EspFrame::from_raw(fb)
    }
}

/// A frame buffer borrowed from the driver. Returned to it on drop.
pub struct EspFrame {
    fb: *mut camera_fb_t,
    buf: *const u8,
    len: usize,
    width: usize,
    height: usize,
    format: PixelFormat,
}

impl EspFrame {
    fn from_raw(fb: *mut camera_fb_t) -> Option<Self> {
        // camera_fb_t is packed around its timestamp; read fields unaligned.
        let (buf, len, width, height, raw_format) = unsafe {
            (
                std::ptr::addr_of!((*fb).buf).read_unaligned(),
                std::ptr::addr_of!((*fb).len).read_unaligned(),
                std::ptr::addr_of!((*fb).width).read_unaligned(),
                std::ptr::addr_of!((*fb).height).read_unaligned(),
                std::ptr::addr_of!((*fb).format).read_unaligned(),
            )
        };

        let Some(format) = from_pixformat(raw_format) else {
            warn!("Unsupported frame format {}", raw_format);
            unsafe { esp_camera_fb_return(fb) };
            return None;
        };

        Some(Self {
            fb,
            buf,
            len,
            width,
            height,
            format,
        })
    }
}

impl Frame for EspFrame {
    fn data(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.buf, self.len) }
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}

impl Drop for EspFrame {
    fn drop(&mut self) {
        unsafe { esp_camera_fb_return(self.fb) };
    }
}
