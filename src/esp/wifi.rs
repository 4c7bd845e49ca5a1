use anyhow::Context;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::ipv4;
use esp_idf_svc::netif::{EspNetif, NetifConfiguration, NetifStack};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi, WifiDriver};

use crate::config::WifiConfig;

pub type Wifi = BlockingWifi<EspWifi<'static>>;

/// Joins the configured network and waits until the interface has an address.
pub fn connect(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    config: &WifiConfig,
) -> anyhow::Result<Wifi> {
    let driver = WifiDriver::new(modem, sys_loop.clone(), Some(nvs))?;

    let esp_wifi = match config.static_ip {
        None => EspWifi::wrap(driver)?,
        Some(static_ip) => {
            let sta = EspNetif::new_with_conf(&NetifConfiguration {
                ip_configuration: Some(ipv4::Configuration::Client(
                    ipv4::ClientConfiguration::Fixed(ipv4::ClientSettings {
                        ip: static_ip.ip,
                        subnet: ipv4::Subnet {
                            gateway: static_ip.gateway,
                            mask: ipv4::Mask(static_ip.mask),
                        },
                        dns: None,
                        secondary_dns: None,
                    }),
                )),
                ..NetifConfiguration::wifi_default_client()
            })?;
            EspWifi::wrap_all(driver, sta, EspNetif::new(NetifStack::Ap)?)?
        }
    };

    let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: config
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow::anyhow!("SSID too long"))?,
        password: config
            .password
            .as_str()
            .try_into()
            .map_err(|_| anyhow::anyhow!("password too long"))?,
        auth_method: if config.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("Connecting to WiFi \"{}\"...", config.ssid);
    wifi.connect().context("WiFi association failed")?;
    wifi.wait_netif_up()?;

    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    info!("WiFi connected, IP: {}", ip_info.ip);
    Ok(wifi)
}

/// Reconnects if the link dropped. Failures are logged and retried on the
/// next call.
pub fn ensure_connected(wifi: &mut Wifi) {
    match wifi.is_connected() {
        Ok(true) => return,
        Ok(false) => warn!("WiFi connection lost. Reconnecting..."),
        Err(err) => {
            warn!("Could not query WiFi state: {}", err);
            return;
        }
    }

    if let Err(err) = wifi.connect().and_then(|_| wifi.wait_netif_up()) {
        warn!("WiFi reconnect failed: {}", err);
        return;
    }
    if let Ok(ip_info) = wifi.wifi().sta_netif().get_ip_info() {
        info!("WiFi reconnected, IP: {}", ip_info.ip);
    }
}
