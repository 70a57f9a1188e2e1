//! WiFi and outbound HTTP
//!
//! # WiFi Connection Flow
//!
//! ```text
//! 1. Skip everything if no SSID was baked in (offline mode)
//! 2. Initialize the CYW43439 driver (PIO0, DMA, firmware blobs)
//! 3. Spawn the radio and network stack tasks
//! 4. Join the WPA2 network, retrying with exponential backoff
//! 5. Wait for DHCP (or link up with a static address)
//! ```
//!
//! The radio `Control` must stay alive for the lifetime of the connection;
//! it is handed back to the caller, which keeps it on its stack.
//!
//! [`NetHttpClient`] performs one request per TCP connection over the stack.
//! Offline it fails fast with `HttpError::NetworkDown`.

use crate::task::resources::{Irqs, WifiResources};
use alloc::vec::Vec;
use cyw43::{aligned_bytes, JoinOptions};
use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use embassy_executor::Spawner;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{Config as NetConfig, IpAddress, Ipv4Address, Ipv4Cidr, Stack, StackResources, StaticConfigV4};
use embassy_rp::clocks::RoscRng;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::Pio;
use embassy_time::{with_timeout, Duration, Timer};
use embedded_io_async::Write;
use parking_gate::system::config::{parse_ipv4, WifiConfig};
use parking_gate::system::error::HttpError;
use parking_gate::system::remote::http::{
    encode_request_head, is_complete, parse_response, HttpClient, Request, Response, Url, MAX_RESPONSE_SIZE,
};
use static_cell::StaticCell;

/// Join attempts before running offline
const MAX_WIFI_RETRIES: u32 = 5;

/// Per-attempt join timeout
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// First retry delay; doubles per attempt
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// TCP buffers of the outbound client
const CLIENT_BUFFER_SIZE: usize = 4096;

/// Room for the response head on top of the body limit
const RESPONSE_HEAD_ALLOWANCE: usize = 1024;

/// Sockets: two server workers, one client, DNS
const SOCKET_COUNT: usize = 5;

/// Radio control handle; keep it alive while the network is in use
pub type WifiControl = cyw43::Control<'static>;

/// Bring up WiFi; `None` means the device runs offline
pub async fn initialize_wifi(
    spawner: Spawner,
    config: &WifiConfig,
    r: WifiResources,
) -> Option<(Stack<'static>, WifiControl)> {
    if !config.is_configured() {
        defmt::info!("WiFi not configured (empty SSID), running offline");
        return None;
    }
    defmt::info!("Initializing WiFi with SSID: {}", config.ssid.as_str());

    let fw = aligned_bytes!("../../cyw43-firmware/43439A0.bin");
    let clm = include_bytes!("../../cyw43-firmware/43439A0_clm.bin");
    let nvram = aligned_bytes!("../../cyw43-firmware/nvram_rp2040.bin");

    let pwr = Output::new(r.pwr, Level::Low);
    let cs = Output::new(r.cs, Level::High);
    let mut pio = Pio::new(r.pio, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        r.dio,
        r.clk,
        r.dma,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw, nvram).await;
    spawner.spawn(wifi_task(runner).unwrap());

    control.init(clm).await;
    control.set_power_management(cyw43::PowerManagementMode::None).await;

    let net_config = if config.use_dhcp {
        NetConfig::dhcpv4(Default::default())
    } else {
        let [a, b, c, d] = config.static_ip;
        let [ga, gb, gc, gd] = config.gateway;
        NetConfig::ipv4_static(StaticConfigV4 {
            address: Ipv4Cidr::new(Ipv4Address::new(a, b, c, d), 24),
            gateway: Some(Ipv4Address::new(ga, gb, gc, gd)),
            dns_servers: Default::default(),
        })
    };

    let mut rng = RoscRng;
    let seed = rng.next_u64();
    static RESOURCES: StaticCell<StackResources<SOCKET_COUNT>> = StaticCell::new();
    let (stack, net_runner) = embassy_net::new(net_device, net_config, RESOURCES.init(StackResources::new()), seed);
    spawner.spawn(net_task(net_runner).unwrap());

    let mut backoff = INITIAL_BACKOFF;
    for attempt in 1..=MAX_WIFI_RETRIES {
        defmt::info!("Joining WiFi (attempt {}/{})", attempt, MAX_WIFI_RETRIES);
        let options = JoinOptions::new(config.password.as_bytes());
        match with_timeout(JOIN_TIMEOUT, control.join(config.ssid.as_str(), options)).await {
            Ok(Ok(())) => {
                defmt::info!("WiFi connected");
                stack.wait_link_up().await;
                stack.wait_config_up().await;
                if let Some(v4) = stack.config_v4() {
                    let ip = v4.address.address().octets();
                    defmt::info!("IP address: {}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]);
                }
                return Some((stack, control));
            }
            Ok(Err(_)) => defmt::warn!("WiFi join returned an error"),
            Err(_) => defmt::warn!("WiFi join timed out"),
        }
        // leave() resets the driver state after a failed join
        control.leave().await;
        Timer::after(backoff).await;
        backoff = backoff * 2;
    }

    defmt::error!("WiFi unavailable after {} attempts, running offline", MAX_WIFI_RETRIES);
    None
}

/// IPv4 address once DHCP or the static config is up
pub fn ipv4_address(stack: Stack<'static>) -> Option<[u8; 4]> {
    stack.config_v4().map(|v4| v4.address.address().octets())
}

#[embassy_executor::task]
async fn wifi_task(runner: cyw43::Runner<'static, cyw43::SpiBus<Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

/// HTTP client over the device TCP stack
pub struct NetHttpClient {
    stack: Option<Stack<'static>>,
    rx_buffer: [u8; CLIENT_BUFFER_SIZE],
    tx_buffer: [u8; CLIENT_BUFFER_SIZE],
}

impl NetHttpClient {
    pub fn new(stack: Option<Stack<'static>>) -> Self {
        Self {
            stack,
            rx_buffer: [0; CLIENT_BUFFER_SIZE],
            tx_buffer: [0; CLIENT_BUFFER_SIZE],
        }
    }

    async fn resolve(stack: Stack<'static>, host: &str) -> Result<IpAddress, HttpError> {
        if let Some([a, b, c, d]) = parse_ipv4(host) {
            return Ok(IpAddress::Ipv4(Ipv4Address::new(a, b, c, d)));
        }
        let addresses = stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|_| HttpError::Dns)?;
        addresses.first().copied().ok_or(HttpError::Dns)
    }

    async fn exchange(&mut self, stack: Stack<'static>, request: &Request<'_>, url: &Url<'_>) -> Result<Response, HttpError> {
        let address = Self::resolve(stack, url.host).await?;

        let mut socket = TcpSocket::new(stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket
            .connect((address, url.port))
            .await
            .map_err(|_| HttpError::Connect)?;

        let head = encode_request_head(request, url);
        socket.write_all(head.as_bytes()).await.map_err(|_| HttpError::Io)?;
        socket.write_all(request.body).await.map_err(|_| HttpError::Io)?;
        socket.flush().await.map_err(|_| HttpError::Io)?;

        let mut raw = Vec::new();
        let mut chunk = [0u8; 512];
        loop {
            let n = socket.read(&mut chunk).await.map_err(|_| HttpError::Io)?;
            if n == 0 {
                break;
            }
            if raw.len() + n > MAX_RESPONSE_SIZE + RESPONSE_HEAD_ALLOWANCE {
                socket.abort();
                return Err(HttpError::ResponseTooLarge);
            }
            raw.extend_from_slice(&chunk[..n]);
            if is_complete(&raw) {
                break;
            }
        }
        socket.close();
        parse_response(&raw)
    }
}

impl HttpClient for NetHttpClient {
    async fn send(&mut self, request: &Request<'_>) -> Result<Response, HttpError> {
        let stack = match self.stack {
            Some(stack) if stack.is_config_up() => stack,
            _ => return Err(HttpError::NetworkDown),
        };
        let url = Url::parse(request.url)?;
        with_timeout(request.timeout, self.exchange(stack, request, &url))
            .await
            .map_err(|_| HttpError::Timeout)?
    }
}
