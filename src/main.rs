//! Parking gate firmware entry point
//!
//! Initializes the hardware, checks the camera, brings up WiFi and spawns the
//! coordinator, HTTP server and indicator tasks.

#![no_std]
#![no_main]

extern crate alloc;

use crate::task::{
    camera::{ArduCam, FRAME_BUFFER_SIZE},
    coordinate::coordinate,
    http_server::{http_server, HTTP_WORKERS},
    indicate::indicate,
    network::{initialize_wifi, ipv4_address, NetHttpClient},
    resources::AssignedResources,
    servo::gate_servo,
    ultrasonic::HcSr04,
};
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_time::Timer;
use embedded_alloc::LlffHeap as Heap;
use parking_gate::system::camera::SharedCamera;
use parking_gate::system::config::{Config, WifiConfig};
use parking_gate::system::coordinator::{Components, Coordinator, Shared};
use parking_gate::system::indicator::{ChannelIndicator, Indicator, IndicatorChannel};
use parking_gate::system::server::ServerContext;
use parking_gate::system::state::{shared_status, SharedStatus};
use parking_gate::system::stream::StreamStatus;
use static_cell::{ConstStaticCell, StaticCell};
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

#[global_allocator]
static HEAP: Heap = Heap::empty();

/// Multipart bodies hold a whole frame, so the heap must fit one plus HTTP responses
const HEAP_SIZE: usize = 96 * 1024;

/// Task implementations
mod task;

static INDICATOR: IndicatorChannel = IndicatorChannel::new();
static STREAM: StreamStatus = StreamStatus::new();
static STATUS: SharedStatus = shared_status();
static FRAME_BUFFER: ConstStaticCell<[u8; FRAME_BUFFER_SIZE]> = ConstStaticCell::new([0; FRAME_BUFFER_SIZE]);

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    {
        static mut HEAP_MEM: [u8; HEAP_SIZE] = [0; HEAP_SIZE];
        unsafe { HEAP.init(core::ptr::addr_of_mut!(HEAP_MEM) as *mut u8 as usize, HEAP_SIZE) }
    }

    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    static CONFIG: StaticCell<Config> = StaticCell::new();
    let config: &'static Config = CONFIG.init(Config::from_build_env());
    defmt::info!("{} ({}) starting", config.device_name, config.camera_id);

    spawner.spawn(indicate(r.indicator, &INDICATOR).unwrap());

    // A missing camera is the one fatal condition: no gate logic without it,
    // but WiFi and the HTTP server still come up so /restart is reachable.
    let mut camera = ArduCam::new(r.camera, FRAME_BUFFER.take());
    let camera_ready = match camera.probe().await {
        Ok(()) => true,
        Err(e) => {
            defmt::error!("Camera startup failed: {:?}", e);
            ChannelIndicator::new(&INDICATOR).fatal();
            false
        }
    };
    STATUS.lock().await.camera_ready = camera_ready;

    static CAMERA: StaticCell<SharedCamera<ArduCam<'static>>> = StaticCell::new();
    let camera = CAMERA.init(SharedCamera::new(camera));

    let network = initialize_wifi(spawner, &WifiConfig::from_build_env(), r.wifi).await;
    let stack = network.as_ref().map(|(stack, _)| *stack);

    if let Some(stack) = stack {
        STATUS.lock().await.ip = ipv4_address(stack);

        static SERVER: StaticCell<ServerContext<'static, ArduCam<'static>>> = StaticCell::new();
        let ctx: &'static ServerContext<'static, ArduCam<'static>> = SERVER.init(ServerContext {
            config,
            camera,
            stream: &STREAM,
            status: &STATUS,
        });
        for worker in 0..HTTP_WORKERS {
            spawner.spawn(http_server(worker, stack, ctx).unwrap());
        }
        defmt::info!("HTTP server listening on port 80");
    }

    if camera_ready {
        let components = Components {
            entry_sensor: Some(HcSr04::new(r.entry_sensor.trigger_pin, r.entry_sensor.echo_pin)),
            exit_sensor: Some(HcSr04::new(r.exit_sensor.trigger_pin, r.exit_sensor.echo_pin)),
            gate: config.capabilities.gate.then(|| gate_servo(r.gate_servo, config)),
            http: NetHttpClient::new(stack),
            indicator: ChannelIndicator::new(&INDICATOR),
        };
        let shared = Shared {
            camera,
            stream: &STREAM,
            status: &STATUS,
        };
        let coordinator = Coordinator::new(config, components, shared);
        spawner.spawn(coordinate(coordinator, config.tick_interval).unwrap());
    }

    // The radio control handle has to outlive the connection
    let _network = network;
    loop {
        Timer::after_secs(3600).await;
    }
}
