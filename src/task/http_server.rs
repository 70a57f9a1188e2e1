//! HTTP server workers
//!
//! Each worker owns one listening socket on port 80 and serves one
//! connection at a time. Two workers run, so `/status` and `/restart` stay
//! reachable while the other worker is busy streaming.

use crate::task::camera::ArduCam;
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{Delay, Duration, Timer};
use parking_gate::system::server::{handle_connection, Outcome, ServerContext};

/// Number of concurrent connections
pub const HTTP_WORKERS: usize = 2;

const PORT: u16 = 80;
const SOCKET_BUFFER_SIZE: usize = 4096;

/// Drop clients that stop reading or sending
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

#[embassy_executor::task(pool_size = HTTP_WORKERS)]
pub async fn http_server(worker: usize, stack: Stack<'static>, ctx: &'static ServerContext<'static, ArduCam<'static>>) {
    let mut rx_buffer = [0u8; SOCKET_BUFFER_SIZE];
    let mut tx_buffer = [0u8; SOCKET_BUFFER_SIZE];
    let mut delay = Delay;

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        if let Err(e) = socket.accept(PORT).await {
            defmt::warn!("HTTP worker {}: accept failed: {:?}", worker, e);
            continue;
        }

        let outcome = handle_connection(ctx, &mut socket, &mut delay).await;
        let _ = socket.flush().await;
        socket.close();

        match outcome {
            Ok(Outcome::Done(route)) => defmt::debug!("HTTP worker {}: served {:?}", worker, route),
            Ok(Outcome::Restart) => {
                Timer::after(ctx.config.restart_delay).await;
                defmt::warn!("Restarting");
                cortex_m::peripheral::SCB::sys_reset();
            }
            Err(e) => defmt::warn!("HTTP worker {}: {:?}", worker, e),
        }
    }
}
