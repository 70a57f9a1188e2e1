//! Device HTTP server
//!
//! | Route      | Response                                   |
//! |------------|--------------------------------------------|
//! | `/`        | HTML status page with the live stream      |
//! | `/stream`  | MJPEG stream, one client at a time         |
//! | `/capture` | single JPEG frame                          |
//! | `/status`  | JSON status snapshot                       |
//! | `/restart` | JSON ack; the caller resets after a delay  |
//!
//! Only `GET` is served. Every response carries
//! `Access-Control-Allow-Origin: *` and closes the connection, except the
//! stream which runs until the client leaves.

use crate::system::camera::{FrameHandle, FrameSource, SharedCamera};
use crate::system::config::Config;
use crate::system::error::ServerError;
use crate::system::remote::http::find;
use crate::system::state::{DeviceStatus, SharedStatus};
use crate::system::stream::{StreamSession, StreamStatus, RESPONSE_HEAD};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, Write};
use serde::Serialize;

/// Receive buffer for the request head
pub const REQUEST_BUFFER_SIZE: usize = 1024;

/// Served routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum Route {
    Root,
    Stream,
    Capture,
    Status,
    Restart,
    /// Known path, method other than `GET`
    MethodNotAllowed,
    NotFound,
}

/// What the connection handler asks of its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "rp2350", derive(defmt::Format))]
pub enum Outcome {
    /// Response sent, close the connection
    Done(Route),
    /// Restart ack sent; reset the device after the restart delay
    Restart,
}

/// Everything a server worker reads
pub struct ServerContext<'a, F: FrameSource> {
    pub config: &'a Config,
    pub camera: &'a SharedCamera<F>,
    pub stream: &'a StreamStatus,
    pub status: &'a SharedStatus,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    device: &'a str,
    ip: &'a str,
    stream_url: &'a str,
    available_slots: u32,
    total_slots: u32,
    gate_open: bool,
    stream_active: bool,
    camera_ready: bool,
    last_vehicles_detected: Option<u32>,
    uptime_ms: u64,
}

#[derive(Serialize)]
struct RestartBody<'a> {
    success: bool,
    message: &'a str,
}

/// Map method and path to a route
pub fn route(method: &str, path: &str) -> Route {
    let route = match path {
        "/" => Route::Root,
        "/stream" => Route::Stream,
        "/capture" => Route::Capture,
        "/status" => Route::Status,
        "/restart" => Route::Restart,
        _ => return Route::NotFound,
    };
    if method == "GET" {
        route
    } else {
        Route::MethodNotAllowed
    }
}

/// Method and path (query stripped) from the request head
pub fn parse_request_line(head: &[u8]) -> Result<(&str, &str), ServerError> {
    let end = find(head, b"\r\n").ok_or(ServerError::MalformedRequest)?;
    let line = core::str::from_utf8(&head[..end]).map_err(|_| ServerError::MalformedRequest)?;
    let mut parts = line.split(' ');
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ServerError::MalformedRequest);
    };
    if method.is_empty() || !target.starts_with('/') || !version.starts_with("HTTP/") {
        return Err(ServerError::MalformedRequest);
    }
    let path = target.split('?').next().unwrap_or(target);
    Ok((method, path))
}

/// Read until the end of the request head, returning its length
pub async fn read_request_head<R: Read>(socket: &mut R, buf: &mut [u8]) -> Result<usize, ServerError> {
    let mut len = 0;
    loop {
        if let Some(end) = find(&buf[..len], b"\r\n\r\n") {
            return Ok(end + 4);
        }
        if len == buf.len() {
            return Err(ServerError::RequestTooLarge);
        }
        match socket.read(&mut buf[len..]).await {
            Ok(0) => return Err(ServerError::MalformedRequest),
            Ok(n) => len += n,
            Err(_) => return Err(ServerError::Io),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// Status line and headers of a complete response
pub fn response_head(
    status: u16,
    content_type: &str,
    content_length: usize,
    extra_headers: &str,
) -> Result<heapless::String<256>, ServerError> {
    let mut head = heapless::String::new();
    write!(
        head,
        "HTTP/1.1 {} {}\r\nAccess-Control-Allow-Origin: *\r\nContent-Type: {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        status,
        reason(status),
        content_type,
        content_length,
        extra_headers
    )
    .map_err(|_| ServerError::Io)?;
    Ok(head)
}

async fn respond<W: Write>(socket: &mut W, status: u16, content_type: &str, body: &[u8]) -> Result<(), ServerError> {
    let head = response_head(status, content_type, body.len(), "")?;
    socket.write_all(head.as_bytes()).await.map_err(|_| ServerError::Io)?;
    socket.write_all(body).await.map_err(|_| ServerError::Io)?;
    socket.flush().await.map_err(|_| ServerError::Io)
}

/// Dotted quad, `0.0.0.0` before the network is up
pub fn format_ip(ip: Option<[u8; 4]>) -> heapless::String<15> {
    let [a, b, c, d] = ip.unwrap_or_default();
    let mut text = heapless::String::new();
    // 15 characters always fit
    let _ = write!(text, "{}.{}.{}.{}", a, b, c, d);
    text
}

/// JSON body of `/status`
pub fn status_json(config: &Config, status: &DeviceStatus, stream_active: bool) -> Result<Vec<u8>, ServerError> {
    let ip = format_ip(status.ip);
    let mut stream_url = String::new();
    write!(stream_url, "http://{}/stream", ip).map_err(|_| ServerError::Io)?;
    serde_json::to_vec(&StatusBody {
        device: config.device_name,
        ip: &ip,
        stream_url: &stream_url,
        available_slots: status.stats.available,
        total_slots: status.stats.total,
        gate_open: status.gate_open,
        stream_active,
        camera_ready: status.camera_ready,
        last_vehicles_detected: status.last_vehicles_detected,
        uptime_ms: status.uptime_ms,
    })
    .map_err(|_| ServerError::Io)
}

/// JSON body of `/restart`
pub fn restart_json(config: &Config) -> Result<Vec<u8>, ServerError> {
    let mut message = String::new();
    write!(message, "Restarting in {} seconds...", config.restart_delay.as_secs()).map_err(|_| ServerError::Io)?;
    serde_json::to_vec(&RestartBody {
        success: true,
        message: &message,
    })
    .map_err(|_| ServerError::Io)
}

/// HTML page of `/`
pub fn root_page(config: &Config, status: &DeviceStatus, stream_active: bool) -> Result<String, ServerError> {
    let mut page = String::new();
    write!(
        page,
        "<!DOCTYPE html><html><head><meta charset='utf-8'><title>{name}</title></head><body>\
         <h1>{name}</h1>\
         <p>Available: {available}/{total}</p>\
         <p>Gate: {gate}</p>\
         <p>Stream: {stream}</p>\
         <img src='/stream' width='640'>\
         <p><a href='/capture'>Capture</a> | <a href='/status'>Status</a></p>\
         </body></html>",
        name = config.device_name,
        available = status.stats.available,
        total = status.stats.total,
        gate = if status.gate_open { "open" } else { "closed" },
        stream = if stream_active { "watching" } else { "idle" },
    )
    .map_err(|_| ServerError::Io)?;
    Ok(page)
}

/// Serve one connection
///
/// `/stream` keeps the connection until the client goes away; `delay`
/// paces its frames.
pub async fn handle_connection<S, F, D>(
    ctx: &ServerContext<'_, F>,
    socket: &mut S,
    delay: &mut D,
) -> Result<Outcome, ServerError>
where
    S: Read + Write,
    F: FrameSource,
    D: DelayNs,
{
    let mut buf = [0u8; REQUEST_BUFFER_SIZE];
    let parsed = match read_request_head(socket, &mut buf).await {
        Ok(len) => parse_request_line(&buf[..len]).map(|(method, path)| route(method, path)),
        Err(e) => Err(e),
    };
    let route = match parsed {
        Ok(route) => route,
        Err(ServerError::Io) => return Err(ServerError::Io),
        Err(e) => {
            let _ = respond(socket, 400, "text/plain", b"Bad Request").await;
            return Err(e);
        }
    };
    log_debug!("HTTP {:?}", route);

    match route {
        Route::Root => {
            let snapshot = *ctx.status.lock().await;
            let page = root_page(ctx.config, &snapshot, ctx.stream.is_active())?;
            respond(socket, 200, "text/html", page.as_bytes()).await?;
        }
        Route::Status => {
            let snapshot = *ctx.status.lock().await;
            let body = status_json(ctx.config, &snapshot, ctx.stream.is_active())?;
            respond(socket, 200, "application/json", &body).await?;
        }
        Route::Capture => serve_capture(ctx, socket).await?,
        Route::Stream => serve_stream(ctx, socket, delay).await?,
        Route::Restart => {
            let body = restart_json(ctx.config)?;
            respond(socket, 200, "application/json", &body).await?;
            log_warn!("Restart requested over HTTP");
            return Ok(Outcome::Restart);
        }
        Route::MethodNotAllowed => respond(socket, 405, "text/plain", b"Method Not Allowed").await?,
        Route::NotFound => respond(socket, 404, "text/plain", b"Not Found").await?,
    }
    Ok(Outcome::Done(route))
}

async fn serve_capture<S: Write, F: FrameSource>(ctx: &ServerContext<'_, F>, socket: &mut S) -> Result<(), ServerError> {
    let mut camera = ctx.camera.lock().await;
    let frame = match FrameHandle::acquire(&mut *camera).await {
        Ok(frame) => frame,
        Err(e) => {
            log_warn!("Capture for HTTP client failed: {:?}", e);
            return respond(socket, 500, "text/plain", b"Camera capture failed").await;
        }
    };
    let head = response_head(
        200,
        "image/jpeg",
        frame.len(),
        "Content-Disposition: inline; filename=capture.jpg\r\n",
    )?;
    socket.write_all(head.as_bytes()).await.map_err(|_| ServerError::Io)?;
    socket.write_all(frame.bytes()).await.map_err(|_| ServerError::Io)?;
    socket.flush().await.map_err(|_| ServerError::Io)
}

async fn serve_stream<S, F, D>(ctx: &ServerContext<'_, F>, socket: &mut S, delay: &mut D) -> Result<(), ServerError>
where
    S: Write,
    F: FrameSource,
    D: DelayNs,
{
    if !ctx.config.capabilities.stream {
        return respond(socket, 404, "text/plain", b"Not Found").await;
    }
    let Some(guard) = ctx.stream.try_begin() else {
        log_info!("Stream busy, rejecting second client");
        return respond(socket, 503, "text/plain", b"Stream busy").await;
    };
    log_info!("Stream client connected");
    socket
        .write_all(RESPONSE_HEAD.as_bytes())
        .await
        .map_err(|_| ServerError::Io)?;
    let mut session = StreamSession::new(ctx.camera, guard, ctx.config.stream_frame_delay);
    session.serve(socket, delay).await;
    Ok(())
}
