//! Test doubles for the hardware and network seams

use crate::system::camera::FrameSource;
use crate::system::error::{CameraError, HttpError, SensorError};
use crate::system::gate::{GateDriver, GatePosition};
use crate::system::indicator::{Indicator, IndicatorCommand};
use crate::system::remote::http::{HttpClient, Method, Request, Response};
use crate::system::sensor::{Direction, DistanceSensor};
use crate::system::state::ParkingStats;
use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

/// Frame source serving a fixed frame and counting buffer hand-offs
#[derive(Debug, Default)]
pub struct MockCamera {
    frame: Vec<u8>,
    failures: VecDeque<CameraError>,
    holding: bool,
    pub acquired: usize,
    pub released: usize,
}

impl MockCamera {
    pub fn with_frame(frame: &[u8]) -> Self {
        Self {
            frame: frame.to_vec(),
            ..Self::default()
        }
    }

    /// Queue a failure for an upcoming capture
    pub fn fail_next(&mut self, error: CameraError) {
        self.failures.push_back(error);
    }

    /// A frame is acquired and not yet released
    pub fn outstanding(&self) -> bool {
        self.holding
    }
}

impl FrameSource for MockCamera {
    async fn acquire(&mut self) -> Result<(), CameraError> {
        assert!(!self.holding, "second capture while a frame is outstanding");
        if let Some(error) = self.failures.pop_front() {
            return Err(error);
        }
        self.holding = true;
        self.acquired += 1;
        Ok(())
    }

    fn frame(&self) -> &[u8] {
        &self.frame
    }

    fn release(&mut self) {
        self.holding = false;
        self.released += 1;
    }
}

/// Gate driver remembering every command
#[derive(Debug, Default)]
pub struct RecordingGate {
    pub commands: Vec<GatePosition>,
}

impl RecordingGate {
    pub fn count(&self, position: GatePosition) -> usize {
        self.commands.iter().filter(|p| **p == position).count()
    }
}

impl GateDriver for RecordingGate {
    fn drive(&mut self, position: GatePosition) {
        self.commands.push(position);
    }
}

/// Distance sensor replaying queued readings, then reporting a clear lane
#[derive(Debug, Default)]
pub struct ScriptedSensor {
    readings: VecDeque<Result<f64, SensorError>>,
}

impl ScriptedSensor {
    /// Distance with nothing in front of the sensor
    pub const CLEAR_CM: f64 = 250.0;

    pub fn push(&mut self, reading: Result<f64, SensorError>) {
        self.readings.push_back(reading);
    }
}

impl DistanceSensor for ScriptedSensor {
    async fn measure_cm(&mut self) -> Result<f64, SensorError> {
        self.readings.pop_front().unwrap_or(Ok(Self::CLEAR_CM))
    }
}

/// Owned copy of a request as it was sent
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: Method,
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub timeout: embassy_time::Duration,
}

/// HTTP client replaying queued outcomes; unscripted calls fail to connect
#[derive(Debug, Default)]
pub struct ScriptedHttp {
    outcomes: VecDeque<Result<Response, HttpError>>,
    pub requests: Vec<SentRequest>,
}

impl ScriptedHttp {
    pub fn respond(&mut self, status: u16, body: &str) {
        self.outcomes.push_back(Ok(Response {
            status,
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn fail(&mut self, error: HttpError) {
        self.outcomes.push_back(Err(error));
    }

    /// Requests whose URL ends with `path`
    pub fn sent_to(&self, path: &str) -> usize {
        self.requests.iter().filter(|r| r.url.ends_with(path)).count()
    }
}

impl HttpClient for ScriptedHttp {
    async fn send(&mut self, request: &Request<'_>) -> Result<Response, HttpError> {
        self.requests.push(SentRequest {
            method: request.method,
            url: request.url.into(),
            content_type: request.content_type.map(Into::into),
            body: request.body.to_vec(),
            timeout: request.timeout,
        });
        self.outcomes.pop_front().unwrap_or(Err(HttpError::Connect))
    }
}

/// Indicator remembering every notification
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    pub commands: Vec<IndicatorCommand>,
}

impl RecordingIndicator {
    pub fn count(&self, command: IndicatorCommand) -> usize {
        self.commands.iter().filter(|c| **c == command).count()
    }
}

impl Indicator for RecordingIndicator {
    fn stats_changed(&mut self, stats: &ParkingStats) {
        self.commands.push(IndicatorCommand::Stats(*stats));
    }

    fn parking_full(&mut self) {
        self.commands.push(IndicatorCommand::Full);
    }

    fn gate_opened(&mut self, direction: Direction) {
        self.commands.push(IndicatorCommand::Opened(direction));
    }

    fn gate_closed(&mut self) {
        self.commands.push(IndicatorCommand::Closed);
    }

    fn fatal(&mut self) {
        self.commands.push(IndicatorCommand::Fatal);
    }
}

/// In-memory socket; `disconnect_after` writes succeed, then the peer is gone
#[derive(Debug, Default)]
pub struct MockTransport {
    pub written: Vec<u8>,
    pub writes: usize,
    pub disconnect_after: Option<usize>,
    input: VecDeque<u8>,
}

impl MockTransport {
    pub fn disconnecting_after(writes: usize) -> Self {
        Self {
            disconnect_after: Some(writes),
            ..Self::default()
        }
    }

    /// Transport whose peer sends `request`
    pub fn with_input(request: &str) -> Self {
        Self {
            input: request.bytes().collect(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }
}

impl embedded_io_async::ErrorType for MockTransport {
    type Error = embedded_io_async::ErrorKind;
}

impl embedded_io_async::Write for MockTransport {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.disconnect_after.is_some_and(|limit| self.writes >= limit) {
            return Err(embedded_io_async::ErrorKind::ConnectionReset);
        }
        self.writes += 1;
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }
}

impl embedded_io_async::Read for MockTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;
        while n < buf.len() {
            match self.input.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

/// Delay that returns immediately
#[derive(Debug, Default)]
pub struct NoopDelay {
    pub calls: usize,
}

impl embedded_hal_async::delay::DelayNs for NoopDelay {
    async fn delay_ns(&mut self, _ns: u32) {
        self.calls += 1;
    }
}
