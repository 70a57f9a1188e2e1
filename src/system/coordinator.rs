//! Coordinator
//!
//! Owns every stateful component and runs them in a fixed order on each tick:
//! 1. poll the entry sensor
//! 2. poll the exit sensor
//! 3. advance the gate (auto-close)
//! 4. dispatch due background jobs (capture upload, detection, stats sync)
//! 5. publish a [`DeviceStatus`] snapshot for the HTTP server
//!
//! The stream itself is served by the HTTP server task. The coordinator only
//! reads [`StreamStatus`] and holds detection back while a client is
//! watching; the job stays due and runs on the first tick after the stream
//! ends.
//!
//! Hardware variants are described by [`Capabilities`]: a component whose
//! capability is off is simply absent, and its job is never registered.
//!
//! Network and camera failures end at this boundary. They are logged and the
//! last known good stats stay in place; gate decisions only ever use cached
//! state.

use crate::system::camera::{FrameHandle, FrameSource, SharedCamera};
use crate::system::config::{Capabilities, Config};
use crate::system::error::{CameraError, SyncError};
use crate::system::gate::{GateActuator, GateDriver};
use crate::system::indicator::Indicator;
use crate::system::remote::http::HttpClient;
use crate::system::remote::RemoteSync;
use crate::system::scheduler::{IntervalScheduler, TaskId};
use crate::system::sensor::{Direction, DistanceSensor, SensorGate, TriggerDecision};
use crate::system::state::{ParkingStats, SharedStatus};
use crate::system::stream::StreamStatus;
use embassy_time::Instant;

/// Hardware handed to the coordinator at startup
///
/// Components the hardware variant lacks are `None`.
pub struct Components<S, D, H, I> {
    pub entry_sensor: Option<S>,
    pub exit_sensor: Option<S>,
    pub gate: Option<D>,
    pub http: H,
    pub indicator: I,
}

/// Shared cells the coordinator works with but does not own
pub struct Shared<'a, F: FrameSource> {
    pub camera: &'a SharedCamera<F>,
    pub stream: &'a StreamStatus,
    pub status: &'a SharedStatus,
}

/// Top level control loop state
pub struct Coordinator<'a, S, D, F, H, I>
where
    S: DistanceSensor,
    D: GateDriver,
    F: FrameSource,
    H: HttpClient,
    I: Indicator,
{
    sensor_gate: SensorGate,
    entry_sensor: Option<S>,
    exit_sensor: Option<S>,
    gate: Option<GateActuator<D>>,
    scheduler: IntervalScheduler,
    remote: RemoteSync,
    http: H,
    indicator: I,
    shared: Shared<'a, F>,
    stats: ParkingStats,
    last_vehicles_detected: Option<u32>,
}

impl<'a, S, D, F, H, I> Coordinator<'a, S, D, F, H, I>
where
    S: DistanceSensor,
    D: GateDriver,
    F: FrameSource,
    H: HttpClient,
    I: Indicator,
{
    /// Compose the coordinator for the hardware described by `config.capabilities`
    pub fn new(config: &Config, components: Components<S, D, H, I>, shared: Shared<'a, F>) -> Self {
        let Capabilities {
            gate,
            sensors,
            detection,
            capture_upload,
            ..
        } = config.capabilities;

        let mut scheduler = IntervalScheduler::new();
        if capture_upload {
            scheduler.register(TaskId::CaptureUpload, config.capture_interval);
        }
        if detection {
            scheduler.register(TaskId::Detection, config.detection_interval);
        }
        scheduler.register(TaskId::StatsSync, config.stats_interval);

        Self {
            sensor_gate: SensorGate::new(config.detection_distance_cm, config.sensor_cooldown),
            entry_sensor: components.entry_sensor.filter(|_| sensors),
            exit_sensor: components.exit_sensor.filter(|_| sensors),
            gate: components
                .gate
                .filter(|_| gate)
                .map(|driver| GateActuator::new(driver, config.gate_open_duration)),
            scheduler,
            remote: RemoteSync::new(config),
            http: components.http,
            indicator: components.indicator,
            shared,
            stats: ParkingStats::default(),
            last_vehicles_detected: None,
        }
    }

    /// Fetch stats once before the first tick
    pub async fn start(&mut self, now: Instant) {
        self.refresh_stats().await;
        self.publish(now).await;
    }

    /// One pass of the control loop
    pub async fn tick(&mut self, now: Instant) {
        self.poll_sensor(Direction::Entry, now).await;
        self.poll_sensor(Direction::Exit, now).await;

        if let Some(gate) = self.gate.as_mut() {
            if gate.tick(now) {
                self.indicator.gate_closed();
            }
        }

        for id in self.scheduler.due_tasks(now) {
            if id == TaskId::Detection && self.shared.stream.is_active() {
                // Stays due; runs once the stream ends
                continue;
            }
            self.run_task(id).await;
            self.scheduler.fired(id, now);
        }

        self.publish(now).await;
    }

    /// Last known good stats
    pub fn stats(&self) -> ParkingStats {
        self.stats
    }

    /// Gate state machine, if the hardware has a gate
    pub fn gate(&self) -> Option<&GateActuator<D>> {
        self.gate.as_ref()
    }

    /// Cooldown state
    pub fn sensor_gate(&self) -> &SensorGate {
        &self.sensor_gate
    }

    /// Job schedule
    pub fn scheduler(&self) -> &IntervalScheduler {
        &self.scheduler
    }

    /// HTTP client
    pub fn http(&self) -> &H {
        &self.http
    }

    /// Indicator
    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Vehicle count from the last successful detection
    pub fn last_vehicles_detected(&self) -> Option<u32> {
        self.last_vehicles_detected
    }

    async fn poll_sensor(&mut self, direction: Direction, now: Instant) {
        let sensor = match direction {
            Direction::Entry => self.entry_sensor.as_mut(),
            Direction::Exit => self.exit_sensor.as_mut(),
        };
        let Some(sensor) = sensor else {
            return;
        };
        let distance = match sensor.measure_cm().await {
            Ok(distance) => distance,
            Err(e) => {
                log_debug!("{} sensor: {:?}", direction.as_str(), e);
                return;
            }
        };
        match self.sensor_gate.evaluate(direction, distance, now) {
            TriggerDecision::Triggered(direction) => self.vehicle_detected(direction, now).await,
            TriggerDecision::Suppressed => {
                log_debug!("{} sensor in cooldown", direction.as_str());
            }
            TriggerDecision::Clear => {}
        }
    }

    async fn vehicle_detected(&mut self, direction: Direction, now: Instant) {
        log_info!("Vehicle at {} sensor", direction.as_str());
        if direction == Direction::Entry && !self.stats.has_space() {
            log_info!("Parking full, entry refused");
            self.indicator.parking_full();
            return;
        }
        let Some(gate) = self.gate.as_mut() else {
            return;
        };
        if !gate.open(now) {
            return;
        }
        self.indicator.gate_opened(direction);
        if let Err(e) = self.remote.notify_event(&mut self.http, direction).await {
            log_warn!("{} event not delivered: {:?}", direction.as_str(), e);
        }
    }

    async fn run_task(&mut self, id: TaskId) {
        let result = match id {
            TaskId::StatsSync => {
                self.refresh_stats().await;
                Ok(())
            }
            TaskId::CaptureUpload => self.capture_upload().await,
            TaskId::Detection => self.detect_vehicles().await,
        };
        match result {
            Ok(()) => {}
            Err(SyncError::OutOfMemory) => log_error!("{:?}: out of memory for request body", id),
            Err(e) => log_warn!("{:?} failed: {:?}", id, e),
        }
    }

    async fn refresh_stats(&mut self) {
        match self.remote.fetch_stats(&mut self.http, &self.stats).await {
            Ok(stats) => {
                log_info!("Slots available: {}/{}", stats.available, stats.total);
                self.stats = stats;
                self.indicator.stats_changed(&stats);
            }
            Err(e) => log_warn!("Stats refresh failed, keeping cached: {:?}", e),
        }
    }

    async fn capture_upload(&mut self) -> Result<(), SyncError> {
        let camera = self.shared.camera;
        let mut camera = camera.try_lock().map_err(|_| CameraError::Busy)?;
        let frame = FrameHandle::acquire(&mut *camera).await?;
        self.remote.upload_capture(&mut self.http, frame.bytes()).await
    }

    async fn detect_vehicles(&mut self) -> Result<(), SyncError> {
        let camera = self.shared.camera;
        let mut camera = camera.try_lock().map_err(|_| CameraError::Busy)?;
        let frame = FrameHandle::acquire(&mut *camera).await?;
        let vehicles = self.remote.request_detection(&mut self.http, frame.bytes()).await?;
        log_info!("AI detection: {} vehicles", vehicles);
        self.last_vehicles_detected = Some(vehicles);
        Ok(())
    }

    async fn publish(&mut self, now: Instant) {
        let mut status = self.shared.status.lock().await;
        status.stats = self.stats;
        status.gate_open = self.gate.as_ref().is_some_and(|gate| gate.is_open());
        status.last_vehicles_detected = self.last_vehicles_detected;
        status.uptime_ms = now.as_millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::error::SensorError;
    use crate::system::gate::{GatePosition, GateState};
    use crate::system::indicator::IndicatorCommand;
    use crate::system::mock::{MockCamera, RecordingGate, RecordingIndicator, ScriptedHttp, ScriptedSensor};
    use crate::system::state::shared_status;
    use embassy_futures::block_on;
    use embassy_time::Duration;

    type TestCoordinator<'a> = Coordinator<'a, ScriptedSensor, RecordingGate, MockCamera, ScriptedHttp, RecordingIndicator>;

    const JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

    struct Cells {
        camera: SharedCamera<MockCamera>,
        stream: StreamStatus,
        status: SharedStatus,
    }

    impl Cells {
        fn new() -> Self {
            Self {
                camera: SharedCamera::new(MockCamera::with_frame(&JPEG)),
                stream: StreamStatus::new(),
                status: shared_status(),
            }
        }

        fn shared(&self) -> Shared<'_, MockCamera> {
            Shared {
                camera: &self.camera,
                stream: &self.stream,
                status: &self.status,
            }
        }
    }

    fn stats_body(total: u32, occupied: u32) -> std::string::String {
        std::format!(r#"{{"success":true,"data":{{"total":{},"occupied":{}}}}}"#, total, occupied)
    }

    /// Coordinator with full hardware; `http` already holds the startup stats response
    fn coordinator<'a>(
        cells: &'a Cells,
        entry: ScriptedSensor,
        exit: ScriptedSensor,
        http: ScriptedHttp,
    ) -> TestCoordinator<'a> {
        let components = Components {
            entry_sensor: Some(entry),
            exit_sensor: Some(exit),
            gate: Some(RecordingGate::default()),
            http,
            indicator: RecordingIndicator::default(),
        };
        let mut coordinator = Coordinator::new(&Config::default(), components, cells.shared());
        block_on(coordinator.start(Instant::from_millis(0)));
        coordinator
    }

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn vehicle_at(cm: f64) -> ScriptedSensor {
        let mut sensor = ScriptedSensor::default();
        sensor.push(Ok(cm));
        sensor
    }

    fn gate_commands(c: &TestCoordinator<'_>) -> std::vec::Vec<GatePosition> {
        c.gate().map(|g| g.driver().commands.clone()).unwrap_or_default()
    }

    #[test]
    fn startup_fetches_stats() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 1));
        let c = coordinator(&cells, ScriptedSensor::default(), ScriptedSensor::default(), http);

        assert_eq!(c.stats(), ParkingStats::from_counts(4, 1));
        assert_eq!(c.indicator().commands, [IndicatorCommand::Stats(ParkingStats::from_counts(4, 1))]);
        assert_eq!(block_on(cells.status.lock()).stats.available, 3);
        assert_eq!(gate_commands(&c), [GatePosition::Closed]);
    }

    #[test]
    fn entry_with_space_opens_and_auto_closes() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 2));
        http.respond(201, r#"{"success":true}"#);
        let mut c = coordinator(&cells, vehicle_at(12.0), ScriptedSensor::default(), http);

        block_on(c.tick(at(1000)));
        assert_eq!(c.gate().map(|g| g.state()), Some(GateState::Open { opened_at: at(1000) }));
        assert_eq!(c.http().sent_to("/api/sessions/entry"), 1);
        assert_eq!(c.sensor_gate().disabled_until(Direction::Exit), at(4000));
        assert!(c.indicator().commands.contains(&IndicatorCommand::Opened(Direction::Entry)));
        assert!(block_on(cells.status.lock()).gate_open);

        block_on(c.tick(at(5999)));
        assert!(c.gate().is_some_and(|g| g.is_open()));

        block_on(c.tick(at(6001)));
        assert!(!c.gate().is_some_and(|g| g.is_open()));
        assert_eq!(
            gate_commands(&c),
            [GatePosition::Closed, GatePosition::Open, GatePosition::Closed]
        );
        assert_eq!(c.indicator().count(IndicatorCommand::Closed), 1);
        assert!(!block_on(cells.status.lock()).gate_open);
        // Stats untouched by the gate event
        assert_eq!(c.stats().available, 2);
    }

    #[test]
    fn entry_when_full_stays_closed() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 4));
        let mut c = coordinator(&cells, vehicle_at(5.0), ScriptedSensor::default(), http);

        block_on(c.tick(at(1000)));
        assert_eq!(gate_commands(&c), [GatePosition::Closed]);
        assert_eq!(c.http().sent_to("/api/sessions/entry"), 0);
        assert_eq!(c.indicator().count(IndicatorCommand::Full), 1);
        assert!(!c.indicator().commands.iter().any(|cmd| matches!(cmd, IndicatorCommand::Opened(_))));
    }

    #[test]
    fn exit_opens_even_when_full() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 4));
        http.respond(200, r#"{"success":true}"#);
        let mut c = coordinator(&cells, ScriptedSensor::default(), vehicle_at(8.0), http);

        block_on(c.tick(at(1000)));
        assert!(c.gate().is_some_and(|g| g.is_open()));
        assert_eq!(c.http().sent_to("/api/sessions/exit"), 1);
        assert_eq!(c.sensor_gate().disabled_until(Direction::Entry), at(4000));
    }

    #[test]
    fn same_vehicle_seen_by_exit_is_not_counted() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 0));
        http.respond(201, "{}");
        let mut exit = ScriptedSensor::default();
        exit.push(Ok(ScriptedSensor::CLEAR_CM));
        exit.push(Ok(6.0));
        let mut c = coordinator(&cells, vehicle_at(10.0), exit, http);

        block_on(c.tick(at(1000)));
        block_on(c.tick(at(2000)));
        assert_eq!(c.http().sent_to("/api/sessions/exit"), 0);
        assert_eq!(c.http().sent_to("/api/sessions/entry"), 1);
    }

    #[test]
    fn failed_notification_does_not_block_gate() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 0));
        http.fail(crate::system::error::HttpError::Timeout);
        let mut c = coordinator(&cells, vehicle_at(10.0), ScriptedSensor::default(), http);

        block_on(c.tick(at(1000)));
        assert!(c.gate().is_some_and(|g| g.is_open()));
    }

    #[test]
    fn sensor_timeout_changes_nothing() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 0));
        let mut entry = ScriptedSensor::default();
        entry.push(Err(SensorError::Timeout));
        let mut c = coordinator(&cells, entry, ScriptedSensor::default(), http);

        block_on(c.tick(at(1000)));
        assert_eq!(gate_commands(&c), [GatePosition::Closed]);
        assert_eq!(c.sensor_gate().disabled_until(Direction::Exit), at(0));
    }

    #[test]
    fn detection_held_back_while_streaming() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 0));
        http.respond(200, r#"{"success":true,"vehicles_detected":2}"#);
        let mut c = coordinator(&cells, ScriptedSensor::default(), ScriptedSensor::default(), http);

        let watching = cells.stream.try_begin();
        assert!(watching.is_some());
        assert!(c.scheduler().due_tasks(at(5000)).contains(&TaskId::Detection));
        block_on(c.tick(at(5000)));
        assert_eq!(c.http().sent_to("/analyze"), 0);
        assert!(c.scheduler().due_tasks(at(5100)).contains(&TaskId::Detection));

        drop(watching);
        block_on(c.tick(at(5100)));
        assert_eq!(c.http().sent_to("/analyze"), 1);
        assert_eq!(c.last_vehicles_detected(), Some(2));
        assert_eq!(block_on(cells.status.lock()).last_vehicles_detected, Some(2));
        assert_eq!(cells.camera.try_lock().map(|cam| cam.outstanding()).ok(), Some(false));
    }

    #[test]
    fn background_jobs_keep_cached_stats_on_failure() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 1));
        // At 10 s all three jobs are due, in registration order
        http.respond(200, "{}");
        http.respond(200, r#"{"success":true,"vehicles_detected":1}"#);
        http.respond(200, r#"{"success":false}"#);
        let mut c = coordinator(&cells, ScriptedSensor::default(), ScriptedSensor::default(), http);

        block_on(c.tick(at(10_000)));
        let urls: std::vec::Vec<_> = c.http().requests.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "http://192.168.1.100:8080/api/slots/stats",
                "http://192.168.1.100:8080/api/capture",
                "http://192.168.1.100:5000/analyze",
                "http://192.168.1.100:8080/api/slots/stats",
            ]
        );
        assert_eq!(c.stats(), ParkingStats::from_counts(4, 1));
        assert!(c.scheduler().due_tasks(at(10_001)).is_empty());
    }

    #[test]
    fn frame_failure_still_counts_as_fired() {
        let cells = Cells::new();
        block_on(cells.camera.lock()).fail_next(CameraError::CaptureFailed);
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 1));
        let mut c = coordinator(&cells, ScriptedSensor::default(), ScriptedSensor::default(), http);

        block_on(c.tick(at(10_000)));
        assert_eq!(c.http().sent_to("/api/capture"), 0);
        assert_eq!(
            c.scheduler().task(TaskId::CaptureUpload).map(|t| t.last_fired_at),
            Some(at(10_000))
        );
        assert_eq!(cells.camera.try_lock().map(|cam| cam.outstanding()).ok(), Some(false));
    }

    #[test]
    fn camera_only_variant_has_no_gate() {
        let cells = Cells::new();
        let mut http = ScriptedHttp::default();
        http.respond(200, &stats_body(4, 1));
        let config = Config::default().with_capabilities(Capabilities::CAMERA_ONLY);
        let components = Components {
            entry_sensor: Some(vehicle_at(3.0)),
            exit_sensor: None,
            gate: Some(RecordingGate::default()),
            http,
            indicator: RecordingIndicator::default(),
        };
        let mut c: TestCoordinator<'_> = Coordinator::new(&config, components, cells.shared());
        block_on(c.start(at(0)));

        assert!(c.gate().is_none());
        assert!(!c.scheduler().is_registered(TaskId::CaptureUpload));
        assert!(c.scheduler().is_registered(TaskId::Detection));

        block_on(c.tick(at(1000)));
        assert_eq!(c.sensor_gate().disabled_until(Direction::Exit), at(0));
        assert!(!block_on(cells.status.lock()).gate_open);
        assert_eq!(c.scheduler().task(TaskId::StatsSync).map(|t| t.interval), Some(Duration::from_millis(10_000)));
    }
}
