//! Backend and AI service synchronization
//!
//! Four independent exchanges, each tolerant of failure:
//! - capture upload: `POST {backend}/api/capture`, multipart frame + camera id
//! - stats fetch: `GET {backend}/api/slots/stats`
//! - detection: `POST {ai}/analyze`, multipart frame
//! - gate event: `POST {backend}/api/sessions/{entry|exit}`, small JSON
//!
//! Every call returns a `Result`; the coordinator logs failures and keeps
//! the last known good state. Nothing here retries or queues.

pub mod http;
pub mod multipart;

use crate::system::config::Config;
use crate::system::error::SyncError;
use crate::system::sensor::Direction;
use crate::system::state::ParkingStats;
use alloc::vec::Vec;
use embassy_time::Duration;
use http::{join_url, HttpClient, Request, Response};
use serde::{Deserialize, Serialize};

/// Capture upload path
pub const CAPTURE_PATH: &str = "/api/capture";
/// Stats path
pub const STATS_PATH: &str = "/api/slots/stats";
/// Entry event path
pub const ENTRY_PATH: &str = "/api/sessions/entry";
/// Exit event path
pub const EXIT_PATH: &str = "/api/sessions/exit";
/// AI analysis path
pub const ANALYZE_PATH: &str = "/analyze";

/// Stats response envelope
#[derive(Debug, Deserialize)]
struct StatsEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<StatsData>,
}

/// Stats payload; every field may be missing
#[derive(Debug, Default, Deserialize)]
struct StatsData {
    #[serde(default)]
    total: Option<u32>,
    #[serde(default)]
    occupied: Option<u32>,
}

/// AI analysis response
#[derive(Debug, Deserialize)]
struct DetectionResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    vehicles_detected: u32,
}

/// Entry/exit notification body
#[derive(Debug, Serialize)]
struct GateEvent<'a> {
    camera_id: &'a str,
    event_type: &'a str,
}

/// Request builders and response parsers bound to one configuration
#[derive(Debug, Clone)]
pub struct RemoteSync {
    backend_url: &'static str,
    ai_service_url: &'static str,
    camera_id: &'static str,
    http_timeout: Duration,
    detection_timeout: Duration,
}

impl RemoteSync {
    /// Endpoints and timeouts from `config`
    pub fn new(config: &Config) -> Self {
        Self {
            backend_url: config.backend_url,
            ai_service_url: config.ai_service_url,
            camera_id: config.camera_id,
            http_timeout: config.http_timeout,
            detection_timeout: config.detection_timeout,
        }
    }

    /// Upload one frame to the backend
    pub async fn upload_capture<H: HttpClient>(&self, http: &mut H, frame: &[u8]) -> Result<(), SyncError> {
        let body = multipart::encode_frame(frame, Some(self.camera_id))?;
        let url = join_url(self.backend_url, CAPTURE_PATH);
        let request = Request::post(&url, multipart::CONTENT_TYPE, &body, self.http_timeout);
        let response = http.send(&request).await?;
        expect_success(&response)?;
        log_info!("Capture uploaded ({} bytes)", frame.len());
        Ok(())
    }

    /// Fetch stats, merging into `cached`
    ///
    /// On any error the caller keeps `cached` as it is.
    pub async fn fetch_stats<H: HttpClient>(
        &self,
        http: &mut H,
        cached: &ParkingStats,
    ) -> Result<ParkingStats, SyncError> {
        let url = join_url(self.backend_url, STATS_PATH);
        let response = http.send(&Request::get(&url, self.http_timeout)).await?;
        parse_stats(&response, cached)
    }

    /// Send one frame to the AI service, returning the vehicle count
    pub async fn request_detection<H: HttpClient>(&self, http: &mut H, frame: &[u8]) -> Result<u32, SyncError> {
        let body = multipart::encode_frame(frame, None)?;
        let url = join_url(self.ai_service_url, ANALYZE_PATH);
        let request = Request::post(&url, multipart::CONTENT_TYPE, &body, self.detection_timeout);
        let response = http.send(&request).await?;
        parse_detection(&response)
    }

    /// Report a vehicle passing the gate
    pub async fn notify_event<H: HttpClient>(&self, http: &mut H, direction: Direction) -> Result<(), SyncError> {
        let body = encode_event(self.camera_id, direction)?;
        let path = match direction {
            Direction::Entry => ENTRY_PATH,
            Direction::Exit => EXIT_PATH,
        };
        let url = join_url(self.backend_url, path);
        let request = Request::post(&url, "application/json", &body, self.http_timeout);
        let response = http.send(&request).await?;
        expect_success(&response)
    }
}

fn expect_success(response: &Response) -> Result<(), SyncError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(SyncError::Status(response.status))
    }
}

/// Merge a stats response into the cached stats
///
/// Present fields overwrite, absent fields keep their cached value, and
/// `available` is always recomputed locally.
pub fn parse_stats(response: &Response, cached: &ParkingStats) -> Result<ParkingStats, SyncError> {
    expect_success(response)?;
    let envelope: StatsEnvelope = serde_json::from_slice(&response.body).map_err(|_| SyncError::MalformedBody)?;
    if !envelope.success {
        return Err(SyncError::Rejected);
    }
    let data = envelope.data.unwrap_or_default();
    Ok(ParkingStats::from_counts(
        data.total.unwrap_or(cached.total),
        data.occupied.unwrap_or(cached.occupied),
    ))
}

/// Extract the vehicle count from an AI response
pub fn parse_detection(response: &Response) -> Result<u32, SyncError> {
    expect_success(response)?;
    let detection: DetectionResponse =
        serde_json::from_slice(&response.body).map_err(|_| SyncError::MalformedBody)?;
    if !detection.success {
        return Err(SyncError::Rejected);
    }
    Ok(detection.vehicles_detected)
}

/// JSON body of an entry/exit event
pub fn encode_event(camera_id: &str, direction: Direction) -> Result<Vec<u8>, SyncError> {
    serde_json::to_vec(&GateEvent {
        camera_id,
        event_type: direction.as_str(),
    })
    .map_err(|_| SyncError::MalformedBody)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::error::HttpError;
    use crate::system::mock::ScriptedHttp;
    use crate::system::remote::http::{encode_request_head, Method, Request, Url};
    use embassy_futures::block_on;

    fn ok(body: &str) -> Response {
        Response {
            status: 200,
            body: body.as_bytes().to_vec(),
        }
    }

    fn cached() -> ParkingStats {
        ParkingStats::from_counts(10, 7)
    }

    fn sync() -> RemoteSync {
        RemoteSync::new(&Config::default())
    }

    #[test]
    fn stats_success_recomputes_available() {
        let stats = parse_stats(&ok(r#"{"success":true,"data":{"total":4,"occupied":1}}"#), &cached()).unwrap();
        assert_eq!(stats, ParkingStats { total: 4, occupied: 1, available: 3 });
    }

    #[test]
    fn stats_ignores_reported_available() {
        let body = r#"{"success":true,"data":{"total":4,"occupied":1,"available":9}}"#;
        assert_eq!(parse_stats(&ok(body), &cached()).unwrap().available, 3);
    }

    #[test]
    fn stats_clamps_overbooked_lot() {
        let stats = parse_stats(&ok(r#"{"success":true,"data":{"total":3,"occupied":5}}"#), &cached()).unwrap();
        assert_eq!(stats.available, 0);
    }

    #[test]
    fn stats_missing_fields_keep_cached_values() {
        let stats = parse_stats(&ok(r#"{"success":true,"data":{"occupied":2}}"#), &cached()).unwrap();
        assert_eq!(stats, ParkingStats { total: 10, occupied: 2, available: 8 });

        let stats = parse_stats(&ok(r#"{"success":true}"#), &cached()).unwrap();
        assert_eq!(stats, cached());
    }

    #[test]
    fn stats_failures() {
        assert_eq!(parse_stats(&ok(r#"{"success":false}"#), &cached()), Err(SyncError::Rejected));
        assert_eq!(parse_stats(&ok("<html>oops</html>"), &cached()), Err(SyncError::MalformedBody));
        assert_eq!(
            parse_stats(&ok(r#"{"success":true,"data":{"total":-1}}"#), &cached()),
            Err(SyncError::MalformedBody)
        );
        let error = Response {
            status: 500,
            body: Vec::new(),
        };
        assert_eq!(parse_stats(&error, &cached()), Err(SyncError::Status(500)));
    }

    #[test]
    fn detection_count() {
        assert_eq!(parse_detection(&ok(r#"{"success":true,"vehicles_detected":3,"detections":[]}"#)), Ok(3));
        assert_eq!(parse_detection(&ok(r#"{"success":true}"#)), Ok(0));
        assert_eq!(parse_detection(&ok(r#"{"success":false,"error":"x"}"#)), Err(SyncError::Rejected));
        assert_eq!(parse_detection(&ok("not json")), Err(SyncError::MalformedBody));
    }

    #[test]
    fn event_body() {
        let body = encode_event("cam1", Direction::Exit).unwrap();
        assert_eq!(body, br#"{"camera_id":"cam1","event_type":"exit"}"#);
    }

    #[test]
    fn fetch_stats_requests_backend() {
        let mut http = ScriptedHttp::default();
        http.respond(200, r#"{"success":true,"data":{"total":4,"occupied":4}}"#);
        let stats = block_on(sync().fetch_stats(&mut http, &cached())).unwrap();
        assert_eq!(stats.available, 0);

        let sent = &http.requests[0];
        assert_eq!(sent.method, Method::Get);
        assert_eq!(sent.url, "http://192.168.1.100:8080/api/slots/stats");
        assert_eq!(sent.timeout, Duration::from_millis(5000));
    }

    #[test]
    fn upload_posts_multipart_with_camera_id() {
        let mut http = ScriptedHttp::default();
        http.respond(200, "{}");
        block_on(sync().upload_capture(&mut http, &[9; 10])).unwrap();

        let sent = &http.requests[0];
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.url, "http://192.168.1.100:8080/api/capture");
        assert_eq!(sent.content_type.as_deref(), Some(multipart::CONTENT_TYPE));
        let encoded_len = multipart::encoded_len(10, Some("cam1"));
        assert_eq!(sent.body.len(), encoded_len);

        let content_type = sent.content_type.as_deref().unwrap();
        let request = Request::post(&sent.url, content_type, &sent.body, sent.timeout);
        let head = encode_request_head(&request, &Url::parse(&sent.url).unwrap());
        assert!(head.contains(&format!("Content-Length: {}\r\n", encoded_len)));
    }

    #[test]
    fn upload_failure_is_reported() {
        let mut http = ScriptedHttp::default();
        http.fail(HttpError::Timeout);
        assert_eq!(
            block_on(sync().upload_capture(&mut http, &[1, 2, 3])),
            Err(SyncError::Http(HttpError::Timeout))
        );
        http.respond(413, "");
        assert_eq!(block_on(sync().upload_capture(&mut http, &[1, 2, 3])), Err(SyncError::Status(413)));
    }

    #[test]
    fn detection_uses_ai_service_and_long_timeout() {
        let mut http = ScriptedHttp::default();
        http.respond(200, r#"{"success":true,"vehicles_detected":2}"#);
        assert_eq!(block_on(sync().request_detection(&mut http, &[7; 4])), Ok(2));

        let sent = &http.requests[0];
        assert_eq!(sent.url, "http://192.168.1.100:5000/analyze");
        assert_eq!(sent.timeout, Duration::from_millis(15_000));
        assert!(!core::str::from_utf8(&sent.body).unwrap_or("").contains("camera_id"));
    }

    #[test]
    fn gate_events_accept_created() {
        let mut http = ScriptedHttp::default();
        http.respond(201, r#"{"success":true}"#);
        assert_eq!(block_on(sync().notify_event(&mut http, Direction::Entry)), Ok(()));
        assert_eq!(http.requests[0].url, "http://192.168.1.100:8080/api/sessions/entry");
        assert_eq!(http.requests[0].content_type.as_deref(), Some("application/json"));

        http.respond(404, r#"{"success":false}"#);
        assert_eq!(
            block_on(sync().notify_event(&mut http, Direction::Exit)),
            Err(SyncError::Status(404))
        );
        assert_eq!(http.requests[1].url, "http://192.168.1.100:8080/api/sessions/exit");
    }
}
