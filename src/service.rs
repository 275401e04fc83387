//! Client for the remote story-generation service.

use std::sync::LazyLock;

use log::{debug, info};
use regex::Regex;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ServiceConfig;

static JOB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("job id pattern is valid"));

/// Errors talking to the story service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("could not reach story service: {0}")]
    Network(String),

    #[error("story service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not decode story service response: {0}")]
    Decode(String),

    /// Job ids end up in a URL path, so anything outside `[A-Za-z0-9_-]` is refused.
    #[error("invalid job id '{0}'")]
    InvalidJobId(String),
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Answer to a story creation request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedJob {
    pub job_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
}

/// State of a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub story_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Service seam
// ---------------------------------------------------------------------------

/// The three calls the game needs from the story service.
pub trait StoryService {
    /// Submit a new story for generation.
    fn create_story(&self, theme: &str) -> Result<CreatedJob, ServiceError>;

    /// Look up a generation job. Callers poll this until the job is done.
    fn poll_job(&self, job_id: &str) -> Result<JobReport, ServiceError>;

    /// Fetch a finished story with every node, in its raw wire form.
    fn fetch_complete_story(&self, story_id: i64) -> Result<Value, ServiceError>;
}

pub fn validate_job_id(job_id: &str) -> Result<&str, ServiceError> {
    if JOB_ID.is_match(job_id) {
        Ok(job_id)
    } else {
        Err(ServiceError::InvalidJobId(job_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

pub struct HttpStoryService {
    client: Client,
    base_url: String,
}

impl HttpStoryService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        info!(
            "Story service at {} (timeout {:?})",
            config.base_url, config.timeout
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Turn non-2xx responses into `ServiceError::Api` with the body as message.
fn check(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().unwrap_or_default();
    Err(ServiceError::Api {
        status: status.as_u16(),
        message,
    })
}

impl StoryService for HttpStoryService {
    fn create_story(&self, theme: &str) -> Result<CreatedJob, ServiceError> {
        info!("Requesting story with theme \"{theme}\"");
        let response = self
            .client
            .post(self.url("stories/create"))
            .json(&json!({ "theme": theme }))
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let job: CreatedJob = check(response)?
            .json()
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        debug!("Created job {job:?}");
        Ok(job)
    }

    fn poll_job(&self, job_id: &str) -> Result<JobReport, ServiceError> {
        let job_id = validate_job_id(job_id)?;
        let response = self
            .client
            .get(self.url(&format!("jobs/{job_id}")))
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let report: JobReport = check(response)?
            .json()
            .map_err(|e| ServiceError::Decode(e.to_string()))?;
        debug!("Job {} is {:?}", report.job_id, report.status);
        Ok(report)
    }

    fn fetch_complete_story(&self, story_id: i64) -> Result<Value, ServiceError> {
        info!("Fetching story {story_id}");
        let response = self
            .client
            .get(self.url(&format!("stories/{story_id}/complete")))
            .send()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        check(response)?
            .json()
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// What a one-shot responder saw: request line and body.
    struct Captured {
        request_line: String,
        body: String,
    }

    /// Serve exactly one request with a canned response, then stop.
    fn respond_once(status: &str, body: &'static str) -> (ServiceConfig, JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();

            let mut content_length: usize = 0;
            loop {
                let mut header = String::new();
                reader.read_line(&mut header).unwrap();
                let header = header.trim_end();
                if header.is_empty() {
                    break;
                }
                if let Some((name, value)) = header.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut raw_body = vec![0u8; content_length];
            reader.read_exact(&mut raw_body).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();

            Captured {
                request_line: request_line.trim_end().to_string(),
                body: String::from_utf8(raw_body).unwrap(),
            }
        });

        let config = ServiceConfig::default()
            .with_overrides(Some(format!("http://{addr}/api").as_str()), Some("5"));
        (config, handle)
    }

    #[test]
    fn test_create_story_posts_theme() {
        let (config, handle) = respond_once(
            "200 OK",
            r#"{"job_id": "abc", "session_id": "s1", "status": "pending"}"#,
        );
        let service = HttpStoryService::new(&config).unwrap();

        let job = service.create_story("pirates").unwrap();
        assert_eq!(job.job_id, "abc");
        assert_eq!(job.session_id.as_deref(), Some("s1"));

        let seen = handle.join().unwrap();
        assert_eq!(seen.request_line, "POST /api/stories/create HTTP/1.1");
        let body: Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(body, json!({"theme": "pirates"}));
    }

    #[test]
    fn test_poll_job_maps_error_status() {
        let (config, handle) = respond_once("404 Not Found", r#"{"detail":"Job not found"}"#);
        let service = HttpStoryService::new(&config).unwrap();

        match service.poll_job("abc") {
            Err(ServiceError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, r#"{"detail":"Job not found"}"#);
            }
            other => panic!("expected api error, got {other:?}"),
        }

        let seen = handle.join().unwrap();
        assert_eq!(seen.request_line, "GET /api/jobs/abc HTTP/1.1");
        assert!(seen.body.is_empty());
    }

    #[test]
    fn test_fetch_complete_story_path() {
        let (config, handle) = respond_once("200 OK", r#"{"id": 3}"#);
        let service = HttpStoryService::new(&config).unwrap();

        assert_eq!(service.fetch_complete_story(3).unwrap(), json!({"id": 3}));
        let seen = handle.join().unwrap();
        assert_eq!(seen.request_line, "GET /api/stories/3/complete HTTP/1.1");
    }

    #[test]
    fn test_validate_job_id() {
        assert!(validate_job_id("3f2a-91_bc").is_ok());
        assert!(matches!(
            validate_job_id("../stories/1"),
            Err(ServiceError::InvalidJobId(_))
        ));
        assert!(validate_job_id("").is_err());
    }

    #[test]
    fn test_url_joining() {
        let config = ServiceConfig::default().with_overrides(Some("http://host/api/"), None);
        let service = HttpStoryService::new(&config).unwrap();
        assert_eq!(service.url("jobs/abc"), "http://host/api/jobs/abc");
        assert_eq!(service.url("/stories/create"), "http://host/api/stories/create");
    }

    #[test]
    fn test_job_report_decoding() {
        let report: JobReport = serde_json::from_str(
            r#"{"job_id": "j1", "status": "completed", "theme": "pirates", "story_id": 4,
                "created_at": "2024-01-01T00:00:00", "completed_at": null, "error": null}"#,
        )
        .unwrap();
        assert_eq!(report.status, JobStatus::Completed);
        assert_eq!(report.story_id, Some(4));
        assert_eq!(report.completed_at, None);
    }

    #[test]
    fn test_unrecognised_status() {
        let report: JobReport =
            serde_json::from_str(r#"{"job_id": "j1", "status": "queued"}"#).unwrap();
        assert_eq!(report.status, JobStatus::Unknown);
    }

    #[test]
    fn test_created_job_defaults() {
        let job: CreatedJob = serde_json::from_str(r#"{"job_id": "j9"}"#).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.session_id, None);
    }
}
