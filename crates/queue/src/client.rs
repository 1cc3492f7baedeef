//! The queue client proper.

use reqwest::blocking::multipart;
use reqwest::StatusCode;
use serde::Deserialize;
use txr_core::job::{JobRequest, Patient};

use crate::error::QueueError;

/// Result of one `GET /job` poll.
#[derive(Debug)]
pub enum Poll {
    /// A job was handed out. Field validation is the caller's job;
    /// missing headers arrive as empty strings.
    Job(Box<JobRequest>),
    /// 204 -- nothing queued right now.
    NoJob,
    /// 401 -- the bearer token expired; refresh and retry.
    Unauthorized,
}

/// Status and body of a result upload, for logging.
#[derive(Debug)]
pub struct SubmitReceipt {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Blocking client for one queue server.
pub struct QueueClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl QueueClient {
    /// Create a client for the queue at `base_url`.
    ///
    /// No request timeout is set: result uploads can be large and the
    /// queue protocol enforces none.
    pub fn new(base_url: &str) -> Result<Self, QueueError> {
        let client = reqwest::blocking::Client::builder().timeout(None).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticate and fetch a fresh bearer token.
    pub fn fetch_token(&self, password: &str) -> Result<String, QueueError> {
        let response = self
            .client
            .post(format!("{}/token", self.base_url))
            .form(&[("password", password)])
            .send()?;

        let response = ensure_success(response)?;
        let token: TokenResponse = response.json()?;
        Ok(token.access_token)
    }

    /// Poll for a job with bearer auth.
    ///
    /// 401 and 204 map to their [`Poll`] variants; any other non-200
    /// status is an error. On 200 the job id, patient metadata, and
    /// workflow name are read from plain-string headers and the body
    /// carries the raw image bytes.
    pub fn poll(&self, token: &str) -> Result<Poll, QueueError> {
        let response = self
            .client
            .get(format!("{}/job", self.base_url))
            .bearer_auth(token)
            .send()?;

        match response.status() {
            StatusCode::UNAUTHORIZED => return Ok(Poll::Unauthorized),
            StatusCode::NO_CONTENT => return Ok(Poll::NoJob),
            _ => {}
        }
        let response = ensure_success(response)?;

        let header = |name: &str| -> String {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        let id = header("img_id");
        let workflow = header("workflow");
        let patient = Patient {
            first_name: header("first_name"),
            last_name: header("last_name"),
            animal_name: header("animal_name"),
            animal_type: header("animal_type"),
        };
        let image = response.bytes()?.to_vec();

        Ok(Poll::Job(Box::new(JobRequest {
            id,
            image,
            workflow,
            patient,
        })))
    }

    /// Upload a result image for a job.
    ///
    /// Fire-and-forget by design: the receipt is returned for logging,
    /// and no retry happens on failure.
    pub fn submit(
        &self,
        token: &str,
        job_id: &str,
        png_bytes: Vec<u8>,
    ) -> Result<SubmitReceipt, QueueError> {
        let part = multipart::Part::bytes(png_bytes)
            .file_name("result.png")
            .mime_str("image/png")?;
        let form = multipart::Form::new()
            .part("result", part)
            .text("image_id", job_id.to_string());

        let response = self
            .client
            .post(format!("{}/job", self.base_url))
            .bearer_auth(token)
            .multipart(form)
            .send()?;

        let status = response.status().as_u16();
        let body = response.text().unwrap_or_default();
        Ok(SubmitReceipt { status, body })
    }
}

// ---- private helpers ----

/// Map any non-2xx response to [`QueueError::Api`] with its body text.
fn ensure_success(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, QueueError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(QueueError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
