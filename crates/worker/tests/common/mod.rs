//! Stub queue server for job-loop integration tests.
//!
//! Runs axum on an ephemeral port inside its own runtime thread. Each
//! `GET /job` consumes the next scripted response and falls back to
//! 204 once the script is exhausted, so a worker loop under test can
//! poll forever without special casing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

/// A job the stub hands out once.
#[derive(Debug, Clone)]
pub struct StubJob {
    pub id: &'static str,
    pub workflow: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub animal_name: &'static str,
    pub animal_type: &'static str,
    pub image: &'static [u8],
}

impl StubJob {
    pub fn named(id: &'static str, workflow: &'static str) -> Self {
        Self {
            id,
            workflow,
            first_name: "Max",
            last_name: "M",
            animal_name: "Teddy",
            animal_type: "bear",
            image: b"\x89PNG-512x512-stand-in",
        }
    }
}

/// One scripted `GET /job` response.
#[derive(Debug, Clone)]
pub enum Scripted {
    Job(StubJob),
    NoJob,
    Unauthorized,
}

#[derive(Debug, Default, Clone)]
pub struct Submission {
    pub image_id: String,
    pub file_name: String,
    pub bytes: usize,
}

#[derive(Default)]
pub struct StubState {
    script: Mutex<VecDeque<Scripted>>,
    pub token_requests: AtomicUsize,
    pub polls: AtomicUsize,
    pub bearers: Mutex<Vec<String>>,
    pub submissions: Mutex<Vec<Submission>>,
}

impl StubState {
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn token_count(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn bearers(&self) -> Vec<String> {
        self.bearers.lock().unwrap().clone()
    }
}

async fn token(State(state): State<Arc<StubState>>) -> Json<serde_json::Value> {
    let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    Json(serde_json::json!({ "access_token": format!("tok-{n}") }))
}

async fn job(State(state): State<Arc<StubState>>, headers: HeaderMap) -> impl IntoResponse {
    state.polls.fetch_add(1, Ordering::SeqCst);
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.bearers.lock().unwrap().push(auth.to_string());
    }

    let next = state.script.lock().unwrap().pop_front();
    match next {
        Some(Scripted::Job(job)) => {
            let mut headers = HeaderMap::new();
            let mut set = |name: &'static str, value: &str| {
                if !value.is_empty() {
                    headers.insert(name, value.parse().unwrap());
                }
            };
            set("img_id", job.id);
            set("workflow", job.workflow);
            set("first_name", job.first_name);
            set("last_name", job.last_name);
            set("animal_name", job.animal_name);
            set("animal_type", job.animal_type);
            (StatusCode::OK, headers, job.image.to_vec()).into_response()
        }
        Some(Scripted::Unauthorized) => StatusCode::UNAUTHORIZED.into_response(),
        Some(Scripted::NoJob) | None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn submit(State(state): State<Arc<StubState>>, mut multipart: Multipart) -> impl IntoResponse {
    let mut submission = Submission::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        match field.name() {
            Some("image_id") => submission.image_id = field.text().await.unwrap(),
            Some("result") => {
                submission.file_name = field.file_name().unwrap_or_default().to_string();
                submission.bytes = field.bytes().await.unwrap().len();
            }
            _ => {}
        }
    }
    state.submissions.lock().unwrap().push(submission);
    (StatusCode::OK, "stored")
}

/// Start the stub and return its base URL plus shared state.
pub fn spawn_stub(script: Vec<Scripted>) -> (String, Arc<StubState>) {
    let state = Arc::new(StubState {
        script: Mutex::new(script.into()),
        ..Default::default()
    });

    let app = Router::new()
        .route("/token", post(token))
        .route("/job", get(job).post(submit))
        .with_state(Arc::clone(&state));

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("stub runtime");
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, app).await.unwrap();
        });
    });

    let addr = rx.recv().expect("stub address");
    (format!("http://{addr}"), state)
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    condition()
}
