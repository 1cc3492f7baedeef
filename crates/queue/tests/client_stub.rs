//! Client tests against a local stub queue server.
//!
//! The stub runs axum on an ephemeral port inside its own runtime
//! thread; the blocking client under test talks to it over a real
//! socket, exactly as it does in production.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use txr_queue::{Poll, QueueClient};

/// One scripted `GET /job` response.
#[derive(Debug, Clone)]
enum Scripted {
    Job {
        id: &'static str,
        workflow: &'static str,
        first_name: &'static str,
        image: &'static [u8],
    },
    NoJob,
    Unauthorized,
}

#[derive(Debug, Default)]
struct Submission {
    image_id: String,
    file_name: String,
    bytes: usize,
}

#[derive(Default)]
struct StubState {
    script: Mutex<VecDeque<Scripted>>,
    token_requests: AtomicUsize,
    passwords: Mutex<Vec<String>>,
    bearers: Mutex<Vec<String>>,
    submissions: Mutex<Vec<Submission>>,
}

async fn token(
    State(state): State<Arc<StubState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    state
        .passwords
        .lock()
        .unwrap()
        .push(form.get("password").cloned().unwrap_or_default());
    Json(serde_json::json!({ "access_token": format!("tok-{n}") }))
}

async fn job(State(state): State<Arc<StubState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.bearers.lock().unwrap().push(auth.to_string());
    }

    let next = state.script.lock().unwrap().pop_front();
    match next {
        Some(Scripted::Job {
            id,
            workflow,
            first_name,
            image,
        }) => {
            let mut headers = HeaderMap::new();
            headers.insert("img_id", id.parse().unwrap());
            headers.insert("workflow", workflow.parse().unwrap());
            headers.insert("first_name", first_name.parse().unwrap());
            headers.insert("last_name", "M".parse().unwrap());
            headers.insert("animal_name", "Teddy".parse().unwrap());
            // animal_type intentionally omitted: absent headers must
            // surface as empty strings.
            (StatusCode::OK, headers, image.to_vec()).into_response()
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
fn spawn_stub(script: Vec<Scripted>) -> (String, Arc<StubState>) {
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

#[test]
fn fetch_token_posts_the_password() {
    let (url, state) = spawn_stub(vec![]);
    let client = QueueClient::new(&url).unwrap();

    let token = client.fetch_token("Password").unwrap();
    assert_eq!(token, "tok-1");
    assert_eq!(*state.passwords.lock().unwrap(), ["Password"]);
}

#[test]
fn poll_maps_204_to_no_job() {
    let (url, _state) = spawn_stub(vec![Scripted::NoJob]);
    let client = QueueClient::new(&url).unwrap();
    assert_matches!(client.poll("tok").unwrap(), Poll::NoJob);
}

#[test]
fn poll_maps_401_to_unauthorized() {
    let (url, _state) = spawn_stub(vec![Scripted::Unauthorized]);
    let client = QueueClient::new(&url).unwrap();
    assert_matches!(client.poll("tok").unwrap(), Poll::Unauthorized);
}

#[test]
fn poll_parses_job_headers_and_body() {
    let (url, state) = spawn_stub(vec![Scripted::Job {
        id: "job_0001",
        workflow: "FLUX_Kontext",
        first_name: "Max",
        image: b"\x89PNG-ish",
    }]);
    let client = QueueClient::new(&url).unwrap();

    let job = match client.poll("tok-1").unwrap() {
        Poll::Job(job) => job,
        other => panic!("expected a job, got {other:?}"),
    };
    assert_eq!(job.id, "job_0001");
    assert_eq!(job.workflow, "FLUX_Kontext");
    assert_eq!(job.patient.first_name, "Max");
    // Header absent on the wire -> empty string, caught by validation
    // only if the field is mandatory.
    assert_eq!(job.patient.animal_type, "");
    assert_eq!(job.image, b"\x89PNG-ish");
    assert!(job.validate().is_ok());

    let bearers = state.bearers.lock().unwrap();
    assert_eq!(*bearers, ["Bearer tok-1"]);
}

#[test]
fn submit_uploads_multipart_result() {
    let (url, state) = spawn_stub(vec![]);
    let client = QueueClient::new(&url).unwrap();

    let receipt = client
        .submit("tok", "job_0001", vec![1, 2, 3, 4, 5])
        .unwrap();
    assert_eq!(receipt.status, 200);
    assert_eq!(receipt.body, "stored");

    let submissions = state.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].image_id, "job_0001");
    assert_eq!(submissions[0].file_name, "result.png");
    assert_eq!(submissions[0].bytes, 5);
}
