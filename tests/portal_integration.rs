//! Integration tests for the portal REST API and session WebSocket.
//!
//! Each test spins up an Axum server on a random port backed by an
//! in-memory database, and exercises the real HTTP / WS contract.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use onboarding_portal::config::PortalConfig;
use onboarding_portal::server::{PortalState, portal_routes};
use onboarding_portal::session::identity::{USER_EMAIL_HEADER, USER_ID_HEADER};
use onboarding_portal::session::{SessionRegistry, spawn_change_listener};
use onboarding_portal::store::{LibSqlBackend, NotifyingStore, RecordStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const ADMIN: (&str, &str) = ("admin-1", "hr@admin.com");

struct TestServer {
    base: String,
    port: u16,
    client: reqwest::Client,
}

/// Start the portal on a random port.
async fn start_server() -> TestServer {
    let store = Arc::new(NotifyingStore::new(LibSqlBackend::new_memory().await.unwrap()));
    let changes = store.subscribe();
    let store: Arc<dyn RecordStore> = store;
    let sessions = SessionRegistry::new(store, Arc::new(PortalConfig::default()));
    spawn_change_listener(Arc::clone(&sessions), changes);
    let app = portal_routes(PortalState::new(sessions));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        port,
        client: reqwest::Client::new(),
    }
}

fn user(n: u32) -> (String, String) {
    (format!("user-{n}"), format!("user{n}@example.com"))
}

impl TestServer {
    fn get(&self, path: &str, who: Option<(&str, &str)>) -> reqwest::RequestBuilder {
        with_identity(self.client.get(format!("{}{path}", self.base)), who)
    }

    fn post(&self, path: &str, who: Option<(&str, &str)>) -> reqwest::RequestBuilder {
        with_identity(self.client.post(format!("{}{path}", self.base)), who)
    }

    fn put(&self, path: &str, who: Option<(&str, &str)>) -> reqwest::RequestBuilder {
        with_identity(self.client.put(format!("{}{path}", self.base)), who)
    }

    async fn access(&self, path: &str, who: Option<(&str, &str)>) -> Value {
        self.get(&format!("/api/session/access?path={path}"), who)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    /// Walk a user through every step up to document submission.
    async fn onboard(&self, who: (&str, &str)) {
        let resp = self
            .post("/api/onboarding/agreement", Some(who))
            .json(&json!({"terms": true, "privacy": true, "confidentiality": true}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = self
            .put("/api/onboarding/profile", Some(who))
            .json(&json!({"first_name": "Ada", "last_name": "Lovelace", "phone": "555-0100"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        for document_type in ["resume", "class10", "class12"] {
            let resp = self
                .post("/api/onboarding/documents", Some(who))
                .json(&json!({
                    "document_type": document_type,
                    "file_name": format!("{document_type}.pdf"),
                    "file_type": "application/pdf",
                    "file_size": 4096,
                }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let resp = self
            .post("/api/onboarding/documents/submit", Some(who))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

fn with_identity(req: reqwest::RequestBuilder, who: Option<(&str, &str)>) -> reqwest::RequestBuilder {
    match who {
        Some((id, email)) => req.header(USER_ID_HEADER, id).header(USER_EMAIL_HEADER, email),
        None => req,
    }
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

// ── Session & guard ──────────────────────────────────────────────────

#[tokio::test]
async fn health_is_ok() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let resp = server.get("/health", None).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn anonymous_session_and_guard() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;

        let body: Value = server
            .get("/api/session", None)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["authenticated"], false);

        let decision = server.access("/profile-info", None).await;
        assert_eq!(decision, json!({"decision": "redirect_to", "to": "/login"}));

        let decision = server.access("/login", None).await;
        assert_eq!(decision, json!({"decision": "allow"}));

        let resp = server
            .get("/api/session/access?path=/does-not-exist", None)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn new_user_is_held_at_agreement() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (id, email) = user(1);
        let who = Some((id.as_str(), email.as_str()));

        let body: Value = server
            .get("/api/session", who)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["identity"]["is_admin"], false);
        assert_eq!(body["session"]["status"], "resolved");
        assert_eq!(body["session"]["step"], "agreement");

        let decision = server.access("/user-dashboard", who).await;
        assert_eq!(decision, json!({"decision": "redirect_to", "to": "/agreement"}));

        let decision = server.access("/login", who).await;
        assert_eq!(
            decision,
            json!({"decision": "redirect_to", "to": "/user-dashboard"})
        );
    })
    .await
    .expect("test timed out");
}

// ── Onboarding flow ──────────────────────────────────────────────────

#[tokio::test]
async fn onboarding_walk_advances_the_step() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (id, email) = user(2);
        let who = (id.as_str(), email.as_str());

        let resp = server
            .post("/api/onboarding/agreement", Some(who))
            .json(&json!({"terms": true, "privacy": true, "confidentiality": true}))
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["agreement"]["version"], "1.0");
        assert_eq!(body["session"]["step"], "profile-info");

        // Forward jump is blocked, revisiting is not.
        assert_eq!(
            server.access("/document-upload", Some(who)).await,
            json!({"decision": "redirect_to", "to": "/profile-info"})
        );
        assert_eq!(
            server.access("/agreement", Some(who)).await,
            json!({"decision": "allow"})
        );

        server.onboard(who).await;

        let app: Value = server
            .get("/api/onboarding/application", Some(who))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(app["status"], "under-review");

        let body: Value = server
            .get("/api/session", Some(who))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["session"]["step"], "application-status");

        let docs: Value = server
            .get("/api/onboarding/documents", Some(who))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(docs["documents"].as_array().unwrap().len(), 3);
        assert!(docs["missing_required"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn invalid_input_is_rejected_with_422() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (id, email) = user(3);
        let who = Some((id.as_str(), email.as_str()));

        let resp = server
            .post("/api/onboarding/agreement", who)
            .json(&json!({"terms": true}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = server
            .post("/api/onboarding/documents", who)
            .json(&json!({
                "document_type": "resume",
                "file_name": "cv.exe",
                "file_type": "application/x-msdownload",
                "file_size": 100,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Unsupported file type"));

        let resp = server
            .get("/api/onboarding/profile", who)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn steps_cannot_be_skipped_over_http() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (id, email) = user(9);
        let who = (id.as_str(), email.as_str());

        let resp = server
            .put("/api/onboarding/profile", Some(who))
            .json(&json!({"first_name": "Ada", "last_name": "Lovelace", "phone": "555-0100"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        for document_type in ["resume", "class10", "class12"] {
            let resp = server
                .post("/api/onboarding/documents", Some(who))
                .json(&json!({
                    "document_type": document_type,
                    "file_name": format!("{document_type}.pdf"),
                    "file_type": "application/pdf",
                    "file_size": 4096,
                }))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::CONFLICT);
        }

        let resp = server
            .post("/api/onboarding/documents/submit", Some(who))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        // Nothing reached the admin queue, so there is nothing to approve.
        let resp = server
            .post(&format!("/api/admin/applications/{id}/transition"), Some(ADMIN))
            .json(&json!({"action": "approve"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: Value = server
            .get("/api/session", Some(who))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["session"]["step"], "agreement");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn anonymous_mutations_are_unauthorized() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let resp = server
            .post("/api/onboarding/agreement", None)
            .json(&json!({"terms": true, "privacy": true, "confidentiality": true}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = server.get("/api/dashboard", None).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    })
    .await
    .expect("test timed out");
}

// ── Admin ────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_reviews_application_to_completion() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (id, email) = user(4);
        let who = (id.as_str(), email.as_str());
        server.onboard(who).await;

        let summary: Value = server
            .get("/api/admin/applications/summary", Some(ADMIN))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(summary["total"], 1);

        let list: Value = server
            .get("/api/admin/applications", Some(ADMIN))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list[0]["user_id"], id);
        assert_eq!(list[0]["applicant_name"], "Ada Lovelace");

        let resp = server
            .post(&format!("/api/admin/applications/{id}/transition"), Some(ADMIN))
            .json(&json!({"action": "approve", "notes": "Welcome aboard"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let app: Value = resp.json().await.unwrap();
        assert_eq!(app["status"], "selected");
        assert_eq!(app["admin_notes"], "Welcome aboard");

        // Terminal: a second decision is refused.
        let resp = server
            .post(&format!("/api/admin/applications/{id}/transition"), Some(ADMIN))
            .json(&json!({"action": "reject"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        // The change listener moves the user's session to completed.
        let mut step = Value::Null;
        for _ in 0..50 {
            let body: Value = server
                .get("/api/session", Some(who))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            step = body["session"]["step"].clone();
            if step == "completed" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(step, "completed");
        assert_eq!(
            server.access("/user-dashboard", Some(who)).await,
            json!({"decision": "allow"})
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn non_admin_cannot_use_admin_endpoints() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (id, email) = user(5);
        let who = Some((id.as_str(), email.as_str()));

        let resp = server
            .get("/api/admin/applications", who)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = server
            .post(&format!("/api/admin/applications/{id}/transition"), who)
            .json(&json!({"action": "approve"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        assert_eq!(
            server.access("/admin-dashboard", who).await,
            json!({"decision": "redirect_to", "to": "/user-dashboard"})
        );
        assert_eq!(
            server.access("/admin-dashboard", Some(ADMIN)).await,
            json!({"decision": "allow"})
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn assigned_tasks_show_on_dashboard() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (id, email) = user(6);
        let who = Some((id.as_str(), email.as_str()));

        let resp = server
            .post("/api/admin/tasks", Some(ADMIN))
            .json(&json!({"user_id": id, "title": "Collect badge", "priority": "high"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let task: Value = resp.json().await.unwrap();
        let task_id = task["id"].as_str().unwrap().to_string();

        let resp = server
            .post("/api/admin/resources", Some(ADMIN))
            .json(&json!({"title": "Handbook", "resource_type": "document"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        // Someone else cannot touch the task.
        let (other_id, other_email) = user(7);
        let resp = server
            .post(
                &format!("/api/tasks/{task_id}/status"),
                Some((other_id.as_str(), other_email.as_str())),
            )
            .json(&json!({"status": "completed"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = server
            .post(&format!("/api/tasks/{task_id}/status"), who)
            .json(&json!({"status": "in-progress"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let dashboard: Value = server
            .get("/api/dashboard", who)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(dashboard["tasks"][0]["title"], "Collect badge");
        assert_eq!(dashboard["tasks"][0]["status"], "in-progress");
        assert_eq!(dashboard["task_counts"]["in_progress"], 1);
        assert_eq!(dashboard["resources"][0]["title"], "Handbook");
    })
    .await
    .expect("test timed out");
}

// ── WebSocket ────────────────────────────────────────────────────────

async fn connect_session_ws(
    port: u16,
    who: (&str, &str),
) -> tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>> {
    let mut request = format!("ws://127.0.0.1:{port}/ws/session")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert(USER_ID_HEADER, who.0.parse().unwrap());
    request
        .headers_mut()
        .insert(USER_EMAIL_HEADER, who.1.parse().unwrap());
    let (ws, _resp) = connect_async(request).await.expect("WS connect failed");
    ws
}

#[tokio::test]
async fn ws_pushes_step_changes_and_close() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (id, email) = user(8);
        let who = (id.as_str(), email.as_str());

        let mut ws = connect_session_ws(server.port, who).await;

        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        assert_eq!(json["type"], "session_sync");
        assert_eq!(json["state"]["step"], "agreement");

        server
            .post("/api/onboarding/agreement", Some(who))
            .json(&json!({"terms": true, "privacy": true, "confidentiality": true}))
            .send()
            .await
            .unwrap();

        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        assert_eq!(json["type"], "session_sync");
        assert_eq!(json["state"]["step"], "profile-info");

        let resp = server
            .post("/api/session/sign-out", Some(who))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        assert_eq!(json["type"], "session_closed");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_requires_identity() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let result = connect_async(format!("ws://127.0.0.1:{}/ws/session", server.port)).await;
        assert!(result.is_err());
    })
    .await
    .expect("test timed out");
}
