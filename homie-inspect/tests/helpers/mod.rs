//! Shared fixtures for homie-inspect integration tests
//!
//! Each [`TestApp`] owns a temp-file SQLite database and photo folder, and
//! runs the real router against in-process vision and mail fakes.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

use homie_common::api::OWNER_HEADER;
use homie_common::events::EventBus;
use homie_inspect::models::{InventoryItem, PhotoData, RoomFindings};
use homie_inspect::services::mail_client::{MailError, MailSender, OutgoingMail};
use homie_inspect::services::{discrepancy, LocalPhotoStore, VisionAnalysisGateway, VisionError};
use homie_inspect::{build_router, AppState, Collaborators, StateOptions};

pub const OWNER: &str = "owner-1";
pub const OTHER_OWNER: &str = "owner-2";

/// Smallest byte string that sniffs as PNG
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01\x00\x00\x00\x01\x08\x02\x00\x00\x00";

pub fn item(name: &str, count: u32) -> InventoryItem {
    InventoryItem::new(name, count)
}

pub fn png_payload() -> Value {
    json!({ "mime_type": "image/png", "data": STANDARD.encode(PNG_BYTES) })
}

pub fn photos_body(count: usize) -> Value {
    json!({ "photos": (0..count).map(|_| png_payload()).collect::<Vec<_>>() })
}

/// Vision model stand-in with scripted inventories
///
/// Every `describe` pops the next scripted inventory (empty when none is
/// left). `compare` takes the next inventory as the tenant's independent
/// count and reduces it the way the real client does.
#[derive(Default)]
pub struct FakeVision {
    inventories: Mutex<VecDeque<Result<Vec<InventoryItem>, String>>>,
    photos_per_describe: Mutex<Vec<usize>>,
    describe_calls: AtomicUsize,
    compare_calls: AtomicUsize,
    compare_gate: Mutex<Option<Arc<CompareGate>>>,
}

/// Holds `compare` calls until released
#[derive(Default)]
pub struct CompareGate {
    pub entered: tokio::sync::Notify,
    pub release: tokio::sync::Notify,
}

impl FakeVision {
    pub fn script(&self, items: Vec<InventoryItem>) {
        self.inventories.lock().unwrap().push_back(Ok(items));
    }

    pub fn script_failure(&self, message: &str) {
        self.inventories.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    pub fn compare_calls(&self) -> usize {
        self.compare_calls.load(Ordering::SeqCst)
    }

    /// Make the next `compare` wait on the returned gate
    pub fn hold_compare(&self) -> Arc<CompareGate> {
        let gate = Arc::new(CompareGate::default());
        *self.compare_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Photo count of each describe call, in order
    pub fn photos_per_describe(&self) -> Vec<usize> {
        self.photos_per_describe.lock().unwrap().clone()
    }

    fn next_inventory(&self) -> Result<Vec<InventoryItem>, VisionError> {
        match self.inventories.lock().unwrap().pop_front() {
            Some(Ok(items)) => Ok(items),
            Some(Err(message)) => Err(VisionError::Parse(message)),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl VisionAnalysisGateway for FakeVision {
    async fn describe(&self, photos: &[PhotoData]) -> Result<Vec<InventoryItem>, VisionError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        self.photos_per_describe.lock().unwrap().push(photos.len());
        self.next_inventory()
    }

    async fn compare(
        &self,
        _photos: &[PhotoData],
        expected: &[InventoryItem],
    ) -> Result<RoomFindings, VisionError> {
        self.compare_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.compare_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let found = self.next_inventory()?;
        let discrepancies = discrepancy::reduce(expected, &found);
        Ok(RoomFindings {
            missing_item_suggestion: discrepancy::accept_suggestion(None, &discrepancies),
            discrepancies,
        })
    }
}

/// Mail stand-in that records messages and can be told to fail
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: AtomicBool,
}

impl FakeMailer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for FakeMailer {
    async fn send(&self, message: &OutgoingMail) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Api(503, "mail provider unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub vision: Arc<FakeVision>,
    pub mailer: Arc<FakeMailer>,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = homie_inspect::db::init_database_pool(&dir.path().join("homie.db"))
            .await
            .unwrap();
        let photos_dir = dir.path().join("photos");
        std::fs::create_dir_all(&photos_dir).unwrap();

        let vision = Arc::new(FakeVision::default());
        let mailer = Arc::new(FakeMailer::default());
        let collaborators = Collaborators {
            vision: vision.clone(),
            mailer: mailer.clone(),
            photos: Arc::new(LocalPhotoStore::new(photos_dir.clone())),
        };
        let state = AppState::new(
            db,
            EventBus::new(100),
            collaborators,
            StateOptions {
                photos_dir,
                public_base_url: "https://homie.test".to_string(),
                vision_timeout: Duration::from_secs(5),
            },
        );

        Self {
            router: build_router(state.clone()),
            state,
            vision,
            mailer,
            dir,
        }
    }

    /// Send a request and decode the JSON body (`Null` when empty)
    pub async fn call(&self, method: Method, uri: &str, owner: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(owner) = owner {
            builder = builder.header(OWNER_HEADER, owner);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn owner_get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(OWNER), None).await
    }

    pub async fn owner_post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(OWNER), Some(body)).await
    }

    pub async fn owner_delete(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(OWNER), None).await
    }

    pub async fn tenant_post(&self, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(Method::POST, uri, None, body).await
    }

    /// Create a home owned by [`OWNER`] and return its id
    pub async fn create_home(&self, name: &str) -> String {
        let (status, body) = self
            .owner_post(
                "/homes",
                json!({ "name": name, "owner_email": "owner@example.com", "owner_display_name": "Pat" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn create_room(&self, home_id: &str, name: &str) -> String {
        let (status, body) = self
            .owner_post(&format!("/homes/{}/rooms", home_id), json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Upload photos after scripting what the vision model will see in them
    pub async fn upload(&self, home_id: &str, room_id: &str, photos: usize, sees: Vec<InventoryItem>) -> (StatusCode, Value) {
        self.vision.script(sees);
        self.owner_post(&format!("/homes/{}/rooms/{}/photos", home_id, room_id), photos_body(photos))
            .await
    }

    /// Create a link and return `(link_id, response body)`
    pub async fn create_link(&self, home_id: &str, tenant: &str) -> (String, Value) {
        let (status, body) = self
            .owner_post(&format!("/homes/{}/links", home_id), json!({ "tenant_name": tenant }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (body["link"]["id"].as_str().unwrap().to_string(), body)
    }

    /// Open a link as the tenant and return the session id
    pub async fn open_session(&self, home_id: &str, link_id: &str) -> String {
        let (status, body) = self
            .tenant_post(&format!("/inspect/{}/links/{}/open", home_id, link_id), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["status"], "started", "{}", body);
        body["session"]["session_id"].as_str().unwrap().to_string()
    }

    /// Analyze the current room with the tenant seeing `sees`, then confirm it
    pub async fn inspect_room(&self, session_id: &str, sees: Vec<InventoryItem>) -> Value {
        self.vision.script(sees);
        let (status, body) = self
            .tenant_post(&format!("/inspect/sessions/{}/analyze", session_id), Some(photos_body(1)))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let (status, body) = self
            .tenant_post(&format!("/inspect/sessions/{}/confirm", session_id), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body
    }
}
