// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use diagram_sync::config::Config;
use diagram_sync::models::{CollabRoom, Credentials, DocumentSummary, Visibility};
use diagram_sync::services::scene::PassthroughRestorer;
use diagram_sync::services::{
    CollabSession, Collaborators, DiagramSyncController, PendingSave, PendingSaveSource,
    RestoredScene, SceneRenderer, TokenStore,
};
use diagram_sync::store::MemoryStore;
use diagram_sync::time_utils::now_ms;
use diagram_sync::SyncClient;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use wiremock::MockServer;

/// Mock document store plus a client wired against it.
#[allow(dead_code)]
pub struct TestEnv {
    pub server: MockServer,
    pub store: Arc<MemoryStore>,
    pub client: SyncClient,
}

/// Start a mock server and build a client over an in-memory store.
#[allow(dead_code)]
pub async fn test_env() -> TestEnv {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let config = Config::for_base_url(&server.uri());
    let client = SyncClient::new(config, store.clone()).expect("Failed to build client");

    TestEnv {
        server,
        store,
        client,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TestClaims {
    user_id: String,
    exp: i64,
}

/// Create an HS256 token carrying `userId`.
#[allow(dead_code)]
pub fn make_jwt(user_id: &str) -> String {
    let claims = TestClaims {
        user_id: user_id.to_string(),
        exp: now_ms() / 1000 + 3600,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(b"test-signing-key"),
    )
    .expect("Failed to create JWT")
}

/// Store credentials whose expiries are relative to now.
#[allow(dead_code)]
pub fn seed_credentials(
    store: &Arc<MemoryStore>,
    access_token: &str,
    access_ttl_ms: i64,
    refresh_ttl_ms: i64,
) {
    let now = now_ms();
    TokenStore::new(store.clone())
        .save(&Credentials {
            access_token: access_token.to_string(),
            access_token_expiry_ms: now + access_ttl_ms,
            refresh_token: "refresh-token".to_string(),
            refresh_token_expiry_ms: now + refresh_ttl_ms,
        })
        .expect("Failed to seed credentials");
}

/// Valid access token for `user_id`, good for an hour.
#[allow(dead_code)]
pub fn seed_login(store: &Arc<MemoryStore>, user_id: &str) -> String {
    let token = make_jwt(user_id);
    seed_credentials(store, &token, 3_600_000, 86_400_000);
    token
}

#[allow(dead_code)]
pub fn summary(id: &str, owner: Option<&str>, visibility: Visibility, link: Option<&str>) -> DocumentSummary {
    DocumentSummary {
        id: id.to_string(),
        title: format!("Diagram {id}"),
        project: None,
        tags: Vec::new(),
        pinned: false,
        owner_id: owner.map(str::to_string),
        visibility,
        share_url: None,
        collab_link: link.map(str::to_string),
        element_count: 0,
        created_at: None,
        updated_at: None,
    }
}

/// Ordered record of renderer and collaboration calls.
#[allow(dead_code)]
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }
}

pub struct RecordingRenderer {
    log: Arc<EventLog>,
}

impl SceneRenderer for RecordingRenderer {
    fn set_read_only(&self, read_only: bool) {
        self.log.push(format!("read_only:{read_only}"));
    }

    fn render(&self, document_id: &str, scene: &RestoredScene) {
        self.log
            .push(format!("render:{document_id}:{}", scene.elements.len()));
    }
}

#[derive(Default)]
pub struct FakeCollab {
    log: Arc<EventLog>,
    room: Mutex<Option<CollabRoom>>,
}

#[allow(dead_code)]
impl FakeCollab {
    pub fn join(&self, room: CollabRoom) {
        *self.room.lock().unwrap() = Some(room);
    }
}

impl CollabSession for FakeCollab {
    fn active_room(&self) -> Option<CollabRoom> {
        self.room.lock().unwrap().clone()
    }

    fn start(&self, room: CollabRoom) {
        self.log.push(format!("collab_start:{}", room.room_id));
        *self.room.lock().unwrap() = Some(room);
    }

    fn stop(&self) {
        self.log.push("collab_stop");
        *self.room.lock().unwrap() = None;
    }
}

#[derive(Default)]
pub struct FakePending {
    pending: Mutex<Option<PendingSave>>,
}

#[allow(dead_code)]
impl FakePending {
    pub fn set(&self, elements: Vec<serde_json::Value>) {
        *self.pending.lock().unwrap() = Some(PendingSave {
            elements,
            meta: None,
        });
    }
}

impl PendingSaveSource for FakePending {
    fn take_pending(&self) -> Option<PendingSave> {
        self.pending.lock().unwrap().take()
    }
}

/// Handles to the fake collaborators behind a controller.
#[allow(dead_code)]
pub struct Fakes {
    pub log: Arc<EventLog>,
    pub collab: Arc<FakeCollab>,
    pub pending: Arc<FakePending>,
}

/// Controller over `env.client` with recording collaborators.
#[allow(dead_code)]
pub fn controller_with_fakes(env: &TestEnv) -> (DiagramSyncController, Fakes) {
    let log = Arc::new(EventLog::default());
    let collab = Arc::new(FakeCollab {
        log: log.clone(),
        room: Mutex::new(None),
    });
    let pending = Arc::new(FakePending::default());

    let collaborators = Collaborators {
        restorer: Arc::new(PassthroughRestorer),
        renderer: Arc::new(RecordingRenderer { log: log.clone() }),
        collab: collab.clone(),
        pending: pending.clone(),
    };

    (
        env.client.controller(collaborators),
        Fakes {
            log,
            collab,
            pending,
        },
    )
}

/// Paths of the requests the mock server received, as `METHOD /path`.
#[allow(dead_code)]
pub async fn request_log(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}
