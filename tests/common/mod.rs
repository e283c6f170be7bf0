#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use imagegen::config::Config;
use imagegen::db::{DbActorHandle, ProfileCreate};
use imagegen::error::{ProviderError, StorageError};
use imagegen::provider::{GeneratedImage, ImageProvider};
use imagegen::realtime::ChangeFeed;
use imagegen::server::router::{ImagegenState, imagegen_router};
use imagegen::storage::{FsObjectStore, ObjectKey, ObjectStore, StoredObject, WriteMode};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Barrier;
use tower::ServiceExt;
use url::Url;

pub const ADMIN_KEY: &str = "admin-pwd";
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-bytes";

pub fn unique_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("{prefix}-{}-{nanos}", std::process::id()));
    path
}

pub fn sqlite_url(prefix: &str) -> String {
    let db_path = unique_path(prefix).with_extension("sqlite");
    format!("sqlite:{}", db_path.display())
}

pub async fn spawn_db(prefix: &str, feed: ChangeFeed) -> DbActorHandle {
    imagegen::db::spawn(&sqlite_url(prefix), feed)
        .await
        .expect("spawn db actor")
}

#[derive(Debug, Clone)]
pub enum FakeOutcome {
    Image(Vec<u8>, &'static str),
    Upstream,
    MissingKey,
}

/// Counts calls and answers with a fixed outcome.
pub struct FakeProvider {
    calls: AtomicUsize,
    outcome: Mutex<FakeOutcome>,
    gate: Option<Barrier>,
}

impl FakeProvider {
    pub fn new(outcome: FakeOutcome) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome: Mutex::new(outcome),
            gate: None,
        }
    }

    /// PNG provider that holds each call until `n` calls are in flight together.
    pub fn gated(n: usize) -> Self {
        Self {
            gate: Some(Barrier::new(n)),
            ..Self::png()
        }
    }

    pub fn png() -> Self {
        Self::new(FakeOutcome::Image(PNG_BYTES.to_vec(), "image/png"))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_outcome(&self, outcome: FakeOutcome) {
        *self.outcome.lock().expect("outcome lock") = outcome;
    }
}

#[async_trait]
impl ImageProvider for FakeProvider {
    async fn generate(&self, _prompt: &str) -> Result<GeneratedImage, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.wait().await;
        }
        let outcome = self.outcome.lock().expect("outcome lock").clone();
        match outcome {
            FakeOutcome::Image(bytes, content_type) => Ok(GeneratedImage {
                bytes,
                content_type: content_type.to_string(),
            }),
            FakeOutcome::Upstream => Err(ProviderError::UpstreamStatus {
                status: StatusCode::BAD_GATEWAY,
                body: "upstream exploded".to_string(),
            }),
            FakeOutcome::MissingKey => Err(ProviderError::ApiKeyMissing),
        }
    }
}

/// Filesystem store that can be told to fail writes.
pub struct FaultyStore {
    inner: FsObjectStore,
    /// The next this many `CreateOnly` writes report the key as taken.
    collisions: AtomicUsize,
    fail_writes: bool,
    attempted: Mutex<Vec<String>>,
}

impl FaultyStore {
    pub fn new(inner: FsObjectStore) -> Self {
        Self {
            inner,
            collisions: AtomicUsize::new(0),
            fail_writes: false,
            attempted: Mutex::new(Vec::new()),
        }
    }

    pub fn colliding(inner: FsObjectStore, times: usize) -> Self {
        Self {
            collisions: AtomicUsize::new(times),
            ..Self::new(inner)
        }
    }

    pub fn broken(inner: FsObjectStore) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(inner)
        }
    }

    /// Keys of every write, in order, including the failed ones.
    pub fn attempted(&self) -> Vec<String> {
        self.attempted.lock().expect("attempted lock").clone()
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn put(
        &self,
        bucket: &str,
        key: &ObjectKey,
        bytes: &[u8],
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        self.attempted
            .lock()
            .expect("attempted lock")
            .push(key.to_string());
        if self.fail_writes {
            return Err(StorageError::Write {
                key: key.to_string(),
                source: std::io::Error::other("disk full"),
            });
        }
        let collide = mode == WriteMode::CreateOnly
            && self
                .collisions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if collide {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        self.inner.put(bucket, key, bytes, mode).await
    }

    async fn get(&self, bucket: &str, key: &ObjectKey) -> Result<StoredObject, StorageError> {
        self.inner.get(bucket, key).await
    }

    async fn delete(&self, bucket: &str, key: &ObjectKey) -> Result<(), StorageError> {
        self.inner.delete(bucket, key).await
    }

    fn public_url(&self, bucket: &str, key: &ObjectKey) -> Url {
        self.inner.public_url(bucket, key)
    }
}

pub struct TestApp {
    pub app: Router,
    pub db: DbActorHandle,
    pub db_url: String,
    pub feed: ChangeFeed,
    pub provider: Arc<FakeProvider>,
    pub cfg: Config,
}

impl TestApp {
    pub async fn spawn(prefix: &str, provider: FakeProvider) -> Self {
        Self::spawn_custom(prefix, provider, |_| {}, |fs| Arc::new(fs) as Arc<dyn ObjectStore>).await
    }

    /// `configure` runs on the test defaults; `store` wraps the filesystem store.
    pub async fn spawn_custom(
        prefix: &str,
        provider: FakeProvider,
        configure: impl FnOnce(&mut Config),
        store: impl FnOnce(FsObjectStore) -> Arc<dyn ObjectStore>,
    ) -> Self {
        let mut cfg = Config::default();
        cfg.basic.admin_key = ADMIN_KEY.to_string();
        cfg.storage.root = unique_path(&format!("{prefix}-storage"));
        cfg.storage.max_avatar_bytes = 64;
        configure(&mut cfg);

        let feed = ChangeFeed::default();
        let db_url = sqlite_url(prefix);
        let db = imagegen::db::spawn(&db_url, feed.clone())
            .await
            .expect("spawn db actor");
        let provider = Arc::new(provider);
        let store = store(
            FsObjectStore::new(cfg.storage.root.clone(), cfg.storage.public_base_url.clone())
                .expect("object store"),
        );

        let state = ImagegenState::new(db.clone(), feed.clone(), provider.clone(), store, &cfg);
        Self {
            app: imagegen_router(state),
            db,
            db_url,
            feed,
            provider,
            cfg,
        }
    }

    /// Create a profile directly and issue a session for it through the admin route.
    pub async fn user(&self, id: &str, credits: i64) -> String {
        self.db
            .create_profile(ProfileCreate {
                id: id.to_string(),
                display_name: format!("User {id}"),
                avatar_url: None,
                credits,
            })
            .await
            .expect("create profile");

        let (status, body) = self
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/admin/sessions")
                    .header("content-type", "application/json")
                    .header("x-admin-key", ADMIN_KEY)
                    .body(Body::from(format!(r#"{{"user_id":"{id}"}}"#)))
                    .expect("failed to build request"),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["access_token"]
            .as_str()
            .expect("access_token")
            .to_string()
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.expect("request failed");
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&body).into_owned())
            })
        };
        (status, json)
    }

    pub async fn generate(&self, token: &str, body: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/functions/v1/generate-image")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .expect("failed to build request"),
        )
        .await
    }

    pub async fn get(&self, token: &str, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
    }

    pub async fn credits(&self, user_id: &str) -> i64 {
        self.db
            .get_profile(user_id)
            .await
            .expect("get profile")
            .expect("profile exists")
            .credits
    }

    /// Files currently stored in a bucket, recursively.
    pub fn stored_files(&self, bucket: &str) -> Vec<PathBuf> {
        fn walk(dir: &std::path::Path, out: &mut Vec<PathBuf>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.cfg.storage.root.join(bucket), &mut out);
        out
    }
}
