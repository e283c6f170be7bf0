mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use common::{FakeOutcome, FakeProvider, FaultyStore, PNG_BYTES, TestApp};
use imagegen::ImagegenError;
use imagegen::realtime::ChangeFeed;
use imagegen::service::GenerationService;
use imagegen::storage::{FsObjectStore, ObjectStore};
use imagegen_schema::GenerateRequest;
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn rejections_happen_before_the_provider_is_called() {
    let t = TestApp::spawn("imagegen-gen-reject", FakeProvider::png()).await;
    let rich = t.user("rich", 5).await;
    let broke = t.user("broke", 0).await;

    // 1) no token -> 401
    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/functions/v1/generate-image")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt":"a red fox"}"#))
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // 2) unknown token -> 401, even with a malformed body
    let (status, body) = t.generate("not-a-session", "not-json").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    // 3) blank or missing prompt -> 400
    for payload in [r#"{"prompt":"   "}"#, "{}", r#"{"prompt":null}"#] {
        let (status, body) = t.generate(&rich, payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert_eq!(body["error"], "Prompt is required");
    }

    // 4) invalid JSON -> 400
    let (status, _) = t.generate(&rich, "not-json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 5) empty balance -> 402
    let (status, body) = t.generate(&broke, r#"{"prompt":"a red fox"}"#).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "Insufficient credits");

    assert_eq!(t.provider.calls(), 0);
    assert_eq!(t.credits("rich").await, 5);
    assert_eq!(t.credits("broke").await, 0);
}

#[tokio::test]
async fn red_fox_spends_the_last_credit_then_is_refused() {
    let t = TestApp::spawn("imagegen-gen-fox", FakeProvider::png()).await;
    let token = t.user("fox", 1).await;

    let (status, body) = t.generate(&token, r#"{"prompt":"a red fox"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remainingCredits"], 0);
    assert_eq!(body["image"]["prompt"], "a red fox");
    assert_eq!(body["image"]["liked"], false);
    assert_eq!(body["image"]["user_id"], "fox");

    let image_url = body["image"]["image_data"].as_str().expect("image url");
    assert!(
        image_url.starts_with("http://127.0.0.1:8188/storage/v1/object/public/generated-images/fox/")
    );
    assert!(image_url.ends_with(".png"));

    assert_eq!(t.credits("fox").await, 0);
    let (_, images) = t.get(&token, "/images").await;
    assert_eq!(images.as_array().map(Vec::len), Some(1));

    // The stored object is served under its public path.
    let path = image_url.trim_start_matches("http://127.0.0.1:8188");
    let resp = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(path)
                .body(Body::empty())
                .expect("failed to build request"),
        )
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let served = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    assert_eq!(served.as_ref(), PNG_BYTES);

    // Immediate repeat -> 402, provider untouched.
    let (status, _) = t.generate(&token, r#"{"prompt":"a red fox"}"#).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(t.provider.calls(), 1);
    assert_eq!(t.stored_files("generated-images").len(), 1);
}

#[tokio::test]
async fn provider_failure_leaves_balance_and_gallery_unchanged() {
    let t = TestApp::spawn(
        "imagegen-gen-fail",
        FakeProvider::new(FakeOutcome::Upstream),
    )
    .await;
    let token = t.user("unlucky", 2).await;

    let (status, body) = t.generate(&token, r#"{"prompt":"a red fox"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate image");

    assert_eq!(t.credits("unlucky").await, 2);
    let (_, images) = t.get(&token, "/images").await;
    assert_eq!(images.as_array().map(Vec::len), Some(0));
    assert!(t.stored_files("generated-images").is_empty());

    // Missing provider key is reported after the credit check.
    t.provider.set_outcome(FakeOutcome::MissingKey);
    let (status, body) = t.generate(&token, r#"{"prompt":"a red fox"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Provider API key not configured");
    assert_eq!(t.credits("unlucky").await, 2);
    assert_eq!(t.provider.calls(), 2);
}

#[tokio::test]
async fn successive_generations_are_listed_newest_first() {
    let t = TestApp::spawn("imagegen-gen-order", FakeProvider::png()).await;
    let token = t.user("busy", 3).await;

    for prompt in ["first", "second"] {
        let (status, _) = t
            .generate(&token, &format!(r#"{{"prompt":"{prompt}"}}"#))
            .await;
        assert_eq!(status, StatusCode::OK);
        // Keys are millisecond timestamps.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let (_, images) = t.get(&token, "/images").await;
    let prompts: Vec<&str> = images
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|i| i["prompt"].as_str())
        .collect();
    assert_eq!(prompts, vec!["second", "first"]);
    assert_eq!(t.credits("busy").await, 1);
}

#[tokio::test]
async fn unknown_profile_is_not_found() {
    let db = common::spawn_db("imagegen-gen-404", ChangeFeed::default()).await;
    let provider = Arc::new(FakeProvider::png());
    let store = Arc::new(
        FsObjectStore::new(
            common::unique_path("imagegen-gen-404-storage"),
            url::Url::parse("http://127.0.0.1:8188").expect("url"),
        )
        .expect("store"),
    );
    let service = GenerationService::new(db, provider.clone(), store, "generated-images");

    let err = service
        .generate("ghost", &GenerateRequest::new("a red fox"))
        .await
        .expect_err("no profile");
    assert!(matches!(err, ImagegenError::NotFound(ref m) if m == "Profile not found"));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
    assert_eq!(provider.calls(), 0);
}

const FOX: &str = r#"{"prompt":"a red fox"}"#;

#[tokio::test]
async fn concurrent_generations_of_one_user_both_keep_their_image() {
    let t = TestApp::spawn("imagegen-gen-concurrent", FakeProvider::gated(2)).await;
    let token = t.user("twin", 2).await;

    // Both provider calls finish together, so both writes race for the same millisecond.
    let ((a, _), (b, _)) = tokio::join!(t.generate(&token, FOX), t.generate(&token, FOX));
    assert_eq!((a, b), (StatusCode::OK, StatusCode::OK));

    assert_eq!(t.credits("twin").await, 0);
    assert_eq!(t.stored_files("generated-images").len(), 2);
    let (_, images) = t.get(&token, "/images").await;
    assert_eq!(images.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn taken_key_moves_to_the_next_millisecond() {
    let mut faulty = None;
    let t = TestApp::spawn_custom(
        "imagegen-gen-collide",
        FakeProvider::png(),
        |_| {},
        |fs| {
            let store = Arc::new(FaultyStore::colliding(fs, 2));
            faulty = Some(store.clone());
            store as Arc<dyn ObjectStore>
        },
    )
    .await;
    let faulty = faulty.expect("store handle");
    let token = t.user("fox", 1).await;

    let (status, body) = t.generate(&token, FOX).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remainingCredits"], 0);

    let millis: Vec<i64> = faulty
        .attempted()
        .iter()
        .filter_map(|key| key.strip_prefix("fox/")?.strip_suffix(".png")?.parse().ok())
        .collect();
    assert_eq!(millis.len(), 3);
    assert_eq!(millis[1], millis[0] + 1);
    assert_eq!(millis[2], millis[0] + 2);

    let url = body["image"]["image_data"].as_str().expect("image url");
    assert!(url.ends_with(&format!("/generated-images/fox/{}.png", millis[2])), "{url}");
    assert_eq!(t.stored_files("generated-images").len(), 1);
}

#[tokio::test]
async fn storage_failure_keeps_the_credit() {
    let t = TestApp::spawn_custom(
        "imagegen-gen-storage-fail",
        FakeProvider::png(),
        |_| {},
        |fs| Arc::new(FaultyStore::broken(fs)) as Arc<dyn ObjectStore>,
    )
    .await;
    let token = t.user("unlucky", 1).await;

    let (status, body) = t.generate(&token, FOX).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to save image to storage");

    assert_eq!(t.provider.calls(), 1);
    assert_eq!(t.credits("unlucky").await, 1);
    let (_, images) = t.get(&token, "/images").await;
    assert_eq!(images.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn losing_the_last_credit_race_discards_the_object() {
    let t = TestApp::spawn("imagegen-gen-race", FakeProvider::gated(2)).await;
    let token = t.user("racer", 1).await;

    // Both pass the balance check before either commits.
    let ((a, _), (b, body_b)) = tokio::join!(t.generate(&token, FOX), t.generate(&token, FOX));
    let mut statuses = [a, b];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::PAYMENT_REQUIRED]);
    if b == StatusCode::PAYMENT_REQUIRED {
        assert_eq!(body_b["error"], "Insufficient credits");
    }

    assert_eq!(t.provider.calls(), 2);
    assert_eq!(t.credits("racer").await, 0);
    assert_eq!(t.stored_files("generated-images").len(), 1);
    let (_, images) = t.get(&token, "/images").await;
    assert_eq!(images.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn metadata_failure_discards_the_object_and_keeps_the_credit() {
    let t = TestApp::spawn("imagegen-gen-commit-fail", FakeProvider::png()).await;
    let token = t.user("unlucky", 1).await;

    // A second connection makes every image insert fail.
    let pool = sqlx::SqlitePool::connect(&t.db_url).await.expect("connect");
    sqlx::query(
        "CREATE TRIGGER reject_images BEFORE INSERT ON images \
         BEGIN SELECT RAISE(ABORT, 'images are read-only'); END",
    )
    .execute(&pool)
    .await
    .expect("create trigger");
    pool.close().await;

    let (status, body) = t.generate(&token, FOX).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to save image metadata");

    assert_eq!(t.provider.calls(), 1);
    assert_eq!(t.credits("unlucky").await, 1);
    assert!(t.stored_files("generated-images").is_empty());
}
