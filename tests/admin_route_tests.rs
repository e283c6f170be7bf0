mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{ADMIN_KEY, FakeProvider, TestApp};
use serde_json::Value;

fn admin_post(uri: &str, key: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-admin-key", key);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

#[tokio::test]
async fn admin_routes_require_the_admin_key() {
    let t = TestApp::spawn("imagegen-admin-guard", FakeProvider::png()).await;
    let payload = r#"{"display_name":"Ada"}"#;

    // 1) no key -> 401
    let (status, body) = t.send(admin_post("/admin/profiles", None, payload)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    // 2) wrong key -> 401
    let (status, _) = t
        .send(admin_post("/admin/profiles", Some("nope"), payload))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 3) a user session is not an admin key
    let token = t.user("ada", 0).await;
    let (status, _) = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/admin/profiles")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::from(payload))
                .expect("failed to build request"),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 4) bearer admin key is accepted too
    let (status, _) = t
        .send(
            Request::builder()
                .method("POST")
                .uri("/admin/profiles")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {ADMIN_KEY}"))
                .body(Body::from(payload))
                .expect("failed to build request"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Unknown paths stay 404, not 401.
    let (status, _) = t.send(admin_post("/admin/nothing", None, "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profiles_are_created_topped_up_and_signed_in() {
    let t = TestApp::spawn("imagegen-admin-flow", FakeProvider::png()).await;

    let (status, created) = t
        .send(admin_post(
            "/admin/profiles",
            Some(ADMIN_KEY),
            r#"{"id":"grace","display_name":"  Grace  ","credits":2}"#,
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], "grace");
    assert_eq!(created["display_name"], "Grace");
    assert_eq!(created["credits"], 2);

    // Generated id when none is given.
    let (status, anon) = t
        .send(admin_post(
            "/admin/profiles",
            Some(ADMIN_KEY),
            r#"{"display_name":"Anon"}"#,
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(anon["id"].as_str().map(str::len), Some(36));
    assert_eq!(anon["credits"], 0);

    let (status, topped) = t
        .send(admin_post(
            "/admin/profiles/grace/credits",
            Some(ADMIN_KEY),
            r#"{"amount":3}"#,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(topped["credits"], 5);

    let (status, session) = t
        .send(admin_post(
            "/admin/sessions",
            Some(ADMIN_KEY),
            r#"{"user_id":"grace"}"#,
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["user_id"], "grace");
    let token = session["access_token"].as_str().expect("token");
    assert_eq!(token.len(), 43);

    let (status, me) = t.get(token, "/profile").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["credits"], 5);
}

#[tokio::test]
async fn admin_input_is_validated() {
    let t = TestApp::spawn("imagegen-admin-validate", FakeProvider::png()).await;
    t.user("grace", 0).await;

    let cases: [(&str, &str, StatusCode); 6] = [
        ("/admin/profiles", r#"{"display_name":"   "}"#, StatusCode::BAD_REQUEST),
        (
            "/admin/profiles",
            r#"{"display_name":"x","credits":-1}"#,
            StatusCode::BAD_REQUEST,
        ),
        (
            "/admin/profiles",
            r#"{"id":"a/b","display_name":"x"}"#,
            StatusCode::BAD_REQUEST,
        ),
        ("/admin/profiles/grace/credits", r#"{"amount":0}"#, StatusCode::BAD_REQUEST),
        ("/admin/profiles/ghost/credits", r#"{"amount":1}"#, StatusCode::NOT_FOUND),
        ("/admin/sessions", r#"{"user_id":"ghost"}"#, StatusCode::NOT_FOUND),
    ];

    for (uri, body, expected) in cases {
        let (status, resp) = t.send(admin_post(uri, Some(ADMIN_KEY), body)).await;
        assert_eq!(status, expected, "{uri} {body}");
        assert!(matches!(resp["error"], Value::String(_)), "{uri} {body}");
    }
}
