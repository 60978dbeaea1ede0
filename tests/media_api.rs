mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header::CONTENT_TYPE};
use bytes::Bytes;
use time::OffsetDateTime;
use vitrine::infra::storage::{ObjectStore, SignedMethod};

use common::{BUCKET, TestApp, body_bytes, get, json_body, local_path, send};

const HOUR: Duration = Duration::from_secs(3600);

async fn seed(app: &TestApp, key: &str) {
    app.store
        .put(BUCKET, key, Bytes::from_static(b"pixels"), "image/webp")
        .await
        .expect("seed object");
}

#[tokio::test]
async fn signed_get_serves_the_object() {
    let app = TestApp::new();
    seed(&app, "abc-medium").await;

    let url = app
        .signer
        .signed_url(BUCKET, "abc-medium", SignedMethod::Get, HOUR)
        .expect("signed url");
    let response = send(&app.public, get(&local_path(&url))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/webp");
    assert_eq!(body_bytes(response).await, Bytes::from_static(b"pixels"));
}

#[tokio::test]
async fn objects_without_a_body_are_reported_as_no_content() {
    let app = TestApp::new();
    app.store.insert_bodiless(BUCKET, "empty-medium", "image/webp");

    let url = app
        .signer
        .signed_url(BUCKET, "empty-medium", SignedMethod::Get, HOUR)
        .expect("signed url");
    let response = send(&app.public, get(&local_path(&url))).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "no_content");
}

#[tokio::test]
async fn tampered_signatures_are_forbidden() {
    let app = TestApp::new();
    seed(&app, "abc").await;
    seed(&app, "other").await;

    let url = app
        .signer
        .signed_url(BUCKET, "abc", SignedMethod::Get, HOUR)
        .expect("signed url");

    // Same signature, different object.
    let path = local_path(&url).replace("/media/photos/abc?", "/media/photos/other?");
    let response = send(&app.public, get(&path)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_signature");

    let response = send(&app.public, get("/media/photos/abc")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn expired_links_are_refused() {
    let app = TestApp::new();
    seed(&app, "abc").await;

    let expires = OffsetDateTime::now_utc().unix_timestamp() - 10;
    let url = app
        .signer
        .signed_url_until(BUCKET, "abc", SignedMethod::Get, expires)
        .expect("signed url");
    let response = send(&app.public, get(&local_path(&url))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "signature_expired");
}

#[tokio::test]
async fn other_buckets_are_not_served() {
    let app = TestApp::new();

    let url = app
        .signer
        .signed_url("private", "abc", SignedMethod::Get, HOUR)
        .expect("signed url");
    let response = send(&app.public, get(&local_path(&url))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn read_links_cannot_write() {
    let app = TestApp::new();

    let url = app
        .signer
        .signed_url(BUCKET, "profile/1-me.jpg", SignedMethod::Get, HOUR)
        .expect("signed url");
    let request = Request::builder()
        .method(Method::PUT)
        .uri(local_path(&url))
        .body(Body::from("overwrite"))
        .expect("request should build");
    let response = send(&app.public, request).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(
        !app.store
            .exists(BUCKET, "profile/1-me.jpg")
            .await
            .expect("exists")
    );
}

#[tokio::test]
async fn signed_put_guesses_missing_content_types() {
    let app = TestApp::new();

    let url = app
        .signer
        .signed_url(BUCKET, "profile/2-me.png", SignedMethod::Put, HOUR)
        .expect("signed url");
    let request = Request::builder()
        .method(Method::PUT)
        .uri(local_path(&url))
        .body(Body::from("png"))
        .expect("request should build");
    let response = send(&app.public, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let object = app
        .store
        .get(BUCKET, "profile/2-me.png")
        .await
        .expect("stored object");
    assert_eq!(object.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn health_endpoints_answer_on_both_listeners() {
    let app = TestApp::new();

    let response = send(&app.public, get("/_health/db")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app.admin, get("/_health/db")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
