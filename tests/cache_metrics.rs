mod common;

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use axum::http::{Method, StatusCode};
use bytes::Bytes;
use metrics_util::debugging::{DebuggingRecorder, Snapshotter};
use serde_json::json;
use serial_test::serial;
use vitrine::infra::storage::ObjectStore;
use vitrine::live::{
    BroadcastChannel, ChannelError, ListenerChannel, ProfileNotifier, ProfileUpdate, UpdateChannel,
};

use common::{BUCKET, TestApp, get, json_request, send};

fn snapshotter() -> &'static Snapshotter {
    static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");
        snapshotter
    })
}

fn metric_names() -> HashSet<String> {
    snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect()
}

#[tokio::test]
#[serial]
async fn cache_paths_emit_expected_metric_keys() {
    snapshotter();
    let app = TestApp::new();
    app.store
        .put(
            BUCKET,
            "profile/1-me.jpg",
            Bytes::from_static(b"jpeg"),
            "image/jpeg",
        )
        .await
        .expect("seed picture");

    for uri in [
        "/api/profile",
        "/api/profile",
        "/api/profile/photo?key=profile%2F1-me.jpg",
        "/api/profile/photo?key=profile%2F1-me.jpg",
    ] {
        let response = send(&app.public, get(uri)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = send(
        &app.admin,
        json_request(
            Method::PATCH,
            "/api/admin/profile",
            &json!({"photo": "profile/1-me.jpg"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let names = metric_names();
    for metric in [
        "vitrine_cache_profile_hit_total",
        "vitrine_cache_profile_miss_total",
        "vitrine_cache_profile_invalidate_total",
        "vitrine_cache_image_hit_total",
        "vitrine_cache_image_miss_total",
        "vitrine_cache_image_invalidate_total",
    ] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}

#[tokio::test]
#[serial]
async fn failing_channels_are_counted() {
    snapshotter();
    let listeners = Arc::new(ListenerChannel::new());
    listeners.add_listener(Box::new(|_: &ProfileUpdate| {
        Err(ChannelError::Delivery("listener offline".to_string()))
    }));
    let channels: Vec<Arc<dyn UpdateChannel>> =
        vec![listeners, Arc::new(BroadcastChannel::new())];
    let notifier = ProfileNotifier::new(channels);

    notifier.publish(&ProfileUpdate {
        photo_url: None,
        description: Some("Hello".to_string()),
    });

    let names = metric_names();
    assert!(
        names.contains("vitrine_live_publish_failed_total"),
        "missing metric: vitrine_live_publish_failed_total"
    );
}
