//! End-to-end lifecycle tests: worker processing to a terminal state,
//! create latency independence, and the cleanup reaper.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use common::{
    body_json, build_test_app, get, poll_until_terminal, post_multipart, valid_session_form,
    TestTransform,
};
use tryon_api::background::reaper;
use tryon_core::session::{SessionStatus, DOMAIN_FAILURE_REASONS};
use tryon_db::{NewSession, SessionStore};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Worker: terminal outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn session_completes_and_output_is_fetchable() {
    let harness = build_test_app(TestTransform::default(), 24).await;

    let response =
        post_multipart(&harness.app, "/api/v1/tryon/sessions", valid_session_form("u1")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let json = poll_until_terminal(&harness.app, &session_id, Duration::from_secs(5)).await;

    assert_eq!(json["status"], "completed");
    assert_eq!(json["progress_message"], "Try-on completed successfully!");
    assert!(json["error_reason"].is_null());

    // The output reference resolves through the static file route.
    let output_url = json["output_image_url"].as_str().expect("output url");
    assert!(output_url.starts_with("/uploads/outputs/"));
    let fetched = get(&harness.app, output_url).await;
    assert_eq!(fetched.status(), StatusCode::OK);
}

#[tokio::test]
async fn failing_transform_yields_failed_with_known_reason() {
    let harness = build_test_app(
        TestTransform {
            delay: Duration::from_millis(10),
            failure_rate: 1.0,
        },
        24,
    )
    .await;

    let response =
        post_multipart(&harness.app, "/api/v1/tryon/sessions", valid_session_form("u1")).await;
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let json = poll_until_terminal(&harness.app, &session_id, Duration::from_secs(5)).await;

    assert_eq!(json["status"], "failed");
    assert!(json["output_image_url"].is_null());
    let reason = json["error_reason"].as_str().expect("error reason");
    assert!(
        DOMAIN_FAILURE_REASONS.contains(&reason),
        "unexpected reason: {reason}"
    );
    assert_eq!(json["progress_message"], "Processing failed. Please try again.");
}

#[tokio::test]
async fn terminal_state_never_changes_afterwards() {
    let harness = build_test_app(TestTransform::default(), 24).await;

    let response =
        post_multipart(&harness.app, "/api/v1/tryon/sessions", valid_session_form("u1")).await;
    let session_id: Uuid = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    poll_until_terminal(&harness.app, &session_id.to_string(), Duration::from_secs(5)).await;

    // Even direct store writes cannot move a terminal session.
    assert!(harness
        .state
        .store
        .fail(session_id, "should not land")
        .await
        .unwrap()
        .is_none());
    assert!(harness
        .state
        .store
        .mark_processing(session_id)
        .await
        .unwrap()
        .is_none());

    let session = harness.state.store.get(session_id).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.output_image_ref.is_some());
    assert!(session.error_reason.is_none());
}

// ---------------------------------------------------------------------------
// Create latency is independent of transform duration
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_does_not_wait_for_the_transform() {
    let harness = build_test_app(
        TestTransform {
            delay: Duration::from_secs(3),
            failure_rate: 0.0,
        },
        24,
    )
    .await;

    let started = std::time::Instant::now();
    let response =
        post_multipart(&harness.app, "/api/v1/tryon/sessions", valid_session_form("u1")).await;
    let elapsed = started.elapsed();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(
        elapsed < Duration::from_secs(1),
        "create took {elapsed:?}, must not track the 3 s transform"
    );
}

// ---------------------------------------------------------------------------
// Cleanup reaper
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reaper_removes_expired_sessions_and_assets() {
    // TTL of zero hours: sessions expire the moment they are created.
    let harness = build_test_app(TestTransform::default(), 0).await;

    let response =
        post_multipart(&harness.app, "/api/v1/tryon/sessions", valid_session_form("u1")).await;
    let session_id: Uuid = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    // Let the worker finish so the session is terminal, not processing.
    poll_until_terminal(&harness.app, &session_id.to_string(), Duration::from_secs(5)).await;

    let session = harness.state.store.get(session_id).await.unwrap().unwrap();
    let refs: Vec<String> = [
        Some(session.user_image_ref.clone()),
        Some(session.garment_image_ref.clone()),
        session.output_image_ref.clone(),
    ]
    .into_iter()
    .flatten()
    .collect();
    assert_eq!(refs.len(), 3);

    let stats = reaper::sweep(harness.state.store.as_ref(), &harness.state.storage).await;
    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.errors, 0);

    // Row gone, API answers 404, and no asset reference resolves anymore.
    assert!(harness.state.store.get(session_id).await.unwrap().is_none());
    let response = get(&harness.app, &format!("/api/v1/tryon/sessions/{session_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    for reference in &refs {
        assert!(!harness.state.storage.resolve(reference).unwrap().exists());
        let fetched = get(&harness.app, reference).await;
        assert_eq!(fetched.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn reaper_is_idempotent_across_runs() {
    let harness = build_test_app(TestTransform::default(), 0).await;

    let response =
        post_multipart(&harness.app, "/api/v1/tryon/sessions", valid_session_form("u1")).await;
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();
    poll_until_terminal(&harness.app, &session_id, Duration::from_secs(5)).await;

    let first = reaper::sweep(harness.state.store.as_ref(), &harness.state.storage).await;
    assert_eq!(first.deleted, 1);

    // Second run over the same (now empty) expired set: nothing to do,
    // nothing fails.
    let second = reaper::sweep(harness.state.store.as_ref(), &harness.state.storage).await;
    assert_eq!(second.deleted, 0);
    assert_eq!(second.errors, 0);
}

#[tokio::test]
async fn reaper_defers_sessions_still_processing() {
    let harness = build_test_app(TestTransform::default(), 24).await;
    let store = &harness.state.store;

    // An already-expired session caught mid-processing.
    let id = Uuid::new_v4();
    store
        .create(&NewSession {
            id,
            user_token: "u1".into(),
            user_image_ref: format!("/uploads/users/{id}_user.png"),
            garment_image_ref: format!("/uploads/garments/{id}_garment.png"),
            expires_at: Utc::now() - chrono::Duration::hours(1),
        })
        .await
        .unwrap();
    store.mark_processing(id).await.unwrap().unwrap();

    let stats = reaper::sweep(store.as_ref(), &harness.state.storage).await;
    assert_eq!(stats.deleted, 0);
    assert_eq!(stats.skipped_processing, 1);
    assert!(store.get(id).await.unwrap().is_some());
}
