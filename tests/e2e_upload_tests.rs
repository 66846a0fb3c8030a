//! End-to-end tests for the upload and processing flow
//!
//! Covers validation, the pending-to-ready lifecycle, slug allocation,
//! failed processing and source replacement.

mod common;

use common::{fixtures, TestClient, TestServer};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn test_upload_processes_to_ready() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.upload("My Demo.wav", fixtures::wav_bytes()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["slug"], "my-demo");
    assert_eq!(body["status"], "pending");
    let track_id = body["track_id"].as_str().unwrap().to_string();

    let status = client.wait_for_terminal_status(&track_id).await;
    assert_eq!(status, "ready");

    let detail: serde_json::Value = client.get_track(&track_id).await.json().await.unwrap();
    assert_eq!(detail["title"], "My Demo");
    assert_eq!(detail["slug"], "my-demo");
    assert_eq!(detail["status"], "ready");
    assert_eq!(detail["category"], "track");
    assert_eq!(detail["duration"], 213); // 212.5s rounded
    assert_eq!(detail["bitrate"], 320_000);
    assert_eq!(detail["play_count"], 0);
    assert_eq!(detail["file_size"], 64);
    assert_eq!(detail["original_filename"], "My Demo.wav");
    assert_eq!(detail["tags"], serde_json::json!([]));
    assert!(detail["peaks_path"].is_string());
    assert!(detail["error_message"].is_null());
}

#[tokio::test]
async fn test_ready_track_gets_a_single_collection() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let (track_id, _slug) = client.upload_and_wait("Night Ride.wav", fixtures::wav_bytes()).await;

    let collections: serde_json::Value = client.list_collections().await.json().await.unwrap();
    let collections = collections.as_array().unwrap();
    assert_eq!(collections.len(), 1);

    let single = &collections[0];
    assert_eq!(single["type"], "single");
    assert_eq!(single["title"], "Night Ride");
    assert_eq!(single["track_count"], 1);
    assert_eq!(single["total_duration"], 213);

    let detail: serde_json::Value = client
        .get_collection(single["id"].as_str().unwrap())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(detail["tracks"][0]["id"], track_id.as_str());
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_rejects_invalid_uploads_without_side_effects() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    // Missing audio field
    let form = Form::new().part("other", Part::bytes(fixtures::wav_bytes()).file_name("a.wav"));
    let response = client
        .client
        .post(format!("{}/api/upload", client.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Audio file required");

    // Unrecognized bytes
    let response = client.upload("noise.wav", fixtures::unknown_bytes()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Unknown file type");

    // Image posing as audio
    let response = client.upload("pic.wav", fixtures::png_bytes()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Unsupported audio format: image/png");

    // Over the size cap
    let mut big = fixtures::wav_bytes();
    big.resize((common::TEST_MAX_AUDIO_BYTES + 1) as usize, 0);
    let response = client.upload("big.wav", big).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "File too large (max 1 MB)");

    // None of the rejections left a row behind
    assert!(server.store.list_tracks().unwrap().is_empty());
}

// =============================================================================
// Slug Allocation
// =============================================================================

#[tokio::test]
async fn test_same_filename_gets_suffixed_slug() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let (_first, first_slug) = client.upload_and_wait("demo.wav", fixtures::wav_bytes()).await;
    assert_eq!(first_slug, "demo");

    let (_second, second_slug) = client.upload_and_wait("demo.wav", fixtures::wav_bytes()).await;
    assert_eq!(second_slug, "demo-2");
}

// =============================================================================
// Failed Processing
// =============================================================================

#[tokio::test]
async fn test_corrupt_file_lands_in_failed() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.upload("broken.wav", fixtures::corrupt_wav_bytes()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.unwrap();
    let track_id = body["track_id"].as_str().unwrap().to_string();

    let status = client.wait_for_terminal_status(&track_id).await;
    assert_eq!(status, "failed");

    let status_body: serde_json::Value = client.track_status(&track_id).await.json().await.unwrap();
    assert_eq!(status_body["status"], "failed");
    let message = status_body["error_message"].as_str().unwrap();
    assert!(
        message.contains("FFprobe validation failed"),
        "unexpected error message: {}",
        message
    );

    // A failed track is not streamable
    let response = client.track_audio(&track_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Reupload
// =============================================================================

#[tokio::test]
async fn test_reupload_replaces_source_and_reprocesses() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let (track_id, slug) = client.upload_and_wait("demo.wav", fixtures::wav_bytes()).await;
    client.play_track(&track_id).await;
    client.play_track(&track_id).await;

    let response = client
        .reupload(&track_id, "remaster.mp3", fixtures::mp3_bytes())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["track_id"], track_id.as_str());
    assert_eq!(body["slug"], slug.as_str());
    assert_eq!(body["status"], "pending");

    let status = client.wait_for_terminal_status(&track_id).await;
    assert_eq!(status, "ready");

    let detail: serde_json::Value = client.get_track(&track_id).await.json().await.unwrap();
    assert_eq!(detail["slug"], slug.as_str());
    assert_eq!(detail["original_filename"], "remaster.mp3");
    assert_eq!(detail["play_count"], 2);

    // The old .wav original is gone, only the .mp3 replacement remains
    assert!(!server
        .layout
        .original_path(&track_id, Some("wav"))
        .exists());
    assert!(server
        .layout
        .original_path(&track_id, Some("mp3"))
        .exists());
}

#[tokio::test]
async fn test_reupload_unknown_track_is_404() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client
        .reupload("missing-id", "demo.wav", fixtures::wav_bytes())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
