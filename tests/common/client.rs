//! HTTP client for end-to-end tests
//!
//! A thin wrapper over reqwest with one method per endpoint. When API
//! routes or request formats change, update only this file.

use super::constants::*;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    pub async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Response {
        let form = Form::new().part("audio", Part::bytes(bytes).file_name(filename.to_string()));
        self.client
            .post(self.url("/api/upload"))
            .multipart(form)
            .send()
            .await
            .expect("upload request failed")
    }

    pub async fn reupload(&self, track_id: &str, filename: &str, bytes: Vec<u8>) -> Response {
        let form = Form::new().part("audio", Part::bytes(bytes).file_name(filename.to_string()));
        self.client
            .post(self.url(&format!("/api/tracks/{}/reupload", track_id)))
            .multipart(form)
            .send()
            .await
            .expect("reupload request failed")
    }

    /// Uploads a file, asserts 201 and waits until processing succeeds.
    /// Returns (track_id, slug).
    pub async fn upload_and_wait(&self, filename: &str, bytes: Vec<u8>) -> (String, String) {
        let response = self.upload(filename, bytes).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("upload response body");
        let track_id = body["track_id"].as_str().expect("track_id").to_string();
        let slug = body["slug"].as_str().expect("slug").to_string();

        let status = self.wait_for_terminal_status(&track_id).await;
        assert_eq!(status, "ready", "track {} failed processing", track_id);
        (track_id, slug)
    }

    /// Polls the status endpoint until the track is `ready` or `failed`.
    pub async fn wait_for_terminal_status(&self, track_id: &str) -> String {
        let start = std::time::Instant::now();
        loop {
            if start.elapsed() > Duration::from_millis(PROCESSING_TIMEOUT_MS) {
                panic!("Track {} did not finish processing in time", track_id);
            }

            let response = self.track_status(track_id).await;
            assert_eq!(response.status(), StatusCode::OK);
            let body: Value = response.json().await.expect("status body");
            let status = body["status"].as_str().expect("status field").to_string();
            if status == "ready" || status == "failed" {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    // ========================================================================
    // Tracks
    // ========================================================================

    pub async fn list_tracks(&self) -> Response {
        self.get("/api/tracks").await
    }

    pub async fn get_track(&self, id: &str) -> Response {
        self.get(&format!("/api/tracks/{}", id)).await
    }

    pub async fn track_status(&self, id: &str) -> Response {
        self.get(&format!("/api/tracks/{}/status", id)).await
    }

    pub async fn play_track(&self, id: &str) -> Response {
        self.client
            .post(self.url(&format!("/api/tracks/{}/play", id)))
            .send()
            .await
            .expect("play request failed")
    }

    pub async fn patch_track(&self, id: &str, body: Value) -> Response {
        self.client
            .patch(self.url(&format!("/api/tracks/{}", id)))
            .json(&body)
            .send()
            .await
            .expect("patch track request failed")
    }

    pub async fn batch_tracks(&self, body: Value) -> Response {
        self.client
            .post(self.url("/api/tracks/batch"))
            .json(&body)
            .send()
            .await
            .expect("batch request failed")
    }

    pub async fn search_tracks(&self, q: &str) -> Response {
        self.client
            .get(self.url("/api/tracks/search"))
            .query(&[("q", q)])
            .send()
            .await
            .expect("search request failed")
    }

    pub async fn search_tracks_excluding(&self, q: &str, collection_id: &str) -> Response {
        self.client
            .get(self.url("/api/tracks/search"))
            .query(&[("q", q), ("exclude", collection_id)])
            .send()
            .await
            .expect("search request failed")
    }

    pub async fn track_peaks(&self, id: &str) -> Response {
        self.get(&format!("/api/tracks/{}/peaks", id)).await
    }

    pub async fn track_art(&self, id: &str) -> Response {
        self.get(&format!("/api/tracks/{}/art", id)).await
    }

    pub async fn track_audio(&self, id: &str) -> Response {
        self.get(&format!("/api/tracks/{}/audio", id)).await
    }

    pub async fn track_audio_range(&self, id: &str, range: &str) -> Response {
        self.client
            .get(self.url(&format!("/api/tracks/{}/audio", id)))
            .header("Range", range)
            .send()
            .await
            .expect("range request failed")
    }

    // ========================================================================
    // Collections
    // ========================================================================

    pub async fn create_collection(&self, body: Value) -> Response {
        self.client
            .post(self.url("/api/collections"))
            .json(&body)
            .send()
            .await
            .expect("create collection request failed")
    }

    pub async fn list_collections(&self) -> Response {
        self.get("/api/collections").await
    }

    pub async fn get_collection(&self, id: &str) -> Response {
        self.get(&format!("/api/collections/{}", id)).await
    }

    pub async fn patch_collection(&self, id: &str, body: Value) -> Response {
        self.client
            .patch(self.url(&format!("/api/collections/{}", id)))
            .json(&body)
            .send()
            .await
            .expect("patch collection request failed")
    }

    pub async fn delete_collection(&self, id: &str) -> Response {
        self.client
            .delete(self.url(&format!("/api/collections/{}", id)))
            .send()
            .await
            .expect("delete collection request failed")
    }

    pub async fn reorder_collections(&self, ids: Vec<&str>) -> Response {
        self.client
            .patch(self.url("/api/collections/reorder"))
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .expect("reorder collections request failed")
    }

    pub async fn add_collection_track(&self, id: &str, body: Value) -> Response {
        self.client
            .post(self.url(&format!("/api/collections/{}/tracks", id)))
            .json(&body)
            .send()
            .await
            .expect("add track request failed")
    }

    pub async fn remove_collection_track(&self, id: &str, track_id: &str) -> Response {
        self.client
            .delete(self.url(&format!("/api/collections/{}/tracks/{}", id, track_id)))
            .send()
            .await
            .expect("remove track request failed")
    }

    pub async fn reorder_collection_tracks(&self, id: &str, body: Value) -> Response {
        self.client
            .patch(self.url(&format!("/api/collections/{}/tracks/reorder", id)))
            .json(&body)
            .send()
            .await
            .expect("reorder tracks request failed")
    }

    pub async fn get_collection_art(&self, id: &str) -> Response {
        self.get(&format!("/api/collections/{}/art", id)).await
    }

    pub async fn upload_collection_art(&self, id: &str, filename: &str, bytes: Vec<u8>) -> Response {
        let form = Form::new().part("art", Part::bytes(bytes).file_name(filename.to_string()));
        self.client
            .post(self.url(&format!("/api/collections/{}/art", id)))
            .multipart(form)
            .send()
            .await
            .expect("art upload request failed")
    }

    // ========================================================================
    // Misc
    // ========================================================================

    pub async fn health(&self) -> Response {
        self.get("/health").await
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }
}
