//! Shared timeouts and limits for the e2e suite

/// Per-request timeout for the test client.
pub const REQUEST_TIMEOUT_SECS: u64 = 5;

/// How long to wait for the spawned server to answer /health.
pub const SERVER_READY_TIMEOUT_MS: u64 = 5_000;

/// Poll interval while waiting for the server or for track processing.
pub const POLL_INTERVAL_MS: u64 = 20;

/// How long to wait for a track to leave the pending/processing states.
pub const PROCESSING_TIMEOUT_MS: u64 = 10_000;

/// Audio upload cap for tests, kept small so the oversize case is cheap.
pub const TEST_MAX_AUDIO_BYTES: u64 = 1024 * 1024;

/// Image upload cap for tests.
pub const TEST_MAX_IMAGE_BYTES: u64 = 256 * 1024;
