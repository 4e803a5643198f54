//! Default configuration constants for streamscribe.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and is the fixed format of
/// the streaming wire protocol: every binary frame carries mono f32 samples
/// at this rate.
pub const SAMPLE_RATE: u32 = 16000;

/// Default sample block size produced by the capture pipeline.
///
/// 128 samples (8ms at 16kHz) matches typical audio-engine render quanta and
/// keeps per-frame latency low without flooding the channel.
pub const BLOCK_SIZE: usize = 128;

/// Bounded wait for the stop handshake in milliseconds.
///
/// After the end-of-input control message is sent, the session waits this
/// long for the service's final result before tearing down anyway. An
/// unresponsive service can therefore never hang the client.
pub const HANDSHAKE_TIMEOUT_MS: u64 = 5000;

/// Polling interval for the capture thread when no samples are available.
pub const POLL_INTERVAL_MS: u64 = 10;

/// WebSocket path of the streaming endpoint.
pub const STREAM_PATH: &str = "/stream";

/// HTTP path of the whole-file transcription endpoint.
pub const TRANSCRIBE_FILE_PATH: &str = "/transcribe/file";

/// HTTP path of the configuration endpoint.
pub const CONFIG_PATH: &str = "/config";

/// Default WebSocket URL of the transcription service.
pub const SERVER_URL: &str = "ws://127.0.0.1:8000";

/// Default HTTP URL of the transcription service.
pub const HTTP_URL: &str = "http://127.0.0.1:8000";

/// Returns the default stop-handshake bound as a [`Duration`].
pub fn handshake_timeout() -> Duration {
    Duration::from_millis(HANDSHAKE_TIMEOUT_MS)
}

/// Returns the default capture poll interval as a [`Duration`].
pub fn poll_interval() -> Duration {
    Duration::from_millis(POLL_INTERVAL_MS)
}
