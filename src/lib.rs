//! streamscribe - Real-time transcription client
//!
//! Streams microphone or file audio to a transcription service over a
//! WebSocket duplex channel and delivers partial and final results as they
//! arrive. Also covers the service's one-shot file upload and remote
//! configuration endpoints.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod api;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod stream;

// Core seams (source → session → events)
pub use audio::{AudioSource, FileAudioSource, MockAudioSource};
pub use stream::{
    ChannelConnector, SessionConfig, SessionEvent, SessionState, StreamSession,
    TranscriptionEvent, WsConnector,
};

// Error handling
pub use error::{Result, StreamscribeError};

// Config
pub use config::Config;

// REST surface
pub use api::{ApiClient, FileTranscription, RemoteConfig};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
