//! Error types for streamscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device unavailable: {message}")]
    Device { message: String },

    #[error("Failed to decode audio input: {message}")]
    Decode { message: String },

    // Streaming session errors
    #[error("Failed to open streaming channel: {message}")]
    Connect { message: String },

    #[error("Streaming channel error: {message}")]
    Channel { message: String },

    #[error("Malformed message from service: {message}")]
    Protocol { message: String },

    #[error("A streaming session is already active")]
    AlreadyStreaming,

    // REST boundary errors
    #[error("Transcription service request failed: {message}")]
    Api { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, StreamscribeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_device_display() {
        let error = StreamscribeError::Device {
            message: "permission denied".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device unavailable: permission denied");
    }

    #[test]
    fn test_decode_display() {
        let error = StreamscribeError::Decode {
            message: "not a RIFF file".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to decode audio input: not a RIFF file"
        );
    }

    #[test]
    fn test_connect_display() {
        let error = StreamscribeError::Connect {
            message: "connection refused".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to open streaming channel: connection refused"
        );
    }

    #[test]
    fn test_protocol_display() {
        let error = StreamscribeError::Protocol {
            message: "unexpected field".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Malformed message from service: unexpected field"
        );
    }

    #[test]
    fn test_already_streaming_display() {
        let error = StreamscribeError::AlreadyStreaming;
        assert_eq!(error.to_string(), "A streaming session is already active");
    }

    #[test]
    fn test_channel_display() {
        let error = StreamscribeError::Channel {
            message: "send failed".to_string(),
        };
        assert_eq!(error.to_string(), "Streaming channel error: send failed");
    }

    #[test]
    fn test_api_display() {
        let error = StreamscribeError::Api {
            message: "500 Internal Server Error".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transcription service request failed: 500 Internal Server Error"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: StreamscribeError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: StreamscribeError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<StreamscribeError>();
        assert_sync::<StreamscribeError>();
    }

    #[test]
    fn test_error_debug_format() {
        let error = StreamscribeError::AlreadyStreaming;
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("AlreadyStreaming"));
    }
}
