//! Wire protocol types for the `/stream` endpoint.
//!
//! Outbound: binary messages carrying raw little-endian f32 PCM (see
//! [`crate::stream::frame`]) followed by exactly one text
//! `{"isLastChunk": true}` control message.
//!
//! Inbound: text messages `{"text": ..., "is_final": ...}` for partial and
//! final results, or `{"error": ...}` on service failure.

use crate::error::{Result, StreamscribeError};
use serde::{Deserialize, Serialize};

/// Outbound control message marking end of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    #[serde(rename = "isLastChunk")]
    pub is_last_chunk: bool,
}

impl ControlMessage {
    /// The single outbound shape: `{"isLastChunk": true}`.
    pub fn last_chunk() -> Self {
        Self {
            is_last_chunk: true,
        }
    }

    /// Serializes the message to its JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| StreamscribeError::Protocol {
            message: format!("failed to encode control message: {}", e),
        })
    }
}

/// A transcription result delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranscriptionEvent {
    /// Transcribed text for this result.
    pub text: String,
    /// True for the single final result that closes a session.
    pub is_final: bool,
}

/// Inbound message shapes from the service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Service-side failure report.
    Error { error: String },
    /// Partial or final transcription result.
    Result(TranscriptionEvent),
}

impl ServerMessage {
    /// Parses one inbound text message.
    ///
    /// Returns [`StreamscribeError::Protocol`] for anything that is neither
    /// a result nor an error shape; callers drop such messages without
    /// terminating the session.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| StreamscribeError::Protocol {
            message: format!("unparseable inbound message: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_message_json_shape() {
        let json = ControlMessage::last_chunk().to_json().unwrap();
        assert_eq!(json, r#"{"isLastChunk":true}"#);
    }

    #[test]
    fn test_parse_partial_result() {
        let msg = ServerMessage::parse(r#"{"text": "hel", "is_final": false}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Result(TranscriptionEvent {
                text: "hel".to_string(),
                is_final: false,
            })
        );
    }

    #[test]
    fn test_parse_final_result() {
        let msg = ServerMessage::parse(r#"{"text": "hello", "is_final": true}"#).unwrap();
        match msg {
            ServerMessage::Result(event) => {
                assert_eq!(event.text, "hello");
                assert!(event.is_final);
            }
            other => panic!("expected result, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_shape() {
        let msg = ServerMessage::parse(r#"{"error": "model crashed"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error {
                error: "model crashed".to_string()
            }
        );
    }

    #[test]
    fn test_parse_malformed_is_protocol_error() {
        let err = ServerMessage::parse("not json at all").unwrap_err();
        assert!(matches!(err, StreamscribeError::Protocol { .. }));
    }

    #[test]
    fn test_parse_unknown_shape_is_protocol_error() {
        let err = ServerMessage::parse(r#"{"status": "ok"}"#).unwrap_err();
        assert!(matches!(err, StreamscribeError::Protocol { .. }));
    }
}
