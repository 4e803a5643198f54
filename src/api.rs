//! REST client for the transcription service's non-streaming endpoints.
//!
//! Covers whole-file transcription (`/transcribe/file`) and remote engine
//! configuration (`/config`). The streaming path lives in [`crate::stream`].

use crate::defaults;
use crate::error::{Result, StreamscribeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of a whole-file transcription request.
#[derive(Debug, Clone, Deserialize)]
pub struct FileTranscription {
    /// Transcribed text for the full file.
    pub text: String,
    /// Decoded audio duration in seconds.
    pub audio_duration: f64,
    /// Transcription method the service used.
    pub method: String,
    /// Server-side completion timestamp.
    pub timestamp: String,
}

/// Engine configuration as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub model_checkpoint: String,
    pub method: String,
    pub save_transcript: bool,
    pub chunk_size_ms: u64,
    pub overlap_ms: u64,
}

/// Partial update for the remote engine configuration.
///
/// Fields left as `None` are omitted from the request and keep their
/// server-side values.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoteConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_checkpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_transcript: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_ms: Option<u64>,
}

/// HTTP client bound to one service base URL.
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Creates a client for the given HTTP base URL,
    /// e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StreamscribeError::Api {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Uploads an audio file for one-shot transcription.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Api` on transport or service
    /// failure.
    pub async fn transcribe_file(&self, path: &Path) -> Result<FileTranscription> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|e| StreamscribeError::Api {
                message: format!("invalid upload part: {}", e),
            })?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}{}", self.base_url, defaults::TRANSCRIBE_FILE_PATH);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StreamscribeError::Api {
                message: format!("{}: {}", url, e),
            })?;

        Self::decode_json(response).await
    }

    /// Fetches the current engine configuration.
    pub async fn get_config(&self) -> Result<RemoteConfig> {
        let url = format!("{}{}", self.base_url, defaults::CONFIG_PATH);
        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|e| StreamscribeError::Api {
                    message: format!("{}: {}", url, e),
                })?;
        Self::decode_json(response).await
    }

    /// Applies a partial configuration update and returns the resulting
    /// configuration.
    pub async fn set_config(&self, update: &RemoteConfigUpdate) -> Result<RemoteConfig> {
        let url = format!("{}{}", self.base_url, defaults::CONFIG_PATH);
        let response = self
            .client
            .post(&url)
            .json(update)
            .send()
            .await
            .map_err(|e| StreamscribeError::Api {
                message: format!("{}: {}", url, e),
            })?;
        Self::decode_json(response).await
    }

    async fn decode_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamscribeError::Api {
                message: format!("service returned {}: {}", status, body),
            });
        }
        response.json().await.map_err(|e| StreamscribeError::Api {
            message: format!("undecodable response: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://host:8000/").unwrap();
        assert_eq!(client.base_url, "http://host:8000");
    }

    #[test]
    fn test_file_transcription_decodes() {
        let json = r#"{
            "text": "hello world",
            "audio_duration": 2.5,
            "method": "chunked",
            "timestamp": "2026-08-23T10:00:00"
        }"#;
        let result: FileTranscription = serde_json::from_str(json).unwrap();
        assert_eq!(result.text, "hello world");
        assert_eq!(result.audio_duration, 2.5);
        assert_eq!(result.method, "chunked");
    }

    #[test]
    fn test_remote_config_round_trips() {
        let config = RemoteConfig {
            model_checkpoint: "base".to_string(),
            method: "streaming".to_string(),
            save_transcript: false,
            chunk_size_ms: 500,
            overlap_ms: 100,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: RemoteConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_update_omits_unset_fields() {
        let update = RemoteConfigUpdate {
            method: Some("streaming".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"method":"streaming"}"#);
    }
}
