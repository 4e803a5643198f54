//! Inbound result delivery.
//!
//! The [`ResultSink`] runs as a task for the lifetime of the channel's
//! receive half. It parses every inbound message, forwards transcription
//! results and service errors to the session's event stream, and flags the
//! arrival of the final result so the stop handshake can complete.

use crate::error::StreamscribeError;
use crate::stream::channel::{ChannelReceiver, InboundMessage};
use crate::stream::protocol::{ServerMessage, TranscriptionEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, mpsc};

/// One event delivered to the session consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A partial or final transcription result.
    Transcription(TranscriptionEvent),
    /// An error reported by the service. The stream stays up; the service
    /// decides whether it can keep transcribing.
    Error(String),
}

/// How the sink's run loop ended.
#[derive(Debug)]
pub(crate) enum SinkOutcome {
    /// The channel closed (peer close or local teardown).
    ChannelClosed,
    /// The transport failed mid-stream.
    Failed(StreamscribeError),
}

pub(crate) struct ResultSink {
    receiver: Box<dyn ChannelReceiver>,
    events: mpsc::UnboundedSender<SessionEvent>,
    final_seen: Arc<AtomicBool>,
    final_event: Arc<Notify>,
}

impl ResultSink {
    pub(crate) fn new(
        receiver: Box<dyn ChannelReceiver>,
        events: mpsc::UnboundedSender<SessionEvent>,
        final_seen: Arc<AtomicBool>,
        final_event: Arc<Notify>,
    ) -> Self {
        Self {
            receiver,
            events,
            final_seen,
            final_event,
        }
    }

    /// Consumes inbound messages until the channel ends.
    ///
    /// Malformed messages are logged and dropped; the stream keeps going.
    pub(crate) async fn run(mut self) -> SinkOutcome {
        loop {
            match self.receiver.next_message().await {
                Some(Ok(InboundMessage::Text(text))) => self.handle_text(&text),
                Some(Ok(InboundMessage::Binary(bytes))) => {
                    log::warn!("dropping unexpected {}-byte binary message", bytes.len());
                }
                Some(Err(e)) => return SinkOutcome::Failed(e),
                None => return SinkOutcome::ChannelClosed,
            }
        }
    }

    fn handle_text(&self, text: &str) {
        match ServerMessage::parse(text) {
            Ok(ServerMessage::Result(event)) => {
                let is_final = event.is_final;
                log::debug!(
                    "transcription ({}): {:?}",
                    if is_final { "final" } else { "partial" },
                    event.text
                );
                // Consumer may have dropped the event stream; keep the
                // handshake flag accurate regardless.
                let _ = self.events.send(SessionEvent::Transcription(event));
                if is_final {
                    self.final_seen.store(true, Ordering::Release);
                    self.final_event.notify_waiters();
                }
            }
            Ok(ServerMessage::Error { error }) => {
                log::warn!("service reported error: {}", error);
                let _ = self.events.send(SessionEvent::Error(error));
            }
            Err(e) => {
                log::warn!("dropping malformed message: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::channel::{ChannelConnector, MockConnector};

    fn sink_parts() -> (
        mpsc::UnboundedSender<SessionEvent>,
        mpsc::UnboundedReceiver<SessionEvent>,
        Arc<AtomicBool>,
        Arc<Notify>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, rx, Arc::new(AtomicBool::new(false)), Arc::new(Notify::new()))
    }

    #[tokio::test]
    async fn test_sink_delivers_partial_and_final() {
        let (connector, server) = MockConnector::new();
        let (_sender, receiver) = connector.connect().await.unwrap();
        let (tx, mut rx, final_seen, final_event) = sink_parts();

        let sink = ResultSink::new(receiver, tx, final_seen.clone(), final_event);
        let task = tokio::spawn(sink.run());

        server
            .inbound_tx
            .send(InboundMessage::Text(
                r#"{"text": "hel", "is_final": false}"#.to_string(),
            ))
            .unwrap();
        server
            .inbound_tx
            .send(InboundMessage::Text(
                r#"{"text": "hello", "is_final": true}"#.to_string(),
            ))
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            SessionEvent::Transcription(TranscriptionEvent {
                text: "hel".to_string(),
                is_final: false,
            })
        );
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second,
            SessionEvent::Transcription(TranscriptionEvent { is_final: true, .. })
        ));
        assert!(final_seen.load(Ordering::Acquire));

        drop(server);
        assert!(matches!(task.await.unwrap(), SinkOutcome::ChannelClosed));
    }

    #[tokio::test]
    async fn test_sink_drops_malformed_then_delivers_valid() {
        let (connector, server) = MockConnector::new();
        let (_sender, receiver) = connector.connect().await.unwrap();
        let (tx, mut rx, final_seen, final_event) = sink_parts();

        let sink = ResultSink::new(receiver, tx, final_seen.clone(), final_event);
        let _task = tokio::spawn(sink.run());

        server
            .inbound_tx
            .send(InboundMessage::Text("{not json".to_string()))
            .unwrap();
        server
            .inbound_tx
            .send(InboundMessage::Text(
                r#"{"text": "ok", "is_final": false}"#.to_string(),
            ))
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            SessionEvent::Transcription(TranscriptionEvent {
                text: "ok".to_string(),
                is_final: false,
            })
        );
        assert!(!final_seen.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_sink_surfaces_service_error() {
        let (connector, server) = MockConnector::new();
        let (_sender, receiver) = connector.connect().await.unwrap();
        let (tx, mut rx, final_seen, final_event) = sink_parts();

        let sink = ResultSink::new(receiver, tx, final_seen, final_event);
        let _task = tokio::spawn(sink.run());

        server
            .inbound_tx
            .send(InboundMessage::Text(
                r#"{"error": "model not loaded"}"#.to_string(),
            ))
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            SessionEvent::Error("model not loaded".to_string())
        );
    }

    #[tokio::test]
    async fn test_sink_final_notifies_waiter() {
        let (connector, server) = MockConnector::new();
        let (_sender, receiver) = connector.connect().await.unwrap();
        let (tx, _rx, final_seen, final_event) = sink_parts();

        let sink = ResultSink::new(receiver, tx, final_seen.clone(), final_event.clone());
        let _task = tokio::spawn(sink.run());

        let notified = final_event.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        server
            .inbound_tx
            .send(InboundMessage::Text(
                r#"{"text": "done", "is_final": true}"#.to_string(),
            ))
            .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), notified)
            .await
            .expect("final notification should arrive");
        assert!(final_seen.load(Ordering::Acquire));
    }
}
