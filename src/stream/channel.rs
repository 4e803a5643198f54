//! Duplex channel abstraction over the streaming transport.
//!
//! The session talks to the service through the [`ChannelSender`] /
//! [`ChannelReceiver`] halves produced by a [`ChannelConnector`]. The real
//! transport is a WebSocket ([`WsConnector`]); the [`MockConnector`] swaps
//! in an in-process pair for tests.

use crate::error::{Result, StreamscribeError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Mutex as StdMutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// One inbound message from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Binary payload (unexpected from the service, but representable).
    Binary(Vec<u8>),
    /// Text payload carrying a JSON result or error.
    Text(String),
}

/// Outbound half of the duplex channel.
#[async_trait]
pub trait ChannelSender: Send + std::fmt::Debug {
    /// Sends one binary payload.
    async fn send_binary(&mut self, payload: Vec<u8>) -> Result<()>;

    /// Sends one text payload, kept distinct from the binary stream.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Closes the channel. Safe to call after the peer already closed.
    async fn close(&mut self) -> Result<()>;
}

/// Inbound half of the duplex channel.
#[async_trait]
pub trait ChannelReceiver: Send + std::fmt::Debug {
    /// Waits for the next inbound message.
    ///
    /// `None` means the channel closed; `Some(Err(_))` a transport error.
    async fn next_message(&mut self) -> Option<Result<InboundMessage>>;
}

/// Opens a duplex channel and hands out its two halves.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Connects and waits for the channel to become ready.
    ///
    /// # Errors
    /// `Connect` if the channel cannot be opened.
    async fn connect(&self) -> Result<(Box<dyn ChannelSender>, Box<dyn ChannelReceiver>)>;
}

/// WebSocket connector for the service's `/stream` endpoint.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Creates a connector for the given WebSocket URL
    /// (e.g. `ws://127.0.0.1:8000/stream`).
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The URL this connector dials.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(&self) -> Result<(Box<dyn ChannelSender>, Box<dyn ChannelReceiver>)> {
        let (ws, _response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|e| StreamscribeError::Connect {
                    message: format!("{}: {}", self.url, e),
                })?;
        log::debug!("websocket connected to {}", self.url);

        let (sink, stream) = ws.split();
        Ok((
            Box::new(WsSender { sink }),
            Box::new(WsReceiver { stream }),
        ))
    }
}

#[derive(Debug)]
struct WsSender {
    sink: SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>,
}

#[async_trait]
impl ChannelSender for WsSender {
    async fn send_binary(&mut self, payload: Vec<u8>) -> Result<()> {
        self.sink
            .send(Message::Binary(payload))
            .await
            .map_err(|e| StreamscribeError::Channel {
                message: format!("binary send failed: {}", e),
            })
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| StreamscribeError::Channel {
                message: format!("text send failed: {}", e),
            })
    }

    async fn close(&mut self) -> Result<()> {
        // Errors here usually mean the peer closed first; not actionable.
        if let Err(e) = self.sink.close().await {
            log::debug!("websocket close: {}", e);
        }
        Ok(())
    }
}

#[derive(Debug)]
struct WsReceiver {
    stream: SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

#[async_trait]
impl ChannelReceiver for WsReceiver {
    async fn next_message(&mut self) -> Option<Result<InboundMessage>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(InboundMessage::Text(text))),
                Ok(Message::Binary(bytes)) => return Some(Ok(InboundMessage::Binary(bytes))),
                Ok(Message::Close(_)) => return None,
                // Control frames handled by the library; skip.
                Ok(_) => continue,
                Err(e) => {
                    return Some(Err(StreamscribeError::Channel {
                        message: format!("receive failed: {}", e),
                    }));
                }
            }
        }
    }
}

/// What the client side of a [`MockConnector`] pair has sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundRecord {
    /// A binary frame payload.
    Binary(Vec<u8>),
    /// A text (control) message.
    Text(String),
    /// The client closed the channel.
    Closed,
}

/// Server-side handle of a mock channel pair.
///
/// Lets tests inspect everything the client sent and push inbound
/// messages toward the client.
pub struct MockServerHandle {
    /// Everything the client sent, in order.
    pub outbound_rx: mpsc::UnboundedReceiver<OutboundRecord>,
    /// Push messages for the client to receive. Drop to simulate the
    /// service closing the channel.
    pub inbound_tx: mpsc::UnboundedSender<InboundMessage>,
}

impl MockServerHandle {
    /// Drains and returns all records sent so far.
    pub fn drain_outbound(&mut self) -> Vec<OutboundRecord> {
        let mut records = Vec::new();
        while let Ok(record) = self.outbound_rx.try_recv() {
            records.push(record);
        }
        records
    }
}

/// In-process connector for tests: yields one mock channel pair.
pub struct MockConnector {
    endpoints: StdMutex<Option<(MockSender, MockReceiver)>>,
    fail_connect: bool,
}

impl MockConnector {
    /// Creates a connector plus the server-side handle of the pair.
    ///
    /// The connector hands out its channel exactly once; a second
    /// `connect` fails with `Connect`.
    pub fn new() -> (Self, MockServerHandle) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);

        let sender = MockSender {
            outbound_tx,
            closed_tx,
        };
        let receiver = MockReceiver {
            inbound_rx,
            closed_rx,
        };
        let connector = Self {
            endpoints: StdMutex::new(Some((sender, receiver))),
            fail_connect: false,
        };
        let handle = MockServerHandle {
            outbound_rx,
            inbound_tx,
        };
        (connector, handle)
    }

    /// Creates a connector whose `connect` always fails.
    pub fn failing() -> Self {
        Self {
            endpoints: StdMutex::new(None),
            fail_connect: true,
        }
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn connect(&self) -> Result<(Box<dyn ChannelSender>, Box<dyn ChannelReceiver>)> {
        if self.fail_connect {
            return Err(StreamscribeError::Connect {
                message: "mock connect failure".to_string(),
            });
        }
        let endpoints = self
            .endpoints
            .lock()
            .map_err(|_| StreamscribeError::Connect {
                message: "mock connector poisoned".to_string(),
            })?
            .take();
        match endpoints {
            Some((sender, receiver)) => Ok((Box::new(sender), Box::new(receiver))),
            None => Err(StreamscribeError::Connect {
                message: "mock channel already taken".to_string(),
            }),
        }
    }
}

#[derive(Debug)]
struct MockSender {
    outbound_tx: mpsc::UnboundedSender<OutboundRecord>,
    closed_tx: watch::Sender<bool>,
}

#[async_trait]
impl ChannelSender for MockSender {
    async fn send_binary(&mut self, payload: Vec<u8>) -> Result<()> {
        self.outbound_tx
            .send(OutboundRecord::Binary(payload))
            .map_err(|_| StreamscribeError::Channel {
                message: "mock channel closed".to_string(),
            })
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.outbound_tx
            .send(OutboundRecord::Text(text))
            .map_err(|_| StreamscribeError::Channel {
                message: "mock channel closed".to_string(),
            })
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.outbound_tx.send(OutboundRecord::Closed);
        let _ = self.closed_tx.send(true);
        Ok(())
    }
}

#[derive(Debug)]
struct MockReceiver {
    inbound_rx: mpsc::UnboundedReceiver<InboundMessage>,
    closed_rx: watch::Receiver<bool>,
}

#[async_trait]
impl ChannelReceiver for MockReceiver {
    async fn next_message(&mut self) -> Option<Result<InboundMessage>> {
        loop {
            tokio::select! {
                msg = self.inbound_rx.recv() => return msg.map(Ok),
                changed = self.closed_rx.changed() => {
                    if changed.is_err() || *self.closed_rx.borrow() {
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_pair_round_trip() {
        let (connector, mut server) = MockConnector::new();
        let (mut sender, mut receiver) = connector.connect().await.unwrap();

        sender.send_binary(vec![1, 2, 3]).await.unwrap();
        sender.send_text("hello".to_string()).await.unwrap();

        let records = server.drain_outbound();
        assert_eq!(
            records,
            vec![
                OutboundRecord::Binary(vec![1, 2, 3]),
                OutboundRecord::Text("hello".to_string()),
            ]
        );

        server
            .inbound_tx
            .send(InboundMessage::Text("result".to_string()))
            .unwrap();
        let msg = receiver.next_message().await.unwrap().unwrap();
        assert_eq!(msg, InboundMessage::Text("result".to_string()));
    }

    #[tokio::test]
    async fn test_mock_connect_is_single_use() {
        let (connector, _server) = MockConnector::new();
        connector.connect().await.unwrap();
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, StreamscribeError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_mock_failing_connector() {
        let connector = MockConnector::failing();
        assert!(connector.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_mock_receiver_ends_on_client_close() {
        let (connector, _server) = MockConnector::new();
        let (mut sender, mut receiver) = connector.connect().await.unwrap();

        sender.close().await.unwrap();
        assert!(receiver.next_message().await.is_none());
    }

    #[tokio::test]
    async fn test_mock_receiver_ends_when_server_drops() {
        let (connector, server) = MockConnector::new();
        let (_sender, mut receiver) = connector.connect().await.unwrap();

        drop(server);
        assert!(receiver.next_message().await.is_none());
    }
}
