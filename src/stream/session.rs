//! Streaming session orchestration.
//!
//! A [`StreamSession`] ties the capture pipeline to the duplex channel:
//! frames flow out in production order, results flow back through the
//! session's event stream, and the stop handshake closes everything down
//! exactly once regardless of who initiates it.
//!
//! ```text
//!   AudioSource ──► CapturePipeline ──► forwarder ──► ChannelSender
//!                                          │
//!   consumer ◄── events ◄── ResultSink ◄── ChannelReceiver
//! ```
//!
//! Stop has two phases. Phase one delivers the stop command into the
//! capture domain; the pipeline winds down and the forwarder sends the
//! `isLastChunk` control message after the last audio frame. Phase two is
//! a bounded wait for the service's final result, after which the channel
//! closes whether or not the final arrived. Natural end-of-input follows
//! the same path without any caller involvement.

use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{Result, StreamscribeError};
use crate::stream::channel::{ChannelConnector, ChannelSender};
use crate::stream::frame::AudioFrame;
use crate::stream::processor::{CapturePipeline, StopSignal};
use crate::stream::protocol::ControlMessage;
use crate::stream::sink::{ResultSink, SessionEvent, SinkOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex as TokioMutex, Notify, mpsc};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session underway.
    Idle,
    /// Channel being opened.
    Connecting,
    /// Audio flowing, results arriving.
    Streaming,
    /// Stop handshake in progress.
    Stopping,
    /// Session ended cleanly.
    Closed,
    /// Session ended on a connect or transport failure.
    Errored,
}

impl SessionState {
    /// True for states a new `start` may proceed from.
    fn is_restartable(self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Errored)
    }

    /// True once the session has fully ended.
    fn is_terminal(self) -> bool {
        matches!(self, Self::Idle | Self::Closed | Self::Errored)
    }
}

/// Tunable session parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    handshake_timeout: Duration,
    poll_interval: Duration,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            handshake_timeout: defaults::handshake_timeout(),
            poll_interval: defaults::poll_interval(),
        }
    }

    /// Overrides the bounded wait for the final result during stop.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Overrides the capture thread's idle poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

type SharedSender = Arc<TokioMutex<Box<dyn ChannelSender>>>;

/// Resources released exactly once at teardown.
struct Teardown {
    sender: SharedSender,
    pipeline: CapturePipeline,
}

/// State shared between the session handle and its tasks.
struct SessionShared {
    state: StdMutex<SessionState>,
    pending_stop: AtomicBool,
    final_seen: Arc<AtomicBool>,
    final_event: Arc<Notify>,
    closed: Notify,
    stop_signal: StdMutex<Option<StopSignal>>,
    teardown: TokioMutex<Option<Teardown>>,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            state: StdMutex::new(SessionState::Idle),
            pending_stop: AtomicBool::new(false),
            final_seen: Arc::new(AtomicBool::new(false)),
            final_event: Arc::new(Notify::new()),
            closed: Notify::new(),
            stop_signal: StdMutex::new(None),
            teardown: TokioMutex::new(None),
        }
    }

    fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        log::debug!("session state: {:?}", state);
    }

    /// Releases the channel and capture resources. Later calls find the
    /// resources already taken and do nothing.
    async fn teardown(&self) {
        let resources = self.teardown.lock().await.take();
        let Some(Teardown { sender, pipeline }) = resources else {
            return;
        };
        {
            let mut sender = sender.lock().await;
            if let Err(e) = sender.close().await {
                log::debug!("channel close: {}", e);
            }
        }
        // The capture thread join may park; keep it off the runtime.
        if tokio::task::spawn_blocking(move || pipeline.shutdown())
            .await
            .is_err()
        {
            log::error!("capture shutdown task panicked");
        }
    }

    /// Tears down, moves to `final_state` (an earlier `Errored` sticks),
    /// and wakes every `stop` waiter.
    async fn finish(&self, final_state: SessionState) {
        self.teardown().await;
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != SessionState::Errored {
                *state = final_state;
            }
        }
        self.closed.notify_waiters();
    }

    /// Marks the session failed and closes it down.
    async fn fail(&self, events: &mpsc::UnboundedSender<SessionEvent>, message: String) {
        log::error!("session failed: {}", message);
        self.set_state(SessionState::Errored);
        let _ = events.send(SessionEvent::Error(message));
        self.finish(SessionState::Errored).await;
    }

    /// Waits up to `timeout` for the final result flag.
    async fn wait_for_final(&self, timeout: Duration) {
        let notified = self.final_event.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a notification between the
        // check and the await cannot be missed.
        notified.as_mut().enable();
        if self.final_seen.load(Ordering::Acquire) {
            return;
        }
        if tokio::time::timeout(timeout, notified).await.is_err() {
            log::warn!(
                "no final result within {}ms; closing anyway",
                timeout.as_millis()
            );
        }
    }
}

/// A transcription streaming session over a duplex channel.
///
/// One session handle supports at most one active stream at a time;
/// `start` on an active session fails with `AlreadyStreaming`. After a
/// session reaches `Closed` or `Errored` the handle may start again,
/// provided the connector supports reconnecting.
pub struct StreamSession {
    connector: Arc<dyn ChannelConnector>,
    config: SessionConfig,
    shared: Arc<SessionShared>,
}

impl StreamSession {
    /// Creates an idle session over the given connector.
    pub fn new<C>(connector: C, config: SessionConfig) -> Self
    where
        C: ChannelConnector + 'static,
    {
        Self {
            connector: Arc::new(connector),
            config,
            shared: Arc::new(SessionShared::new()),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Opens the channel, starts capture, and begins streaming.
    ///
    /// Returns the session's event stream. The stream ends when the
    /// session closes; results arriving after teardown are not delivered.
    ///
    /// # Errors
    /// `AlreadyStreaming` if a stream is active, `Connect` if the channel
    /// cannot be opened, `Device` or `Decode` if the source fails to start.
    pub async fn start(
        &self,
        source: Box<dyn AudioSource>,
    ) -> Result<mpsc::UnboundedReceiver<SessionEvent>> {
        {
            let mut state = self.shared.state.lock().unwrap_or_else(|e| e.into_inner());
            if !state.is_restartable() {
                return Err(StreamscribeError::AlreadyStreaming);
            }
            *state = SessionState::Connecting;
        }
        self.shared.pending_stop.store(false, Ordering::Release);
        self.shared.final_seen.store(false, Ordering::Release);

        let (sender, receiver) = match self.connector.connect().await {
            Ok(halves) => halves,
            Err(e) => {
                // finish, not a bare state write: a stop() issued during
                // Connecting is parked on the closed notification.
                self.shared.finish(SessionState::Errored).await;
                return Err(e);
            }
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();

        let pipeline =
            match CapturePipeline::spawn(source, frame_tx, self.config.poll_interval) {
                Ok(pipeline) => pipeline,
                Err(e) => {
                    let mut sender = sender;
                    if let Err(close_err) = sender.close().await {
                        log::debug!("channel close: {}", close_err);
                    }
                    self.shared.finish(SessionState::Errored).await;
                    return Err(e);
                }
            };

        let sender: SharedSender = Arc::new(TokioMutex::new(sender));
        {
            let mut slot = self
                .shared
                .stop_signal
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            *slot = Some(pipeline.stop_signal());
        }
        *self.shared.teardown.lock().await = Some(Teardown {
            sender: sender.clone(),
            pipeline,
        });

        // Streaming must be stamped before the tasks exist: a short source
        // can reach Stopping or Closed immediately, and a later write here
        // would overwrite that.
        self.shared.set_state(SessionState::Streaming);

        let sink = ResultSink::new(
            receiver,
            event_tx.clone(),
            self.shared.final_seen.clone(),
            self.shared.final_event.clone(),
        );
        tokio::spawn(run_sink(sink, self.shared.clone(), event_tx.clone()));
        tokio::spawn(run_forwarder(
            frame_rx,
            sender,
            self.shared.clone(),
            event_tx,
            self.config.handshake_timeout,
        ));

        // A stop may have been requested while the channel was still being
        // opened, before this pipeline's stop handle existed.
        if self.shared.pending_stop.load(Ordering::Acquire) {
            let signal = {
                let slot = self
                    .shared
                    .stop_signal
                    .lock()
                    .unwrap_or_else(|e| e.into_inner());
                slot.clone()
            };
            if let Some(signal) = signal {
                signal.signal();
            }
        }
        Ok(event_rx)
    }

    /// Requests a stop and waits for the session to end.
    ///
    /// The first call delivers the stop command; later calls, and calls on
    /// an already-ended session, wait for the same teardown without side
    /// effects. The wait is bounded by the handshake timeout plus teardown,
    /// never indefinite.
    pub async fn stop(&self) -> Result<()> {
        if self.shared.state().is_terminal() {
            return Ok(());
        }
        if !self.shared.pending_stop.swap(true, Ordering::AcqRel) {
            let signal = {
                let slot = self
                    .shared
                    .stop_signal
                    .lock()
                    .unwrap_or_else(|e| e.into_inner());
                slot.clone()
            };
            if let Some(signal) = signal {
                signal.signal();
            }
        }
        loop {
            let notified = self.shared.closed.notified();
            tokio::pin!(notified);
            // Register before the state check; see wait_for_final.
            notified.as_mut().enable();
            if self.shared.state().is_terminal() {
                return Ok(());
            }
            notified.await;
        }
    }
}

/// Drives the sink and handles the channel ending out from under a live
/// stream.
async fn run_sink(
    sink: ResultSink,
    shared: Arc<SessionShared>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    match sink.run().await {
        SinkOutcome::ChannelClosed => {
            // Expected during stop/teardown; anything else is a dropped
            // connection.
            if shared.state() == SessionState::Streaming {
                shared
                    .fail(&events, "channel closed unexpectedly".to_string())
                    .await;
            }
        }
        SinkOutcome::Failed(e) => {
            if !shared.state().is_terminal() {
                shared.fail(&events, e.to_string()).await;
            }
        }
    }
}

/// Forwards frames to the channel in production order. The sentinel turns
/// into the control message and kicks off the close handshake.
async fn run_forwarder(
    mut frames: mpsc::UnboundedReceiver<AudioFrame>,
    sender: SharedSender,
    shared: Arc<SessionShared>,
    events: mpsc::UnboundedSender<SessionEvent>,
    handshake_timeout: Duration,
) {
    loop {
        let Some(frame) = frames.recv().await else {
            // Capture ended without a sentinel (thread lost). Close down
            // as if stop completed.
            shared.finish(SessionState::Closed).await;
            return;
        };

        if frame.is_last_chunk() {
            shared.set_state(SessionState::Stopping);
            let control = match ControlMessage::last_chunk().to_json() {
                Ok(control) => control,
                Err(e) => {
                    shared.fail(&events, e.to_string()).await;
                    return;
                }
            };
            let sent = {
                let mut sender = sender.lock().await;
                sender.send_text(control).await
            };
            if let Err(e) = sent {
                shared.fail(&events, e.to_string()).await;
                return;
            }
            shared.wait_for_final(handshake_timeout).await;
            shared.finish(SessionState::Closed).await;
            return;
        }

        let sent = {
            let mut sender = sender.lock().await;
            sender.send_binary(frame.to_wire_bytes()).await
        };
        if let Err(e) = sent {
            shared.fail(&events, e.to_string()).await;
            return;
        }
    }
}
