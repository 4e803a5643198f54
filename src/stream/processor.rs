//! Frame processor and capture pipeline.
//!
//! The [`FrameProcessor`] is a plain two-state machine that converts raw
//! sample blocks into [`AudioFrame`]s. Stop is cooperative: the stop command
//! arrives on a message queue and takes effect at the next processing
//! opportunity, never preempting a block already being framed. On stop the
//! processor emits exactly one terminal sentinel and then nothing further.
//!
//! The [`CapturePipeline`] runs the processor against an [`AudioSource`] on
//! a dedicated thread, forwarding frames into an unbounded channel so the
//! capture domain never blocks waiting on the network.

use crate::audio::source::AudioSource;
use crate::error::Result;
use crate::stream::frame::AudioFrame;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;

/// Cloneable handle used to deliver the asynchronous stop command.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: crossbeam_channel::Sender<()>,
}

impl StopSignal {
    /// Requests a cooperative stop. Duplicate or late signals are harmless.
    pub fn signal(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Creates the stop command queue shared between control and capture domains.
pub fn stop_channel() -> (StopSignal, crossbeam_channel::Receiver<()>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (StopSignal { tx }, rx)
}

/// Processor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Converting sample blocks into frames.
    Running,
    /// Stop observed; the next processing opportunity emits the sentinel.
    Stopping,
}

/// Two-state machine converting sample blocks into frames.
pub struct FrameProcessor {
    state: ProcessorState,
    stop_rx: crossbeam_channel::Receiver<()>,
    sentinel_emitted: bool,
}

impl FrameProcessor {
    /// Creates a processor in the `Running` state, reading stop commands
    /// from the given queue.
    pub fn new(stop_rx: crossbeam_channel::Receiver<()>) -> Self {
        Self {
            state: ProcessorState::Running,
            stop_rx,
            sentinel_emitted: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// True once the sentinel has been emitted; no further frames follow.
    pub fn is_terminated(&self) -> bool {
        self.sentinel_emitted
    }

    /// Forces the transition to `Stopping` without a queued command.
    ///
    /// Used when the source reports natural end-of-input or a capture error.
    pub fn force_stop(&mut self) {
        self.state = ProcessorState::Stopping;
    }

    /// Handles one processing opportunity: frames the given block, then
    /// honors any queued stop command. Returns zero or one frame.
    ///
    /// While `Running`, a non-empty block yields one non-final frame; the
    /// stop command only takes effect afterwards, so a block handed to this
    /// call is never dropped. While `Stopping`, the first call yields the
    /// sentinel and every later call yields nothing.
    pub fn process(&mut self, block: &[f32]) -> Option<AudioFrame> {
        match self.state {
            ProcessorState::Running => {
                let frame = AudioFrame::from_samples(block.to_vec());
                if self.stop_rx.try_recv().is_ok() {
                    self.state = ProcessorState::Stopping;
                }
                frame
            }
            ProcessorState::Stopping => {
                // Drain any late stop commands so a duplicate signal cannot
                // be observed by a future processor on the same queue.
                while self.stop_rx.try_recv().is_ok() {}
                if self.sentinel_emitted {
                    None
                } else {
                    self.sentinel_emitted = true;
                    Some(AudioFrame::sentinel())
                }
            }
        }
    }
}

/// Handle to the capture thread driving an audio source through a processor.
pub struct CapturePipeline {
    stop: StopSignal,
    join: Option<thread::JoinHandle<()>>,
}

impl CapturePipeline {
    /// Starts the source and spawns the capture thread.
    ///
    /// Frames are forwarded into `frame_tx` in production order, ending with
    /// the sentinel. The thread exits after the sentinel (or when the frame
    /// receiver is dropped) and stops the source on its way out.
    ///
    /// # Errors
    /// Propagates the source's `start()` failure (device unavailable,
    /// undecodable input); no thread is spawned in that case.
    pub fn spawn(
        mut source: Box<dyn AudioSource>,
        frame_tx: mpsc::UnboundedSender<AudioFrame>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let (stop, stop_rx) = stop_channel();
        source.start()?;

        let join = thread::spawn(move || {
            let mut processor = FrameProcessor::new(stop_rx);
            while !processor.is_terminated() {
                if processor.state() == ProcessorState::Stopping {
                    if let Some(sentinel) = processor.process(&[]) {
                        let _ = frame_tx.send(sentinel);
                    }
                    break;
                }
                match source.read_samples() {
                    Ok(Some(block)) if !block.is_empty() => {
                        if let Some(frame) = processor.process(&block)
                            && frame_tx.send(frame).is_err()
                        {
                            // Session gone; nothing left to deliver to.
                            break;
                        }
                    }
                    Ok(Some(_)) => {
                        // No samples ready yet. Give the stop queue a
                        // processing opportunity, then wait briefly.
                        processor.process(&[]);
                        thread::sleep(poll_interval);
                    }
                    Ok(None) => {
                        log::debug!("audio source reached end of input");
                        processor.force_stop();
                    }
                    Err(e) => {
                        log::error!("audio capture error: {}", e);
                        processor.force_stop();
                    }
                }
            }
            if let Err(e) = source.stop() {
                log::warn!("failed to stop audio source: {}", e);
            }
        });

        Ok(Self {
            stop,
            join: Some(join),
        })
    }

    /// Returns a handle for delivering the stop command.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Signals stop and waits for the capture thread to release the source.
    ///
    /// Blocking; call from a context that may park (teardown runs this via
    /// `spawn_blocking`). Safe to call after the thread already exited.
    pub fn shutdown(mut self) {
        self.stop.signal();
        if let Some(join) = self.join.take()
            && join.join().is_err()
        {
            log::error!("capture thread panicked during shutdown");
        }
    }
}
