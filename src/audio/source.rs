//! Audio source abstraction.

use crate::error::{Result, StreamscribeError};
use std::collections::VecDeque;

/// Trait for audio sources feeding the capture pipeline.
///
/// This trait allows swapping implementations (microphone, decoded file,
/// mock). All sources produce mono f32 PCM at the session sample rate.
pub trait AudioSource: Send {
    /// Start producing audio.
    ///
    /// Acquires the underlying device or decoder resource. Must be called
    /// before the first `read_samples`.
    fn start(&mut self) -> Result<()>;

    /// Stop producing audio and release the underlying resource.
    ///
    /// Safe to call more than once.
    fn stop(&mut self) -> Result<()>;

    /// Read the next block of samples.
    ///
    /// # Returns
    /// - `Ok(Some(block))` — a block of samples; an empty block means
    ///   nothing is ready yet and the caller should poll again.
    /// - `Ok(None)` — natural end of input (file playback completed); live
    ///   sources never return this.
    fn read_samples(&mut self) -> Result<Option<Vec<f32>>>;
}

/// Mock audio source for testing.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    blocks: VecDeque<Vec<f32>>,
    looping_block: Option<Vec<f32>>,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock source with no queued audio.
    pub fn new() -> Self {
        Self {
            is_started: false,
            blocks: VecDeque::new(),
            looping_block: None,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Queue a finite sequence of blocks, followed by end-of-input.
    pub fn with_blocks(mut self, blocks: Vec<Vec<f32>>) -> Self {
        self.blocks = blocks.into();
        self
    }

    /// Repeat the given block forever once queued blocks are exhausted,
    /// emulating a live microphone that never ends on its own.
    pub fn with_looping_block(mut self, block: Vec<f32>) -> Self {
        self.looping_block = Some(block);
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read.
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the source is started.
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(StreamscribeError::Device {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Option<Vec<f32>>> {
        if self.should_fail_read {
            return Err(StreamscribeError::Device {
                message: self.error_message.clone(),
            });
        }
        if let Some(block) = self.blocks.pop_front() {
            return Ok(Some(block));
        }
        match &self.looping_block {
            Some(block) => Ok(Some(block.clone())),
            None => Ok(None),
        }
    }
}
