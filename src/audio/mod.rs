//! Audio capture sources.
//!
//! All sources produce mono f32 PCM at 16kHz and implement the
//! [`source::AudioSource`] trait, so the streaming pipeline is identical
//! for live microphone input and decoded file playback.

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod file;
pub mod source;

#[cfg(feature = "cpal-audio")]
pub use capture::{CpalAudioSource, list_devices};
pub use file::FileAudioSource;
pub use source::{AudioSource, MockAudioSource};
