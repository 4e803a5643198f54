//! Real-time streaming transcription.
//!
//! Audio flows from an [`crate::audio::AudioSource`] through the
//! [`processor::FrameProcessor`] into [`frame::AudioFrame`]s, which a
//! [`session::StreamSession`] forwards over a duplex [`channel`] to the
//! transcription service. Results come back on the session's event stream
//! as [`protocol::TranscriptionEvent`]s.

pub mod channel;
pub mod frame;
pub mod processor;
pub mod protocol;
pub mod session;
pub mod sink;

pub use channel::{
    ChannelConnector, ChannelReceiver, ChannelSender, InboundMessage, MockConnector,
    MockServerHandle, OutboundRecord, WsConnector,
};
pub use frame::{AudioFrame, samples_from_wire_bytes};
pub use processor::{CapturePipeline, FrameProcessor, ProcessorState, StopSignal};
pub use protocol::{ControlMessage, ServerMessage, TranscriptionEvent};
pub use session::{SessionConfig, SessionState, StreamSession};
pub use sink::SessionEvent;
