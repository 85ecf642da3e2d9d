//! Mediates between on-device microphone receivers and a single outbound
//! cloud speech stream at a time.
//!
//! At most one [`stream::StreamHandle`] is ever open: a hotword or a
//! connection-check request opens one, and a terminal result (an intent,
//! an error, or a connection-check outcome) closes it and returns the
//! coordinator to idle. While idle, audio chunks are run through a cheap
//! feature-based pre-filter; a buffer that plausibly contains a hotword is
//! turned into a synthetic `Hotword` message and fed back through the same
//! inbound channel the coordinator already drains.
//!
//! [`coordinator::Coordinator`] is the entry point: register receivers
//! with [`coordinator::Coordinator::add_receiver`], intent sinks with
//! [`coordinator::Coordinator::add_intent_sink`], then call
//! [`coordinator::Coordinator::run`] on a dedicated thread.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod features;
pub mod hotword;
pub mod locale;
pub mod message;
pub mod receiver;
pub mod stream;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, ErrorListener, IntentSink};
pub use error::{ConnectionCode, ErrorKind};
pub use locale::{Language, RobotMode};
pub use message::{
    ConnectionResult, DebugFile, Hotword, IntentError, IntentResult, Message, Pcm, StreamType,
};
pub use receiver::{Multiplexer, Receiver};
pub use stream::{CloudStream, StreamFactory, StreamHandle, StreamId, StreamOptions, StreamPurpose};
