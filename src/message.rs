//! The `Message` tagged union and its payload types.
//!
//! `Message` is the single datum that flows in both directions: microphone
//! receivers post inbound variants (`Hotword`, `Audio`, `AudioDone`,
//! `ConnectionCheck`, `DebugFile`), and the coordinator fans outbound
//! variants (`IntentResult`, `IntentError`, `StreamOpen`, `ConnectionResult`,
//! `StopSignal`, `TestStarted`) back out to consumers.

use crate::error::{ConnectionCode, ErrorKind};

/// 16-bit signed PCM, 16kHz, mono.
pub type Pcm = Vec<i16>;

/// The high-level kind of speech stream a `Hotword` event is requesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Normal,
    Blackjack,
    KnowledgeGraph,
}

/// Request to open a speech stream.
#[derive(Debug, Clone)]
pub struct Hotword {
    pub mode: StreamType,
    pub locale: String,
    pub no_logging: bool,
    /// Only consulted for `StreamType::KnowledgeGraph`; ignored otherwise.
    pub timezone: Option<String>,
}

/// Opaque pass-through payload; the coordinator never inspects its contents.
#[derive(Debug, Clone, Default)]
pub struct DebugFile {
    pub payload: Vec<u8>,
}

/// The structured interpretation of an utterance, as returned by the cloud.
///
/// The real payload shape is owned by the wire protocol (out of scope here);
/// `payload` is a stand-in consumers can deserialize however they like.
#[derive(Debug, Clone)]
pub struct IntentResult {
    pub payload: String,
}

/// An error surfaced to intent consumers, tagged with its classification.
#[derive(Debug, Clone)]
pub struct IntentError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of an out-of-band connectivity probe.
#[derive(Debug, Clone)]
pub struct ConnectionResult {
    pub num_packets: u8,
    pub expected_packets: u8,
    pub code: ConnectionCode,
    pub status: String,
}

/// The primary inter-component datum.
#[derive(Debug, Clone)]
pub enum Message {
    // Inbound (mic -> coordinator)
    Hotword(Hotword),
    Audio { samples: Pcm },
    AudioDone,
    ConnectionCheck,
    DebugFile(DebugFile),

    // Outbound (coordinator -> consumers / mics)
    IntentResult(IntentResult),
    IntentError(IntentError),
    StreamOpen { session: String },
    ConnectionResult(ConnectionResult),
    StopSignal,
    TestStarted,
}
