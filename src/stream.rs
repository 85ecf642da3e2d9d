//! The outbound cloud stream: its narrow external contract, construction
//! options, and the in-scope handle the coordinator drives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::config::DEFAULT_TIMEOUT;
use crate::error::ErrorKind;
use crate::locale::{Language, RobotMode};
use crate::message::{ConnectionResult, IntentResult};

/// Locally-unique identity for one stream. Used as the "back-pointer" that
/// lets the coordinator tell a fresh result from a stale one: the channel
/// bundles themselves are reused across streams (see module docs on
/// [`crate::coordinator`]), so channel identity alone can't discriminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

impl StreamId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Audio compression parameters passed to the cloud client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOptions {
    pub enabled: bool,
    pub bitrate: u32,
    pub complexity: u8,
    pub frame_size: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            bitrate: 66 * 1024,
            complexity: 0,
            frame_size: 60,
        }
    }
}

/// What a stream is for - selects the cloud client's construction path.
#[derive(Debug, Clone)]
pub enum StreamPurpose {
    Intent { robot_mode: RobotMode, handler: String },
    IntentGraph { robot_mode: RobotMode, handler: String },
    KnowledgeGraph { timezone: Option<String> },
    ConnectionCheck { total_audio_ms: u32, audio_per_request_ms: u32 },
}

/// Full set of options used to open a stream, mirroring the external
/// cloud-client contract.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub compress: CompressOptions,
    pub timeout: Duration,
    pub language: Language,
    pub save_audio: bool,
    pub no_das: bool,
    pub purpose: StreamPurpose,
    pub require_token: bool,
    pub endpoint: String,
}

impl StreamOptions {
    pub fn new(language: Language, purpose: StreamPurpose) -> Self {
        Self {
            compress: CompressOptions::default(),
            timeout: DEFAULT_TIMEOUT,
            language,
            save_audio: false,
            no_das: false,
            purpose,
            require_token: true,
            endpoint: String::new(),
        }
    }
}

/// Clones of the coordinator's result-channel senders, tagged with the
/// `StreamId` a [`CloudStream`] implementation should stamp its replies
/// with. Any subset of the optional fields may be unused by a given
/// [`StreamPurpose`] - e.g. a connection check never sends on `intent`.
#[derive(Clone)]
pub struct ReplySink {
    pub id: StreamId,
    pub intent: Option<Sender<(StreamId, IntentResult)>>,
    pub error: Sender<(StreamId, ErrorKind, String)>,
    pub open: Sender<(StreamId, String)>,
    pub connection: Option<Sender<(StreamId, ConnectionResult)>>,
}

/// The narrow external contract this crate depends on but does not
/// implement - the real cloud speech RPC client, out of scope here.
pub trait CloudStream: Send {
    fn add_samples(&self, pcm: &[i16]) -> Result<(), ErrorKind>;
    fn close_send(&self) -> Result<(), ErrorKind>;
    fn close(&self);
}

/// Opens a [`CloudStream`] bound to a [`StreamId`], publishing results on
/// the given [`ReplySink`]. A real implementation owns whatever background
/// threads it needs to read RPC responses; tests supply a synchronous fake.
pub trait StreamFactory: Send + Sync {
    fn open(&self, id: StreamId, opts: StreamOptions, replies: ReplySink) -> Box<dyn CloudStream>;
}

/// Owned by the coordinator, at most one at a time. Wraps a [`CloudStream`]
/// with the bookkeeping the event loop needs: its identity, its purpose,
/// when it was opened, and whether it has already been closed.
pub struct StreamHandle {
    id: StreamId,
    cloud: Box<dyn CloudStream>,
    purpose: StreamPurpose,
    opened_at: Instant,
    closed: bool,
}

impl StreamHandle {
    pub fn open(factory: &dyn StreamFactory, opts: StreamOptions, replies_without_id: ReplySinkTemplate) -> Self {
        let id = StreamId::next();
        let purpose = opts.purpose.clone();
        let replies = replies_without_id.into_sink(id);
        let cloud = factory.open(id, opts, replies);
        Self {
            id,
            cloud,
            purpose,
            opened_at: Instant::now(),
            closed: false,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn purpose(&self) -> &StreamPurpose {
        &self.purpose
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Enqueue audio for sending. Logged and ignored on failure - the
    /// caller is never blocked beyond whatever the `CloudStream`
    /// implementation's flow control does internally.
    pub fn add_samples(&self, pcm: &[i16]) {
        if let Err(e) = self.cloud.add_samples(pcm) {
            log::warn!("stream {:?}: add_samples failed: {e}", self.id);
        }
    }

    /// Half-close: no more audio is coming.
    pub fn close_send(&self) {
        if let Err(e) = self.cloud.close_send() {
            log::warn!("stream {:?}: close_send failed: {e}", self.id);
        }
    }

    /// Full cancellation. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.cloud.close();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// The two coordinator-owned result bundles (one for normal streams, one
/// for connection checks) minus the `StreamId`, which is only known once
/// [`StreamHandle::open`] has generated one. Building this separately keeps
/// `StreamId` generation inside the handle rather than the coordinator.
pub struct ReplySinkTemplate {
    pub intent: Option<Sender<(StreamId, IntentResult)>>,
    pub error: Sender<(StreamId, ErrorKind, String)>,
    pub open: Sender<(StreamId, String)>,
    pub connection: Option<Sender<(StreamId, ConnectionResult)>>,
}

impl ReplySinkTemplate {
    fn into_sink(self, id: StreamId) -> ReplySink {
        ReplySink {
            id,
            intent: self.intent,
            error: self.error,
            open: self.open,
            connection: self.connection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    struct NoopStream;
    impl CloudStream for NoopStream {
        fn add_samples(&self, _pcm: &[i16]) -> Result<(), ErrorKind> {
            Ok(())
        }
        fn close_send(&self) -> Result<(), ErrorKind> {
            Ok(())
        }
        fn close(&self) {}
    }

    struct NoopFactory;
    impl StreamFactory for NoopFactory {
        fn open(&self, _id: StreamId, _opts: StreamOptions, _replies: ReplySink) -> Box<dyn CloudStream> {
            Box::new(NoopStream)
        }
    }

    fn template() -> ReplySinkTemplate {
        let (etx, _erx) = unbounded();
        let (otx, _orx) = unbounded();
        ReplySinkTemplate {
            intent: None,
            error: etx,
            open: otx,
            connection: None,
        }
    }

    #[test]
    fn distinct_handles_get_distinct_ids() {
        let factory = NoopFactory;
        let a = StreamHandle::open(
            &factory,
            StreamOptions::new(Language::EnglishUs, StreamPurpose::ConnectionCheck {
                total_audio_ms: 6000,
                audio_per_request_ms: 120,
            }),
            template(),
        );
        let b = StreamHandle::open(
            &factory,
            StreamOptions::new(Language::EnglishUs, StreamPurpose::ConnectionCheck {
                total_audio_ms: 6000,
                audio_per_request_ms: 120,
            }),
            template(),
        );
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn close_is_idempotent() {
        let factory = NoopFactory;
        let mut handle = StreamHandle::open(
            &factory,
            StreamOptions::new(Language::EnglishUs, StreamPurpose::ConnectionCheck {
                total_audio_ms: 6000,
                audio_per_request_ms: 120,
            }),
            template(),
        );
        handle.close();
        handle.close();
    }
}
