//! The session coordinator event loop and response fan-out.
//!
//! A `Coordinator` owns exactly one active [`StreamHandle`] at a time.
//! Inbound mic traffic (fanned in by the [`Multiplexer`]) and the two
//! result bundles a stream can publish on - one for ordinary
//! intent/connection-check streams, which carry [`StreamId`] so a result
//! from a superseded stream is recognized and dropped rather than acted on
//! a second time - are all drained from one `select!` so the loop never
//! blocks on any single source.

use crossbeam_channel::{unbounded, Receiver as ChanReceiver, Sender};

use crate::config::{self, CoordinatorConfig};
use crate::error::{ConnectionCode, ErrorKind};
use crate::hotword::would_contain_hotword;
use crate::locale::{mode_for_stream_type, parse_locale, Language};
use crate::message::{
    ConnectionResult, DebugFile, Hotword, IntentError, IntentResult, Message, Pcm, StreamType,
};
use crate::receiver::{Multiplexer, Receiver as MicReceiver, TaggedMessage};
use crate::stream::{
    ReplySinkTemplate, StreamFactory, StreamHandle, StreamId, StreamOptions, StreamPurpose,
};

/// Where fanned-out `Message`s (results, errors, opens) are delivered.
///
/// Blanket-implemented for `Sender<Message>` so a plain channel works as a
/// sink without any wrapper; other consumers (a logger, a test probe) can
/// implement it directly.
pub trait IntentSink: Send + Sync {
    fn send(&self, msg: Message) -> Result<(), Box<dyn std::error::Error>>;
}

impl IntentSink for Sender<Message> {
    fn send(&self, msg: Message) -> Result<(), Box<dyn std::error::Error>> {
        Sender::send(self, msg).map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
    }
}

/// Optional observer notified of every `IntentError` fanned out, in
/// addition to the ordinary `IntentSink`s.
pub trait ErrorListener: Send + Sync {
    fn on_error(&self, err: &IntentError);
}

enum State {
    Idle,
    Streaming(StreamHandle),
    Probing(StreamHandle),
}

/// Mediates between registered mic [`MicReceiver`]s and a single outbound
/// cloud stream at a time.
pub struct Coordinator {
    factory: Box<dyn StreamFactory>,
    mux: Multiplexer,
    intents: Vec<Box<dyn IntentSink>>,
    err_listener: Option<Box<dyn ErrorListener>>,
    config: CoordinatorConfig,

    cloud_intent_tx: Sender<(StreamId, IntentResult)>,
    cloud_intent_rx: ChanReceiver<(StreamId, IntentResult)>,
    cloud_err_tx: Sender<(StreamId, ErrorKind, String)>,
    cloud_err_rx: ChanReceiver<(StreamId, ErrorKind, String)>,
    cloud_open_tx: Sender<(StreamId, String)>,
    cloud_open_rx: ChanReceiver<(StreamId, String)>,

    connc_err_tx: Sender<(StreamId, ErrorKind, String)>,
    connc_err_rx: ChanReceiver<(StreamId, ErrorKind, String)>,
    connc_open_tx: Sender<(StreamId, String)>,
    connc_open_rx: ChanReceiver<(StreamId, String)>,
    connc_conn_tx: Sender<(StreamId, ConnectionResult)>,
    connc_conn_rx: ChanReceiver<(StreamId, ConnectionResult)>,

    state: State,
}

impl Coordinator {
    pub fn new(factory: Box<dyn StreamFactory>, config: CoordinatorConfig) -> Self {
        let (cloud_intent_tx, cloud_intent_rx) = unbounded();
        let (cloud_err_tx, cloud_err_rx) = unbounded();
        let (cloud_open_tx, cloud_open_rx) = unbounded();
        let (connc_err_tx, connc_err_rx) = unbounded();
        let (connc_open_tx, connc_open_rx) = unbounded();
        let (connc_conn_tx, connc_conn_rx) = unbounded();

        Self {
            factory,
            mux: Multiplexer::new(),
            intents: Vec::new(),
            err_listener: None,
            config,
            cloud_intent_tx,
            cloud_intent_rx,
            cloud_err_tx,
            cloud_err_rx,
            cloud_open_tx,
            cloud_open_rx,
            connc_err_tx,
            connc_err_rx,
            connc_open_tx,
            connc_open_rx,
            connc_conn_tx,
            connc_conn_rx,
            state: State::Idle,
        }
    }

    /// Registers a mic receiver and spawns its forwarder thread.
    pub fn add_receiver(&mut self, receiver: MicReceiver) {
        self.mux.add_receiver(receiver);
    }

    /// Registers a consumer of fanned-out `Message`s.
    pub fn add_intent_sink(&mut self, sink: impl IntentSink + 'static) {
        self.intents.push(Box::new(sink));
    }

    /// Registers the (at most one) error observer.
    pub fn set_error_listener(&mut self, listener: impl ErrorListener + 'static) {
        self.err_listener = Some(Box::new(listener));
    }

    /// Runs the event loop on the calling thread until `stop` fires or
    /// every input channel has hung up. Shuts the multiplexer down and
    /// joins its forwarder threads before returning.
    pub fn run(mut self, stop: ChanReceiver<()>) {
        let inbound = self.mux.inbound();
        let cloud_intent_rx = self.cloud_intent_rx.clone();
        let cloud_err_rx = self.cloud_err_rx.clone();
        let cloud_open_rx = self.cloud_open_rx.clone();
        let connc_err_rx = self.connc_err_rx.clone();
        let connc_open_rx = self.connc_open_rx.clone();
        let connc_conn_rx = self.connc_conn_rx.clone();

        loop {
            crossbeam_channel::select! {
                recv(inbound) -> msg => match msg {
                    Ok(tagged) => self.handle_inbound(tagged),
                    Err(_) => break,
                },
                recv(cloud_intent_rx) -> res => if let Ok((id, result)) = res {
                    self.handle_cloud_intent(id, result);
                },
                recv(cloud_err_rx) -> res => if let Ok((id, kind, message)) = res {
                    self.handle_cloud_error(id, kind, message);
                },
                recv(cloud_open_rx) -> res => if let Ok((id, session)) = res {
                    self.handle_cloud_open(id, session);
                },
                recv(connc_err_rx) -> res => if let Ok((id, kind, message)) = res {
                    self.handle_connc_error(id, kind, message);
                },
                recv(connc_open_rx) -> res => if let Ok((id, session)) = res {
                    self.handle_connc_open(id, session);
                },
                recv(connc_conn_rx) -> res => if let Ok((id, result)) = res {
                    self.handle_connc_result(id, result);
                },
                recv(stop) -> _ => break,
            }
        }

        log::debug!("coordinator loop exiting");
        self.mux.shutdown();
    }

    fn handle_inbound(&mut self, tagged: TaggedMessage) {
        match tagged.msg {
            Message::Hotword(hw) => self.handle_hotword(hw, tagged.is_test),
            Message::Audio { samples } => self.handle_audio(samples),
            Message::AudioDone => self.handle_audio_done(),
            Message::ConnectionCheck => self.handle_connection_check(),
            Message::DebugFile(df) => self.handle_debug_file(df),
            other => log::warn!("ignoring unexpected inbound message: {other:?}"),
        }
    }

    fn handle_hotword(&mut self, hw: Hotword, is_test: bool) {
        self.close_active("got hotword event while already streaming, weird...");

        if is_test {
            self.write_mic(Message::TestStarted);
        }

        let raw_locale = if hw.locale.is_empty() { "en-US" } else { hw.locale.as_str() };
        let language = match parse_locale(raw_locale) {
            Ok(language) => language,
            Err(kind) => {
                self.write_error(kind, format!("invalid locale string {raw_locale:?}"));
                return;
            }
        };

        let purpose = match hw.mode {
            StreamType::KnowledgeGraph => StreamPurpose::KnowledgeGraph { timezone: hw.timezone },
            _ => {
                // Every non-KnowledgeGraph StreamType maps to a RobotMode;
                // the "unknown mode" failure path the original dynamically
                // typed mode integer needed doesn't exist here.
                let robot_mode = mode_for_stream_type(hw.mode)
                    .expect("StreamType::Normal and Blackjack always have a RobotMode");
                let handler = self.config.handler.clone();
                if self.config.firmware_version.contains("1.8.")
                    || self.config.firmware_version.contains("2.0.")
                {
                    StreamPurpose::IntentGraph { robot_mode, handler }
                } else {
                    StreamPurpose::Intent { robot_mode, handler }
                }
            }
        };

        let mut opts = StreamOptions::new(language, purpose);
        opts.no_das = hw.no_logging;
        opts.require_token = self.config.require_token;
        opts.endpoint = self.config.endpoint.clone();

        let template = ReplySinkTemplate {
            intent: Some(self.cloud_intent_tx.clone()),
            error: self.cloud_err_tx.clone(),
            open: self.cloud_open_tx.clone(),
            connection: None,
        };
        let handle = StreamHandle::open(&self.factory, opts, template);
        log::debug!("opened stream {:?}", handle.id());
        self.state = State::Streaming(handle);
    }

    fn handle_audio(&mut self, samples: Pcm) {
        match &self.state {
            State::Idle => {
                if would_contain_hotword(&samples, &self.config.hotword) {
                    log::debug!("pre-filter flagged a hotword in idle audio, re-injecting");
                    let synthetic = Message::Hotword(Hotword {
                        mode: StreamType::Normal,
                        locale: "en-US".into(),
                        no_logging: false,
                        timezone: None,
                    });
                    // Unbounded: re-injecting from inside the loop that
                    // drains this same channel can never block on itself.
                    let _ = self
                        .mux
                        .inbound_sender()
                        .send(TaggedMessage { msg: synthetic, is_test: false });
                } else {
                    log::trace!("no active stream, discarding {} samples", samples.len());
                }
            }
            State::Streaming(handle) | State::Probing(handle) => handle.add_samples(&samples),
        }
    }

    fn handle_audio_done(&mut self) {
        if let State::Streaming(handle) | State::Probing(handle) = &self.state {
            log::trace!("mic signaled end of audio for stream {:?}", handle.id());
            handle.close_send();
        }
    }

    fn handle_connection_check(&mut self) {
        log::debug!("got connection check request");
        self.close_active("got connection check request while already streaming, closing current stream");

        let purpose = StreamPurpose::ConnectionCheck {
            total_audio_ms: config::DEFAULT_AUDIO_LEN_MS,
            audio_per_request_ms: config::DEFAULT_CHUNK_MS,
        };
        let mut opts = StreamOptions::new(Language::EnglishUs, purpose);
        opts.require_token = self.config.require_token;
        opts.endpoint = self.config.endpoint.clone();

        let template = ReplySinkTemplate {
            intent: None,
            error: self.connc_err_tx.clone(),
            open: self.connc_open_tx.clone(),
            connection: Some(self.connc_conn_tx.clone()),
        };
        let handle = StreamHandle::open(&self.factory, opts, template);
        self.state = State::Probing(handle);
    }

    fn handle_debug_file(&mut self, df: DebugFile) {
        self.write_response(Message::DebugFile(df));
    }

    fn handle_cloud_intent(&mut self, id: StreamId, result: IntentResult) {
        if !self.streaming_id_matches(id) {
            log::warn!("ignoring intent result from a superseded stream");
            return;
        }
        log::debug!("received intent from cloud for stream {id:?}");
        self.signal_mic_stop();
        self.write_response(Message::IntentResult(result));
        self.close_active_silently();
    }

    fn handle_cloud_error(&mut self, id: StreamId, kind: ErrorKind, message: String) {
        if !self.streaming_id_matches(id) {
            log::warn!("ignoring error from a superseded stream: {message}");
            return;
        }
        log::debug!("received error from cloud for stream {id:?}: {message}");
        self.signal_mic_stop();
        let err = IntentError { kind, message };
        if let Some(listener) = &self.err_listener {
            listener.on_error(&err);
        }
        self.write_response(Message::IntentError(err));
        self.close_active_silently();
    }

    fn handle_cloud_open(&mut self, id: StreamId, session: String) {
        if !self.streaming_id_matches(id) {
            log::warn!("ignoring stream-open notice from a superseded stream");
            return;
        }
        self.write_response(Message::StreamOpen { session });
    }

    fn handle_connc_error(&mut self, id: StreamId, kind: ErrorKind, message: String) {
        if !self.probing_id_matches(id) {
            log::warn!("ignoring error from a superseded connection check: {message}");
            return;
        }
        log::debug!("connection check for stream {id:?} errored: {message}");
        self.respond_to_connection_check(None, Some((kind, message)));
        self.close_active_silently();
    }

    fn handle_connc_open(&mut self, _id: StreamId, _session: String) {
        // Connection checks don't surface a session id to mic consumers.
    }

    fn handle_connc_result(&mut self, id: StreamId, result: ConnectionResult) {
        if !self.probing_id_matches(id) {
            log::warn!("ignoring result from a superseded connection check");
            return;
        }
        log::debug!("connection check for stream {id:?} completed");
        self.respond_to_connection_check(Some(result), None);
        self.close_active_silently();
    }

    fn respond_to_connection_check(
        &mut self,
        result: Option<ConnectionResult>,
        err: Option<(ErrorKind, String)>,
    ) {
        let result = match (result, err) {
            (Some(result), _) => result,
            (None, Some((kind, status))) => ConnectionResult {
                num_packets: 0,
                expected_packets: config::default_expected_packets(),
                code: ConnectionCode::from(kind),
                status,
            },
            (None, None) => ConnectionResult {
                num_packets: 0,
                expected_packets: config::default_expected_packets(),
                code: ConnectionCode::Auth,
                status: String::new(),
            },
        };
        self.write_mic(Message::ConnectionResult(result));
    }

    fn streaming_id_matches(&self, id: StreamId) -> bool {
        matches!(&self.state, State::Streaming(handle) if handle.id() == id)
    }

    fn probing_id_matches(&self, id: StreamId) -> bool {
        matches!(&self.state, State::Probing(handle) if handle.id() == id)
    }

    /// Closes whatever stream is active, if any, logging `message` only
    /// when there was one to close.
    fn close_active(&mut self, message: &str) {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => {}
            State::Streaming(mut handle) | State::Probing(mut handle) => {
                log::warn!("{message}");
                handle.close();
            }
        }
    }

    /// Closes the active stream as a normal, expected lifecycle step (a
    /// terminal result arrived for it) rather than an anomaly.
    fn close_active_silently(&mut self) {
        if let State::Streaming(mut handle) | State::Probing(mut handle) =
            std::mem::replace(&mut self.state, State::Idle)
        {
            handle.close();
        }
    }

    fn write_response(&self, msg: Message) {
        for sink in &self.intents {
            if let Err(e) = sink.send(msg.clone()) {
                log::warn!("intent sink failed: {e}");
            }
        }
    }

    fn write_mic(&self, msg: Message) {
        for writer in self.mux.mic_writers() {
            if let Err(e) = writer.send(msg.clone()) {
                log::warn!("mic write failed: {e}");
            }
        }
    }

    fn signal_mic_stop(&self) {
        self.write_mic(Message::StopSignal);
    }

    fn write_error(&self, kind: ErrorKind, message: String) {
        self.write_response(Message::IntentError(IntentError { kind, message }));
    }
}
