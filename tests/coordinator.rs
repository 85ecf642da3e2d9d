//! End-to-end scenarios for the session coordinator, driven entirely
//! through its public API with a hand-written fake cloud stream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::unbounded;

use voice_session_coordinator::{
    locale, CloudStream, ConnectionCode, Coordinator, CoordinatorConfig, ErrorKind, Hotword,
    IntentResult, IntentSink, Message, Receiver as MicReceiver, StreamFactory, StreamId,
    StreamOptions, StreamPurpose, StreamType,
};

struct FakeStream;
impl CloudStream for FakeStream {
    fn add_samples(&self, _pcm: &[i16]) -> Result<(), ErrorKind> {
        Ok(())
    }
    fn close_send(&self) -> Result<(), ErrorKind> {
        Ok(())
    }
    fn close(&self) {}
}

/// Records every `open()` call (its id, options, and reply sink) so a test
/// can drive results back through the sink and assert on what the
/// coordinator asked for.
#[derive(Clone, Default)]
struct FakeFactory {
    opened: Arc<Mutex<Vec<(StreamId, StreamOptions, voice_session_coordinator::stream::ReplySink)>>>,
}

impl StreamFactory for FakeFactory {
    fn open(
        &self,
        id: StreamId,
        opts: StreamOptions,
        replies: voice_session_coordinator::stream::ReplySink,
    ) -> Box<dyn CloudStream> {
        self.opened.lock().unwrap().push((id, opts, replies));
        Box::new(FakeStream)
    }
}

impl FakeFactory {
    fn wait_for_open(&self) -> (StreamId, StreamOptions, voice_session_coordinator::stream::ReplySink) {
        for _ in 0..200 {
            if let Some(last) = self.opened.lock().unwrap().last().cloned() {
                return last;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("no stream was opened within the timeout");
    }
}

struct VecSink(Arc<Mutex<Vec<Message>>>);
impl IntentSink for VecSink {
    fn send(&self, msg: Message) -> Result<(), Box<dyn std::error::Error>> {
        self.0.lock().unwrap().push(msg);
        Ok(())
    }
}

fn hotword(mode: StreamType, locale: &str) -> Message {
    Message::Hotword(Hotword {
        mode,
        locale: locale.to_string(),
        no_logging: false,
        timezone: None,
    })
}

struct Harness {
    mic_tx: crossbeam_channel::Sender<Message>,
    back_rx: crossbeam_channel::Receiver<Message>,
    stop_tx: crossbeam_channel::Sender<()>,
    results: Arc<Mutex<Vec<Message>>>,
    factory: FakeFactory,
    join: std::thread::JoinHandle<()>,
}

impl Harness {
    fn start(config: CoordinatorConfig) -> Self {
        let factory = FakeFactory::default();
        let mut coordinator = Coordinator::new(Box::new(factory.clone()), config);

        let results = Arc::new(Mutex::new(Vec::new()));
        coordinator.add_intent_sink(VecSink(results.clone()));

        let (mic_tx, mic_rx) = unbounded();
        let (back_tx, back_rx) = unbounded();
        coordinator.add_receiver(MicReceiver::new("mic", mic_rx, back_tx));

        let (stop_tx, stop_rx) = unbounded();
        let join = std::thread::spawn(move || coordinator.run(stop_rx));

        Self { mic_tx, back_rx, stop_tx, results, factory, join }
    }

    fn stop(self) {
        drop(self.stop_tx);
        self.join.join().unwrap();
    }
}

#[test]
fn idle_audio_that_plausibly_contains_a_hotword_opens_a_stream() {
    let harness = Harness::start(CoordinatorConfig::default());

    // A period-10 square wave (5 samples at +amp, 5 at -amp) puts the
    // zero-crossing rate right at the middle of its configured band; a
    // constant magnitude centers both the energy and the centroid (a
    // uniform-magnitude signal's centroid is just the midpoint index).
    let amp = 15_500i16;
    let mut samples = Vec::with_capacity(5000);
    for i in 0..5000 {
        samples.push(if i % 10 < 5 { amp } else { -amp });
    }
    harness.mic_tx.send(Message::Audio { samples }).unwrap();

    let (_, _, _) = harness.factory.wait_for_open();
    harness.stop();
}

#[test]
fn short_idle_audio_never_opens_a_stream() {
    let harness = Harness::start(CoordinatorConfig::default());
    harness
        .mic_tx
        .send(Message::Audio { samples: vec![12_000i16; 200] })
        .unwrap();

    std::thread::sleep(Duration::from_millis(50));
    assert!(harness.factory.opened.lock().unwrap().is_empty());
    harness.stop();
}

#[test]
fn debug_file_passes_through_regardless_of_active_stream() {
    let harness = Harness::start(CoordinatorConfig::default());
    harness
        .mic_tx
        .send(Message::DebugFile(voice_session_coordinator::DebugFile {
            payload: vec![1, 2, 3],
        }))
        .unwrap();

    std::thread::sleep(Duration::from_millis(50));
    let got = harness.results.lock().unwrap();
    assert!(got
        .iter()
        .any(|m| matches!(m, Message::DebugFile(d) if d.payload == vec![1, 2, 3])));
    drop(got);
    harness.stop();
}

#[test]
fn firmware_version_selects_intent_graph_purpose() {
    let mut config = CoordinatorConfig::default();
    config.firmware_version = "robot-2.0.1".into();
    let harness = Harness::start(config);

    harness.mic_tx.send(hotword(StreamType::Normal, "en-US")).unwrap();
    let (_, opts, _) = harness.factory.wait_for_open();
    assert!(matches!(opts.purpose, StreamPurpose::IntentGraph { .. }));
    harness.stop();
}

#[test]
fn ordinary_firmware_selects_plain_intent_purpose() {
    let mut config = CoordinatorConfig::default();
    config.firmware_version = "robot-1.5.0".into();
    let harness = Harness::start(config);

    harness.mic_tx.send(hotword(StreamType::Normal, "en-US")).unwrap();
    let (_, opts, _) = harness.factory.wait_for_open();
    assert!(matches!(opts.purpose, StreamPurpose::Intent { .. }));
    harness.stop();
}

#[test]
fn connection_check_error_is_reported_as_a_classified_connection_result() {
    let harness = Harness::start(CoordinatorConfig::default());
    harness.mic_tx.send(Message::ConnectionCheck).unwrap();

    let (id, _, replies) = harness.factory.wait_for_open();
    replies
        .error
        .send((id, ErrorKind::Connectivity, "no route to host".into()))
        .unwrap();

    let response = harness
        .back_rx
        .recv_timeout(Duration::from_secs(1))
        .expect("expected a ConnectionResult on the mic back-channel");
    match response {
        Message::ConnectionResult(result) => {
            assert_eq!(result.code, ConnectionCode::Connectivity);
            assert_eq!(result.num_packets, 0);
        }
        other => panic!("expected ConnectionResult, got {other:?}"),
    }
    harness.stop();
}

#[test]
fn successful_intent_stops_the_mic_and_returns_to_idle() {
    let harness = Harness::start(CoordinatorConfig::default());
    harness.mic_tx.send(hotword(StreamType::Blackjack, "fr-FR")).unwrap();

    let (id, opts, replies) = harness.factory.wait_for_open();
    assert_eq!(opts.language, locale::parse_locale("fr-FR").unwrap());
    replies
        .intent
        .unwrap()
        .send((id, IntentResult { payload: "hit".into() }))
        .unwrap();

    let stop_signal = harness
        .back_rx
        .recv_timeout(Duration::from_secs(1))
        .expect("expected a StopSignal on the mic back-channel");
    assert!(matches!(stop_signal, Message::StopSignal));

    std::thread::sleep(Duration::from_millis(30));
    // The stream is closed and the coordinator is idle again: a follow-up
    // hotword opens a second, independent stream.
    harness.mic_tx.send(hotword(StreamType::Normal, "en-US")).unwrap();
    let (second_id, _, _) = harness.factory.wait_for_open();
    assert_ne!(second_id, id);

    harness.stop();
}

#[test]
fn locale_parsing_end_to_end() {
    assert_eq!(locale::parse_locale("en-GB").unwrap(), locale::parse_locale("en_GB").unwrap());
    assert!(locale::parse_locale("xx-yy").is_ok());
    assert!(locale::parse_locale("nope").is_err());
}
