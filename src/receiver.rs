//! The receiver multiplexer: fans N independent microphone receivers into
//! one ordered inbound channel for the coordinator.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver as ChanReceiver, Sender};

use crate::message::Message;

/// A named microphone-side input source.
///
/// `inbound` is where the mic posts `Message`s for the coordinator; `back`
/// is where the coordinator writes control messages (`StopSignal`,
/// `ConnectionResult`, `TestStarted`) destined for this mic.
pub struct Receiver {
    pub name: String,
    pub inbound: ChanReceiver<Message>,
    pub back: Sender<Message>,
    pub is_test: bool,
}

impl Receiver {
    pub fn new(name: impl Into<String>, inbound: ChanReceiver<Message>, back: Sender<Message>) -> Self {
        Self {
            name: name.into(),
            inbound,
            back,
            is_test: false,
        }
    }

    /// Marks this receiver as a test harness: its hotwords cause the
    /// coordinator to notify the mic side so it can simulate the wake-word
    /// signal back to the AI layer.
    pub fn as_test(mut self) -> Self {
        self.is_test = true;
        self
    }
}

/// A message tagged with whether it came from a test receiver.
#[derive(Debug, Clone)]
pub struct TaggedMessage {
    pub msg: Message,
    pub is_test: bool,
}

/// Fans registered receivers into one inbound channel.
///
/// Every receiver gets its own forwarder thread, started the moment it's
/// registered. All forwarders share one kill signal; dropping the
/// multiplexer (or calling [`Multiplexer::shutdown`]) closes it and joins
/// every forwarder thread.
///
/// The inbound channel is unbounded so that the coordinator's own
/// re-injection of a synthesized hotword (see [`crate::coordinator`]) can
/// never block on itself.
pub struct Multiplexer {
    inbound_tx: Sender<TaggedMessage>,
    inbound_rx: ChanReceiver<TaggedMessage>,
    kill_tx: Sender<()>,
    kill_rx: ChanReceiver<()>,
    mic_writers: Vec<Sender<Message>>,
    handles: Vec<JoinHandle<()>>,
}

impl Multiplexer {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = unbounded();
        let (kill_tx, kill_rx) = unbounded();
        Self {
            inbound_tx,
            inbound_rx,
            kill_tx,
            kill_rx,
            mic_writers: Vec::new(),
            handles: Vec::new(),
        }
    }

    /// Registers a receiver and immediately spawns its forwarder thread.
    pub fn add_receiver(&mut self, receiver: Receiver) {
        let is_test = receiver.is_test;
        let name = receiver.name.clone();
        let inbound = receiver.inbound;
        let coordinator_tx = self.inbound_tx.clone();
        let kill_rx = self.kill_rx.clone();

        self.mic_writers.push(receiver.back);

        let handle = thread::Builder::new()
            .name(format!("mic-forwarder-{name}"))
            .spawn(move || loop {
                crossbeam_channel::select! {
                    recv(kill_rx) -> _ => return,
                    recv(inbound) -> msg => match msg {
                        Ok(msg) => {
                            if coordinator_tx.send(TaggedMessage { msg, is_test }).is_err() {
                                return;
                            }
                        }
                        Err(_) => return,
                    },
                }
            })
            .expect("failed to spawn mic forwarder thread");
        self.handles.push(handle);
    }

    /// The coordinator's inbound receiver. Clonable, but the coordinator
    /// should only ever hold one end draining it.
    pub fn inbound(&self) -> ChanReceiver<TaggedMessage> {
        self.inbound_rx.clone()
    }

    /// A sender onto the same inbound channel, for re-injecting synthesized
    /// messages (the hotword pre-filter's loopback).
    pub fn inbound_sender(&self) -> Sender<TaggedMessage> {
        self.inbound_tx.clone()
    }

    /// Current back-channel writers, one per registered receiver, in
    /// registration order.
    pub fn mic_writers(&self) -> &[Sender<Message>] {
        &self.mic_writers
    }

    /// Closes the kill channel and joins every forwarder thread.
    pub fn shutdown(self) {
        drop(self.kill_tx);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}
