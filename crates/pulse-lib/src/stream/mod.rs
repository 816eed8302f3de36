//! Background reader thread feeding decoded samples to a single consumer.

pub mod source;

use crate::config::{StreamConfig, Transport};
use crate::error::{PulseError, Result};
use crate::io::wire::Decoded;
use crate::signal::{Sample, SignalKind};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use source::{open_source, ReadOutcome, SampleSource};
use std::thread::JoinHandle;

pub use source::{TcpSource, UdpSource};

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Connected { peer: String },
    Samples(Vec<Sample>),
    Rejected { raw: String },
    /// Terminal event. `reason` is `None` when the stream was stopped locally.
    Closed { reason: Option<String> },
}

/// Owns the reader thread of one stream. Stops and joins it on drop.
pub struct StreamHandle {
    kind: SignalKind,
    stop_tx: Sender<()>,
    events: Receiver<StreamEvent>,
    handle: Option<JoinHandle<()>>,
}

impl StreamHandle {
    /// Validate `cfg` and start reading on a new thread.
    pub fn spawn(cfg: StreamConfig) -> Result<Self> {
        if cfg.transport == Transport::Tcp && cfg.host.trim().is_empty() {
            return Err(PulseError::EmptyAddress);
        }
        let kind = cfg.kind;
        Self::spawn_with(kind, move || open_source(&cfg))
    }

    /// Start a reader over whatever source `open` produces. The opener runs on the reader thread.
    pub fn spawn_with<F>(kind: SignalKind, open: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn SampleSource>> + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded(1);
        let (event_tx, events) = unbounded();
        let handle = std::thread::Builder::new()
            .name(format!("{kind}-reader"))
            .spawn(move || run_reader(kind, open, event_tx, stop_rx))?;
        Ok(Self {
            kind,
            stop_tx,
            events,
            handle: Some(handle),
        })
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn events(&self) -> &Receiver<StreamEvent> {
        &self.events
    }

    /// True once the reader thread has exited on its own or after `stop`.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.stop_tx.try_send(());
            if handle.join().is_err() {
                log::error!("{} reader thread panicked", self.kind);
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

fn run_reader<F>(kind: SignalKind, open: F, tx: Sender<StreamEvent>, stop_rx: Receiver<()>)
where
    F: FnOnce() -> Result<Box<dyn SampleSource>>,
{
    let mut source = match open() {
        Ok(source) => source,
        Err(err) => {
            log::error!("{kind} stream failed to open: {err}");
            let _ = tx.send(StreamEvent::Closed {
                reason: Some(err.to_string()),
            });
            return;
        }
    };
    let peer = source.peer();
    log::info!("{kind} stream connected to {peer}");
    if tx.send(StreamEvent::Connected { peer }).is_err() {
        return;
    }

    let mut decoded = Vec::new();
    let reason = loop {
        if stop_requested(&stop_rx) {
            break None;
        }
        decoded.clear();
        let outcome = match source.read(&mut decoded) {
            Ok(outcome) => outcome,
            Err(err) => break Some(err.to_string()),
        };
        if !forward(kind, &mut decoded, &tx) {
            break None;
        }
        if outcome == ReadOutcome::Closed {
            break Some(PulseError::Closed.to_string());
        }
    };
    match &reason {
        Some(reason) => log::warn!("{kind} stream ended: {reason}"),
        None => log::info!("{kind} stream stopped"),
    }
    let _ = tx.send(StreamEvent::Closed { reason });
}

/// Returns false once the consumer has gone away.
fn forward(kind: SignalKind, decoded: &mut Vec<Decoded>, tx: &Sender<StreamEvent>) -> bool {
    let mut samples = Vec::with_capacity(decoded.len());
    for item in decoded.drain(..) {
        match item {
            Decoded::Value(value) => {
                log::trace!("{kind} value {value}");
                samples.push(Sample::now(value));
            }
            Decoded::Rejected(raw) => {
                log::warn!("invalid {kind} data received: {raw:?}");
                if !samples.is_empty()
                    && tx
                        .send(StreamEvent::Samples(std::mem::take(&mut samples)))
                        .is_err()
                {
                    return false;
                }
                if tx.send(StreamEvent::Rejected { raw }).is_err() {
                    return false;
                }
            }
        }
    }
    samples.is_empty() || tx.send(StreamEvent::Samples(samples)).is_ok()
}
