//! Read/reconnect loop.

use crate::connector::{Connector, LinkStream};
use crate::counters::LinkCounters;
use crate::{LinkConfig, LinkError, LinkResult};
use cluster_frame::{Frame, Resynchronizer};
use cluster_telemetry::TelemetryStore;
use std::io::{self, ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Longest uninterrupted sleep; bounds how late a stop request is noticed.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Receives every frame that passed validation, on the reader thread.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, frame: &Frame);
}

impl FrameSink for TelemetryStore {
    fn on_frame(&self, frame: &Frame) {
        self.apply_frame(frame);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LinkState::Connecting,
            2 => LinkState::Connected,
            _ => LinkState::Disconnected,
        }
    }
}

#[derive(Debug)]
struct SharedState(AtomicU8);

impl SharedState {
    fn new() -> Self {
        Self(AtomicU8::new(LinkState::Disconnected as u8))
    }

    fn get(&self) -> LinkState {
        LinkState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: LinkState) -> LinkState {
        LinkState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }
}

/// Owns a connector and the frame accumulation buffer.
pub struct LinkReader {
    connector: Box<dyn Connector>,
    config: LinkConfig,
    sink: Arc<dyn FrameSink>,
    counters: Arc<LinkCounters>,
    state: Arc<SharedState>,
    resync: Resynchronizer,
}

impl std::fmt::Debug for LinkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkReader")
            .field("endpoint", &self.connector.describe())
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl LinkReader {
    pub fn new(
        connector: impl Connector + 'static,
        config: LinkConfig,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        Self {
            connector: Box::new(connector),
            config,
            sink,
            counters: Arc::new(LinkCounters::new()),
            state: Arc::new(SharedState::new()),
            resync: Resynchronizer::new(),
        }
    }

    pub fn counters(&self) -> Arc<LinkCounters> {
        self.counters.clone()
    }

    pub fn state(&self) -> LinkState {
        self.state.get()
    }

    /// Start the loop on a dedicated thread.
    pub fn spawn(self) -> LinkResult<LinkHandle> {
        self.config.validate()?;
        let stop = Arc::new(AtomicBool::new(false));
        let counters = self.counters.clone();
        let state = self.state.clone();
        let endpoint = self.connector.describe();

        let thread = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("link-reader".to_string())
                .spawn(move || self.run(&stop))
                .map_err(LinkError::Spawn)?
        };
        info!(endpoint = %endpoint, "Link reader started");

        Ok(LinkHandle {
            stop,
            state,
            counters,
            thread: Some(thread),
        })
    }

    /// Run until `stop` is set. Blocks the calling thread.
    pub fn run(mut self, stop: &AtomicBool) {
        let endpoint = self.connector.describe();
        let mut chunk = vec![0u8; self.config.read_chunk.max(1)];
        let mut stream: Option<LinkStream> = None;

        while !stop.load(Ordering::Acquire) {
            let Some(port) = stream.as_mut() else {
                stream = self.connect(&endpoint, stop);
                continue;
            };

            match port.read(&mut chunk) {
                Ok(0) => thread::sleep(self.config.idle_backoff()),
                Ok(n) => self.ingest(chunk.get(..n).unwrap_or_default()),
                Err(e) if is_idle(&e) => thread::sleep(self.config.idle_backoff()),
                Err(source) => {
                    let error = LinkError::Read {
                        device: endpoint.clone(),
                        source,
                    };
                    warn!(error = %error, "Link read failed, reconnecting");
                    self.counters.inc_read_error();
                    stream = None;
                    self.transition(LinkState::Disconnected, &endpoint);
                    sleep_unless_stopped(self.config.reconnect_delay(), stop);
                }
            }
        }

        drop(stream);
        self.transition(LinkState::Disconnected, &endpoint);
        debug!(endpoint = %endpoint, "Link reader loop exited");
    }

    fn connect(&mut self, endpoint: &str, stop: &AtomicBool) -> Option<LinkStream> {
        self.transition(LinkState::Connecting, endpoint);
        self.counters.inc_connect_attempt();
        match self.connector.connect() {
            Ok(stream) => {
                // Bytes from a previous session cannot complete a new frame.
                self.resync.clear();
                self.transition(LinkState::Connected, endpoint);
                Some(stream)
            }
            Err(e) => {
                warn!(error = %e, "Link open failed");
                self.counters.inc_open_failure();
                self.transition(LinkState::Disconnected, endpoint);
                sleep_unless_stopped(self.config.reconnect_delay(), stop);
                None
            }
        }
    }

    fn ingest(&mut self, bytes: &[u8]) {
        self.counters.add_bytes(bytes.len());
        let sink = &self.sink;
        let decoded = self.resync.feed(bytes, |frame| sink.on_frame(&frame));
        self.counters.publish_resync(self.resync.stats());
        trace!(bytes = bytes.len(), decoded, "Chunk ingested");
    }

    fn transition(&self, next: LinkState, endpoint: &str) {
        let previous = self.state.set(next);
        if previous == next {
            return;
        }
        match next {
            LinkState::Connected => info!(endpoint = %endpoint, "Link connected"),
            LinkState::Disconnected if previous == LinkState::Connected => {
                info!(endpoint = %endpoint, "Link disconnected");
            }
            _ => debug!(endpoint = %endpoint, ?previous, ?next, "Link state changed"),
        }
    }
}

fn is_idle(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::Acquire) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        thread::sleep(remaining.min(STOP_POLL));
    }
}

/// Handle to a running [`LinkReader`]. Dropping it stops the reader.
#[derive(Debug)]
pub struct LinkHandle {
    stop: Arc<AtomicBool>,
    state: Arc<SharedState>,
    counters: Arc<LinkCounters>,
    thread: Option<JoinHandle<()>>,
}

impl LinkHandle {
    pub fn state(&self) -> LinkState {
        self.state.get()
    }

    pub fn counters(&self) -> &LinkCounters {
        &self.counters
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Ask the reader to stop and wait for it. The request is noticed within
    /// one read timeout or backoff slice.
    pub fn stop(mut self) -> LinkResult<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> LinkResult<()> {
        self.stop.store(true, Ordering::Release);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| LinkError::Stopped),
            None => Ok(()),
        }
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Link reader did not shut down cleanly");
        }
    }
}
