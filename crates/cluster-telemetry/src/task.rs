//! Owned background thread with cooperative stop.

use crossbeam::channel::{Receiver, Sender, bounded};
use std::io;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Handle to a named worker thread.
///
/// The worker receives a stop channel; dropping the sender disconnects it,
/// which the worker observes on its next `select!`. Dropping the handle stops
/// and joins the thread.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub(crate) fn spawn<F>(name: &str, body: F) -> io::Result<Self>
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop_rx))?;
        debug!(task = name, "Task started");
        Ok(Self {
            name: name.to_string(),
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Request stop and wait for the thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(task = %self.name, "Task panicked");
            } else {
                debug!(task = %self.name, "Task stopped");
            }
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
