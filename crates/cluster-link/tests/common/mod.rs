//! Scripted in-memory connector for link reader tests.

use cluster_link::{Connector, LinkError, LinkResult, LinkStream};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One read result in a scripted session.
#[derive(Debug)]
pub enum Step {
    Bytes(Vec<u8>),
    Fail(ErrorKind),
}

/// What the next `connect` call does.
#[derive(Debug)]
pub enum Session {
    Refuse,
    Open(Vec<Step>),
}

struct ScriptedStream {
    steps: VecDeque<Step>,
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.steps.pop_front() {
            Some(Step::Bytes(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                let rest = bytes.split_off(n);
                if let Some(dst) = buf.get_mut(..n) {
                    dst.copy_from_slice(&bytes);
                }
                if !rest.is_empty() {
                    self.steps.push_front(Step::Bytes(rest));
                }
                Ok(n)
            }
            Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
            // Script exhausted: behave like an idle line.
            None => {
                std::thread::sleep(std::time::Duration::from_millis(1));
                Err(io::Error::from(ErrorKind::TimedOut))
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct ScriptedConnector {
    sessions: Arc<Mutex<VecDeque<Session>>>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(sessions: impl IntoIterator<Item = Session>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(sessions.into_iter().collect())),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn connect(&mut self) -> LinkResult<LinkStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.sessions.lock().pop_front() {
            Some(Session::Open(steps)) => Ok(Box::new(ScriptedStream {
                steps: steps.into(),
            })),
            Some(Session::Refuse) | None => Err(LinkError::Open {
                device: self.describe(),
                source: io::Error::from(ErrorKind::NotFound),
            }),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
