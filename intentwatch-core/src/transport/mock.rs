//! Scripted in-memory transport for connection manager tests.

use super::{
    Session, SessionEvent, SessionEventReceiver, SessionEventSender, Transport, TransportError,
    session_event_channel,
};
use alloy_primitives::Address;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// Outcome of one `open()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fail,
    /// `open()` never returns.
    Hang,
    /// The socket opens but the liveness call never answers.
    Unresponsive,
    Succeed,
}

#[derive(Default)]
struct Script {
    steps: VecDeque<Step>,
    opens: Vec<Instant>,
    sessions: Vec<MockSessionHandle>,
}

/// Transport whose `open()` results follow a script, then succeed.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
}

impl MockTransport {
    pub fn scripted(steps: impl IntoIterator<Item = Step>) -> Self {
        let transport = Self::default();
        transport.script.lock().unwrap().steps.extend(steps);
        transport
    }

    /// Instants at which `open()` was called.
    pub fn opens(&self) -> Vec<Instant> {
        self.script.lock().unwrap().opens.clone()
    }

    pub fn open_count(&self) -> usize {
        self.script.lock().unwrap().opens.len()
    }

    /// Handle of the most recently established session.
    pub fn last_session(&self) -> Option<MockSessionHandle> {
        self.script.lock().unwrap().sessions.last().cloned()
    }
}

/// Test-side view of a mock session.
#[derive(Clone)]
pub struct MockSessionHandle {
    pub events: SessionEventSender,
    pub open: Arc<AtomicBool>,
    pub pings: Arc<AtomicUsize>,
}

impl MockSessionHandle {
    pub async fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event).await;
    }

    /// Make the socket report closed, as a dead peer would.
    pub fn drop_silently(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

pub struct MockSession {
    handle: MockSessionHandle,
    unresponsive: bool,
}

#[async_trait]
impl Transport for MockTransport {
    type Session = MockSession;

    async fn open(&self) -> Result<(MockSession, SessionEventReceiver), TransportError> {
        let step = {
            let mut script = self.script.lock().unwrap();
            script.opens.push(Instant::now());
            script.steps.pop_front().unwrap_or(Step::Succeed)
        };

        match step {
            Step::Fail => Err(TransportError::ConnectionClosed),
            Step::Hang => std::future::pending().await,
            Step::Unresponsive | Step::Succeed => {
                let (events, events_rx) = session_event_channel();
                let handle = MockSessionHandle {
                    events,
                    open: Arc::new(AtomicBool::new(true)),
                    pings: Arc::new(AtomicUsize::new(0)),
                };
                self.script.lock().unwrap().sessions.push(handle.clone());
                let session = MockSession {
                    handle,
                    unresponsive: step == Step::Unresponsive,
                };
                Ok((session, events_rx))
            }
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn subscribe_logs(&self, _address: Address) -> Result<String, TransportError> {
        Ok("0x1".to_string())
    }

    async fn probe(&self) -> Result<u64, TransportError> {
        if self.unresponsive {
            std::future::pending::<()>().await;
        }
        Ok(8453)
    }

    async fn ping(&self) -> Result<(), TransportError> {
        self.handle.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.handle.open.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.handle.open.store(false, Ordering::SeqCst);
    }
}
