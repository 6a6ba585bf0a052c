use super::state::{ConnectionState, LinkStatus};
use intentwatch_sdk::objects::ConnectionHealth;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc, oneshot, watch};
use tokio::time::Instant;

/// Commands accepted by the manager actor.
#[derive(Debug)]
pub(super) enum Command {
    Restart(oneshot::Sender<()>),
    Destroy(oneshot::Sender<()>),
}

/// Terminal flag shared between the handles and the actor.
///
/// Set before the destroy command is queued so an in-flight handshake can
/// observe it.
#[derive(Debug, Default)]
pub(super) struct DestroyFlag {
    destroyed: AtomicBool,
    requested: Notify,
}

impl DestroyFlag {
    pub(super) fn is_set(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(super) fn set(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.requested.notify_one();
    }

    /// Resolves once `set` has been called.
    pub(super) async fn wait(&self) {
        let notified = self.requested.notified();
        if self.is_set() {
            return;
        }
        notified.await;
    }
}

/// Cloneable control surface of a running [`ConnectionManager`](super::ConnectionManager).
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    flag: Arc<DestroyFlag>,
    stale_after: Duration,
}

impl ConnectionHandle {
    pub(super) fn new(
        cmd_tx: mpsc::Sender<Command>,
        state_rx: watch::Receiver<ConnectionState>,
        flag: Arc<DestroyFlag>,
        stale_after: Duration,
    ) -> Self {
        Self {
            cmd_tx,
            state_rx,
            flag,
            stale_after,
        }
    }

    /// Latest published state.
    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Open transport and recent activity.
    pub fn is_connected(&self) -> bool {
        !self.flag.is_set()
            && self
                .state_rx
                .borrow()
                .is_connected_at(Instant::now(), self.stale_after)
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.state_rx.borrow().reconnect_attempts
    }

    pub fn health(&self) -> ConnectionHealth {
        self.state_rx
            .borrow()
            .health_at(Instant::now(), self.stale_after)
    }

    /// Watch every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Reset the attempt counter and reconnect after the restart delay.
    ///
    /// Works after the reconnect ceiling was hit. No-op once destroyed.
    pub async fn restart(&self) {
        if self.flag.is_set() {
            return;
        }
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Restart(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Stop the manager for good. Idempotent.
    ///
    /// Returns once the manager has torn down its session, or immediately
    /// when it already exited.
    pub async fn destroy(&self) {
        self.flag.set();
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Destroy(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.flag.is_set() || self.state_rx.borrow().status == LinkStatus::Destroyed
    }
}
