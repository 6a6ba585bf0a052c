use super::handle::{Command, ConnectionHandle, DestroyFlag};
use super::state::{ConnectionState, LinkStatus};
use crate::config::ConnectionConfig;
use crate::events::{RawLog, RawLogSender};
use crate::transport::{Session, SessionEvent, SessionEventReceiver, Transport, TransportError};
use crate::utils::timers::{recv_opt, sleep_until_opt, tick_opt};
use alloy_primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout_at};
use tracing::{debug, error, info, warn};

/// A session that finished the subscribe handshake.
struct Established<S> {
    session: S,
    events: SessionEventReceiver,
    subscription_id: String,
    chain_id: u64,
}

/// Open a session, subscribe to the contract and probe liveness.
///
/// The whole exchange is bounded by `timeout` and abandoned once the
/// manager is destroyed. A session that was opened but did not finish the
/// exchange is closed before returning.
async fn handshake<T: Transport>(
    transport: &T,
    address: Address,
    timeout: Duration,
    flag: &DestroyFlag,
) -> Result<Established<T::Session>, TransportError> {
    let deadline = Instant::now() + timeout;

    let (session, events) = tokio::select! {
        opened = timeout_at(deadline, transport.open()) => {
            opened.map_err(|_| TransportError::Timeout)??
        }
        _ = flag.wait() => return Err(TransportError::ConnectionClosed),
    };

    let subscribed = tokio::select! {
        subscribed = timeout_at(deadline, async {
            let subscription_id = session.subscribe_logs(address).await?;
            let chain_id = session.probe().await?;
            Ok::<_, TransportError>((subscription_id, chain_id))
        }) => subscribed.map_err(|_| TransportError::Timeout).and_then(|r| r),
        _ = flag.wait() => Err(TransportError::ConnectionClosed),
    };

    match subscribed {
        Ok((subscription_id, chain_id)) => Ok(Established {
            session,
            events,
            subscription_id,
            chain_id,
        }),
        Err(e) => {
            session.close().await;
            Err(e)
        }
    }
}

/// Actor owning the node subscription.
///
/// Transient faults (timeouts, resets, unexpected closes, failed probes) are
/// retried with capped exponential backoff. Only exceeding the attempt
/// ceiling or `destroy()` stops the retries; the former can be undone with
/// `restart()`.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    config: ConnectionConfig,
    contract_address: Address,
    state: ConnectionState,
    session: Option<T::Session>,
    session_rx: Option<SessionEventReceiver>,
    /// Armed reconnect deadline.
    reconnect_at: Option<Instant>,
    keep_alive: Option<Interval>,
    connecting: bool,
    /// Logs discarded because the dispatcher fell behind.
    dropped_logs: u64,
    flag: Arc<DestroyFlag>,
    state_tx: watch::Sender<ConnectionState>,
    log_tx: RawLogSender,
    cmd_rx: mpsc::Receiver<Command>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager and its control handle.
    ///
    /// Nothing connects until [`run`](Self::run) is spawned.
    pub fn new(
        transport: T,
        contract_address: Address,
        config: ConnectionConfig,
        log_tx: RawLogSender,
    ) -> (Self, ConnectionHandle) {
        let state = ConnectionState::new(config.base_reconnect_delay);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let flag = Arc::new(DestroyFlag::default());

        let handle = ConnectionHandle::new(
            cmd_tx,
            state_rx,
            flag.clone(),
            config.stale_activity_threshold,
        );

        let manager = Self {
            transport,
            config,
            contract_address,
            state,
            session: None,
            session_rx: None,
            reconnect_at: None,
            keep_alive: None,
            connecting: false,
            dropped_logs: 0,
            flag,
            state_tx,
            log_tx,
            cmd_rx,
        };
        (manager, handle)
    }

    /// Run the manager until it is destroyed or every handle is dropped.
    ///
    /// Dropping the manager closes the raw log channel, which drains the
    /// rest of the pipeline.
    pub async fn run(mut self) {
        info!(contract = %self.contract_address, "ConnectionManager started");

        self.connect().await;

        loop {
            tokio::select! {
                biased;

                command = self.cmd_rx.recv() => match command {
                    Some(Command::Destroy(ack)) => {
                        self.destroy().await;
                        let _ = ack.send(());
                        break;
                    }
                    Some(Command::Restart(ack)) => {
                        self.restart().await;
                        let _ = ack.send(());
                    }
                    None => {
                        info!("All connection handles dropped");
                        self.destroy().await;
                        break;
                    }
                },

                event = recv_opt(&mut self.session_rx) => {
                    self.handle_session_event(event).await;
                }

                _ = sleep_until_opt(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.connect().await;
                }

                _ = tick_opt(&mut self.keep_alive) => {
                    self.keep_alive_tick().await;
                }
            }
        }

        info!("ConnectionManager shutdown complete");
    }

    fn is_destroyed(&self) -> bool {
        self.flag.is_set() || self.state.status == LinkStatus::Destroyed
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.clone());
    }

    /// Replace the current session with a freshly subscribed one.
    ///
    /// No-op while another attempt runs or after destroy.
    async fn connect(&mut self) {
        if self.is_destroyed() || self.connecting {
            return;
        }
        self.connecting = true;
        self.reconnect_at = None;
        self.teardown().await;

        self.state.status = LinkStatus::Connecting;
        self.publish();
        info!(
            attempt = self.state.reconnect_attempts,
            contract = %self.contract_address,
            "Connecting to node"
        );

        let flag = self.flag.clone();
        let outcome = handshake(
            &self.transport,
            self.contract_address,
            self.config.connect_timeout,
            &flag,
        )
        .await;
        self.connecting = false;

        if self.is_destroyed() {
            if let Ok(established) = outcome {
                debug!("Destroyed during handshake, closing fresh session");
                established.session.close().await;
            }
            return;
        }

        match outcome {
            Ok(established) => self.on_connected(established),
            Err(TransportError::Timeout) => {
                warn!(
                    timeout_secs = self.config.connect_timeout.as_secs(),
                    "Connection attempt timed out"
                );
                self.on_connect_failed();
            }
            Err(e) => {
                warn!(error = %e, "Connection attempt failed");
                self.on_connect_failed();
            }
        }
    }

    fn on_connected(&mut self, established: Established<T::Session>) {
        let Established {
            session,
            events,
            subscription_id,
            chain_id,
        } = established;

        self.session = Some(session);
        self.session_rx = Some(events);

        let now = Instant::now();
        self.state.status = LinkStatus::Connected;
        self.state.reconnect_attempts = 0;
        self.state.current_backoff = self.config.base_reconnect_delay;
        self.state.last_activity_at = now;
        self.state.transport_open = true;

        let period = self.config.keep_alive_interval;
        let mut keep_alive = interval_at(now + period, period);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.keep_alive = Some(keep_alive);

        info!(
            %subscription_id,
            chain_id,
            contract = %self.contract_address,
            "Subscribed to contract logs"
        );
        self.publish();
    }

    fn on_connect_failed(&mut self) {
        self.state.status = LinkStatus::Disconnected;
        self.state.transport_open = false;
        self.publish();
        self.schedule_reconnect();
    }

    /// Arm the next reconnect with backoff.
    ///
    /// No-op while a reconnect is in flight (attempt running or deadline
    /// armed) and after destroy. Past the attempt ceiling the manager idles
    /// until `restart()`.
    fn schedule_reconnect(&mut self) {
        if self.is_destroyed() {
            return;
        }
        if self.connecting || self.reconnect_at.is_some() {
            debug!("Reconnect already in flight");
            return;
        }

        self.keep_alive = None;

        let max = self.config.max_reconnect_attempts;
        if self.state.reconnect_attempts > max {
            return;
        }

        self.state.reconnect_attempts += 1;
        let attempt = self.state.reconnect_attempts;

        if attempt > max {
            error!(
                attempts = attempt - 1,
                "Reconnect attempts exhausted, waiting for an external restart"
            );
            self.state.status = LinkStatus::Disconnected;
            self.publish();
            return;
        }

        let delay = self.config.reconnect_delay(attempt);
        self.state.current_backoff = delay;
        self.reconnect_at = Some(Instant::now() + delay);
        info!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        self.publish();
    }

    /// Hand a log to the dispatcher without waiting for room.
    ///
    /// The actor must keep serving commands and keep-alive ticks while the
    /// pipeline is busy, so a full channel drops the log.
    fn forward(&mut self, log: RawLog) {
        match self.log_tx.try_send(log) {
            Ok(()) => {}
            Err(TrySendError::Full(log)) => {
                self.dropped_logs += 1;
                error!(
                    tx_hash = %log.transaction_hash,
                    block = log.block_number,
                    dropped = self.dropped_logs,
                    "Raw log channel full, log dropped"
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Raw log receiver dropped, log discarded");
            }
        }
    }

    fn touch(&mut self) {
        self.state.last_activity_at = Instant::now();
        self.publish();
    }

    /// The link went down; keep the counters, drop the connected status.
    fn mark_link_down(&mut self) {
        self.state.transport_open = false;
        if self.state.status == LinkStatus::Connected {
            self.state.status = LinkStatus::Disconnected;
        }
        self.publish();
    }

    async fn handle_session_event(&mut self, event: Option<SessionEvent>) {
        if self.is_destroyed() {
            return;
        }
        match event {
            Some(SessionEvent::Log(log)) => {
                self.touch();
                debug!(
                    tx_hash = %log.transaction_hash,
                    block = log.block_number,
                    "Received contract log"
                );
                self.forward(log);
            }
            Some(SessionEvent::Activity) => self.touch(),
            Some(SessionEvent::Closed { code, reason }) => {
                warn!(code, %reason, "Node connection closed");
                self.mark_link_down();
                self.schedule_reconnect();
            }
            Some(SessionEvent::Error(message)) => {
                warn!(error = %message, "Node connection error");
                self.mark_link_down();
                self.schedule_reconnect();
            }
            None => {
                debug!("Session event stream ended");
                self.session_rx = None;
                self.mark_link_down();
                self.schedule_reconnect();
            }
        }
    }

    /// Ping the node and detect half-open connections.
    async fn keep_alive_tick(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let silence = Instant::now().saturating_duration_since(self.state.last_activity_at);
        if silence > self.config.stall_threshold {
            warn!(
                silent_secs = silence.as_secs(),
                "Connection stalled, forcing reconnect"
            );
            self.mark_link_down();
            self.schedule_reconnect();
            return;
        }

        if !session.is_open() {
            warn!("Transport no longer open, forcing reconnect");
            self.mark_link_down();
            self.schedule_reconnect();
            return;
        }

        match session.ping().await {
            Ok(()) => debug!(silent_secs = silence.as_secs(), "Keep-alive ping sent"),
            Err(e) => {
                warn!(error = %e, "Keep-alive ping failed");
                self.mark_link_down();
                self.schedule_reconnect();
            }
        }
    }

    /// Reset the backoff and reconnect after the fixed restart delay.
    async fn restart(&mut self) {
        if self.is_destroyed() {
            return;
        }
        info!(
            attempts = self.state.reconnect_attempts,
            delay_ms = self.config.restart_delay.as_millis() as u64,
            "Restarting connection"
        );

        self.reconnect_at = None;
        self.teardown().await;

        self.state.status = LinkStatus::Disconnected;
        self.state.reconnect_attempts = 0;
        self.state.current_backoff = self.config.base_reconnect_delay;
        self.reconnect_at = Some(Instant::now() + self.config.restart_delay);
        self.publish();
    }

    /// Enter the terminal state. Idempotent.
    async fn destroy(&mut self) {
        if self.state.status == LinkStatus::Destroyed {
            return;
        }
        self.flag.set();
        self.reconnect_at = None;
        self.teardown().await;

        self.state.status = LinkStatus::Destroyed;
        self.publish();
        info!(contract = %self.contract_address, "Connection destroyed");
    }

    /// Close the current session, if any, and forget its events.
    async fn teardown(&mut self) {
        self.keep_alive = None;
        self.session_rx = None;
        if let Some(session) = self.session.take() {
            session.close().await;
            debug!("Previous session closed");
        }
        self.state.transport_open = false;
    }
}
