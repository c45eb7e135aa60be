//! BLE connection management.
//!
//! Owns the single link to one light. All command sequences go through one
//! async lock, the link is opened lazily on the first command and closed
//! again after an idle period.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::transport::{BleTransport, DisconnectCallback};
use crate::error::{Error, Result};
use crate::protocol::Packet;

/// Quiet period after the last command before the link is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection state for a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No link.
    #[default]
    Disconnected,
    /// Resolving the address and connecting.
    Connecting,
    /// Link established.
    Connected,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Event for connection state changes.
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    /// Address of the light.
    pub address: String,
    /// The new connection state.
    pub state: ConnectionState,
}

struct ActiveLink<L> {
    id: u64,
    link: Arc<L>,
}

struct Inner<T: BleTransport> {
    transport: Arc<T>,
    address: String,
    write_characteristic: Uuid,
    idle_timeout: Duration,
    /// Held for the whole of every command sequence, idle disconnect and shutdown.
    command_lock: tokio::sync::Mutex<()>,
    state: RwLock<ConnectionState>,
    link: RwLock<Option<ActiveLink<T::Link>>>,
    next_link_id: AtomicU64,
    idle_timer: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every arm and cancel; a timer only fires for its own generation.
    timer_generation: AtomicU64,
    event_tx: broadcast::Sender<ConnectionEvent>,
}

/// Manages the connection to one light.
pub struct ConnectionManager<T: BleTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: BleTransport> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: BleTransport> ConnectionManager<T> {
    /// Create a connection manager. No link is opened until the first command.
    pub fn new(
        transport: Arc<T>,
        address: impl Into<String>,
        write_characteristic: Uuid,
        idle_timeout: Duration,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                transport,
                address: address.into(),
                write_characteristic,
                idle_timeout,
                command_lock: tokio::sync::Mutex::new(()),
                state: RwLock::new(ConnectionState::Disconnected),
                link: RwLock::new(None),
                next_link_id: AtomicU64::new(0),
                idle_timer: Mutex::new(None),
                timer_generation: AtomicU64::new(0),
                event_tx,
            }),
        }
    }

    /// Address of the light.
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Idle period before the link is closed.
    pub fn idle_timeout(&self) -> Duration {
        self.inner.idle_timeout
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Subscribe to connection events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Send a packet sequence to the light.
    ///
    /// Waits for any other command on this light to finish, connects if
    /// needed and writes every packet in order. An empty sequence returns
    /// immediately without touching the link.
    ///
    /// # Errors
    ///
    /// - [`Error::DeviceNotFound`] if the transport does not know the address.
    ///   An adapter error raised while resolving is returned as is, so a
    ///   missing device can be told apart from a broken radio.
    /// - [`Error::ConnectionFailed`] if connecting fails.
    /// - [`Error::TransportWriteFailed`] if any write fails. Remaining
    ///   packets are not sent and the link is closed.
    pub async fn execute(&self, packets: &[Packet]) -> Result<()> {
        self.execute_with(packets, || ()).await
    }

    /// Like [`execute`](Self::execute), but runs `on_written` once every
    /// packet is written and before the lock is released, so the caller's
    /// bookkeeping follows the same order as the writes.
    ///
    /// `on_written` does not run for an empty sequence or on error.
    pub async fn execute_with<F>(&self, packets: &[Packet], on_written: F) -> Result<()>
    where
        F: FnOnce() + Send,
    {
        if packets.is_empty() {
            debug!("No packets to send to {}", self.inner.address);
            return Ok(());
        }

        let _guard = self.inner.command_lock.lock().await;
        self.inner.cancel_idle_timer();

        let link = self.inner.ensure_connected().await?;

        for (index, packet) in packets.iter().enumerate() {
            trace!(
                "Writing packet {}/{} to {}: {:02X?}",
                index + 1,
                packets.len(),
                self.inner.address,
                packet.as_bytes()
            );

            if let Err(e) = self
                .inner
                .transport
                .write(&link, self.inner.write_characteristic, packet.as_bytes())
                .await
            {
                warn!(
                    "Write {}/{} to {} failed: {}",
                    index + 1,
                    packets.len(),
                    self.inner.address,
                    e
                );

                if let Err(teardown_err) = self.inner.teardown("write failure").await {
                    debug!("Teardown after write failure: {}", teardown_err);
                }

                return Err(match e {
                    Error::TransportWriteFailed { .. } => e,
                    other => Error::TransportWriteFailed {
                        reason: other.to_string(),
                    },
                });
            }
        }

        on_written();
        self.inner.arm_idle_timer();
        Ok(())
    }

    /// Close the link.
    ///
    /// A command already in progress is allowed to finish first. The next
    /// command reconnects.
    pub async fn shutdown(&self) -> Result<()> {
        let _guard = self.inner.command_lock.lock().await;
        self.inner.cancel_idle_timer();
        self.inner.teardown("shutdown").await
    }
}

impl<T: BleTransport> Inner<T> {
    fn current_link(&self) -> Option<Arc<T::Link>> {
        self.link.read().as_ref().map(|active| active.link.clone())
    }

    async fn ensure_connected(self: &Arc<Self>) -> Result<Arc<T::Link>> {
        if let Some(link) = self.current_link() {
            return Ok(link);
        }

        self.set_state(ConnectionState::Connecting);
        debug!("Resolving {}", self.address);

        let device = match self.transport.resolve(&self.address).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                error!("Device {} not found", self.address);
                self.set_state(ConnectionState::Disconnected);
                return Err(Error::DeviceNotFound {
                    address: self.address.clone(),
                });
            }
            Err(e) => {
                error!("Failed to resolve {}: {}", self.address, e);
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        let link_id = self.next_link_id.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(self);
        let on_disconnect: DisconnectCallback = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.handle_disconnect(link_id);
            }
        });

        match self.transport.connect(&device, on_disconnect).await {
            Ok(link) => {
                let link = Arc::new(link);
                *self.link.write() = Some(ActiveLink {
                    id: link_id,
                    link: link.clone(),
                });
                info!("Connected to {}", self.address);
                self.set_state(ConnectionState::Connected);
                Ok(link)
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", self.address, e);
                self.set_state(ConnectionState::Disconnected);
                Err(match e {
                    Error::ConnectionFailed { .. } => e,
                    other => Error::ConnectionFailed {
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    /// Transport reported that link `link_id` dropped.
    fn handle_disconnect(&self, link_id: u64) {
        let dropped = {
            let mut link = self.link.write();
            if link.as_ref().map(|active| active.id) == Some(link_id) {
                link.take()
            } else {
                None
            }
        };

        if dropped.is_some() {
            info!("Disconnected from {}", self.address);
            self.cancel_idle_timer();
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// Close the current link, if any. Caller must hold the command lock.
    async fn teardown(&self, reason: &str) -> Result<()> {
        let active = self.link.write().take();
        let result = match active {
            Some(active) => {
                let result = self.transport.disconnect(&active.link).await;
                match &result {
                    Ok(()) => info!("Disconnected from {} ({})", self.address, reason),
                    Err(e) => warn!("Error disconnecting from {}: {}", self.address, e),
                }
                result
            }
            None => Ok(()),
        };

        self.set_state(ConnectionState::Disconnected);
        result
    }

    fn arm_idle_timer(self: &Arc<Self>) {
        let generation = self.timer_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(self);
        let timeout = self.idle_timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.idle_disconnect(generation).await;
            }
        });

        if let Some(previous) = self.idle_timer.lock().replace(handle) {
            previous.abort();
        }
        debug!("Idle timer armed for {} ({:?})", self.address, timeout);
    }

    fn cancel_idle_timer(&self) {
        self.timer_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.idle_timer.lock().take() {
            handle.abort();
        }
    }

    async fn idle_disconnect(&self, generation: u64) {
        let _guard = self.command_lock.lock().await;
        if self.timer_generation.load(Ordering::SeqCst) != generation {
            return;
        }

        debug!("Idle timeout elapsed for {}", self.address);
        // Errors are already logged; the link is cleared either way.
        let _ = self.teardown("idle").await;
    }

    /// Update the connection state and emit an event.
    fn set_state(&self, new_state: ConnectionState) {
        let old_state = {
            let mut state = self.state.write();
            let old = *state;
            *state = new_state;
            old
        };

        if old_state != new_state {
            debug!(
                "Connection state changed for {}: {} -> {}",
                self.address, old_state, new_state
            );

            let _ = self.event_tx.send(ConnectionEvent {
                address: self.address.clone(),
                state: new_state,
            });
        }
    }
}

impl<T: BleTransport> Drop for Inner<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.idle_timer.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::fake::{FakeEvent, FakeTransport};
    use crate::ble::transport::MockBleTransport;
    use crate::ble::uuids::LIGHT_WRITE_UUID;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";

    fn manager(transport: &Arc<FakeTransport>) -> ConnectionManager<FakeTransport> {
        ConnectionManager::new(
            transport.clone(),
            ADDRESS,
            LIGHT_WRITE_UUID,
            DEFAULT_IDLE_TIMEOUT,
        )
    }

    fn packets(command: u8, count: u8) -> Vec<Packet> {
        (0..count).map(|i| Packet::frame(command, &[i])).collect()
    }

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert_eq!(format!("{}", ConnectionState::Connecting), "Connecting");
    }

    #[tokio::test]
    async fn test_execute_connects_lazily_and_writes_in_order() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        let manager = manager(&transport);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        let sequence = packets(0x06, 2);
        assert_ok!(manager.execute(&sequence).await);

        assert!(manager.is_connected());
        assert_eq!(
            transport.events(),
            vec![
                FakeEvent::Resolve(ADDRESS.to_string()),
                FakeEvent::Connect(1),
                FakeEvent::Write {
                    link: 1,
                    characteristic: LIGHT_WRITE_UUID,
                    data: sequence[0].as_bytes().to_vec(),
                },
                FakeEvent::Write {
                    link: 1,
                    characteristic: LIGHT_WRITE_UUID,
                    data: sequence[1].as_bytes().to_vec(),
                },
            ]
        );

        assert_ok!(manager.execute(&packets(0x05, 1)).await);
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_sequence_does_not_connect() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        let manager = manager(&transport);

        assert_ok!(manager.execute(&[]).await);
        assert!(transport.events().is_empty());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unknown_address() {
        let transport = Arc::new(FakeTransport::new());
        let manager = manager(&transport);

        let err = assert_err!(manager.execute(&packets(0x01, 1)).await);
        assert!(matches!(err, Error::DeviceNotFound { .. }));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(transport.writes().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_is_not_retried() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        transport.set_fail_connect(true);
        let manager = manager(&transport);

        let err = assert_err!(manager.execute(&packets(0x01, 1)).await);
        assert!(matches!(err, Error::ConnectionFailed { .. }));
        assert_eq!(transport.connect_count(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        transport.set_fail_connect(false);
        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_write_failure_aborts_sequence() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        transport.fail_write_at(1);
        let manager = manager(&transport);

        let err = assert_err!(manager.execute(&packets(0x06, 3)).await);
        assert!(matches!(err, Error::TransportWriteFailed { .. }));
        assert_eq!(transport.writes().len(), 1);
        assert_eq!(transport.disconnect_count(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_disconnects() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        let manager = manager(&transport);

        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        tokio::time::sleep(DEFAULT_IDLE_TIMEOUT + Duration::from_secs(1)).await;

        assert_eq!(transport.disconnect_count(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        assert_eq!(transport.connect_count(), 2);
        assert!(manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timer_rearms_on_each_command() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        let manager = manager(&transport);

        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_ok!(manager.execute(&packets(0x05, 1)).await);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(transport.disconnect_count(), 0);
        assert!(manager.is_connected());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(transport.disconnect_count(), 1);
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_disconnect_clears_link() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        let manager = manager(&transport);

        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        transport.drop_link();
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        // The cancelled idle timer must not fire a disconnect later.
        tokio::time::sleep(DEFAULT_IDLE_TIMEOUT * 2).await;
        assert_eq!(transport.disconnect_count(), 0);

        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disconnects_and_cancels_timer() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        let manager = manager(&transport);

        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        assert_ok!(manager.shutdown().await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(transport.disconnect_count(), 1);

        tokio::time::sleep(DEFAULT_IDLE_TIMEOUT * 2).await;
        assert_eq!(transport.disconnect_count(), 1);

        // Shutting down while disconnected is a no-op.
        assert_ok!(manager.shutdown().await);
        assert_eq!(transport.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_command() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        transport.set_write_delay(Duration::from_millis(200));
        let manager = manager(&transport);

        let sequence = packets(0x06, 2);
        let (executed, shut_down) = tokio::join!(manager.execute(&sequence), async {
            tokio::task::yield_now().await;
            manager.shutdown().await
        });
        assert_ok!(executed);
        assert_ok!(shut_down);

        let events = transport.events();
        assert!(matches!(events.last(), Some(FakeEvent::Disconnect(1))));
        assert_eq!(transport.writes().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sequences_do_not_interleave() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        transport.set_write_delay(Duration::from_millis(5));
        let manager = manager(&transport);

        let mut tasks = Vec::new();
        for command in [0x06u8, 0x0F, 0x05, 0x03] {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                manager.execute(&packets(command, 3)).await
            }));
        }
        for task in tasks {
            assert_ok!(task.await.unwrap());
        }

        let writes = transport.writes();
        assert_eq!(writes.len(), 12);
        for chunk in writes.chunks(3) {
            let command = chunk[0][1];
            assert!(chunk.iter().all(|packet| packet[1] == command));
            let indexes: Vec<u8> = chunk.iter().map(|packet| packet[4]).collect();
            assert_eq!(indexes, vec![0, 1, 2]);
        }
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_on_written_runs_before_next_command() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        transport.set_write_delay(Duration::from_millis(5));
        let manager = manager(&transport);
        let completed = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut tasks = Vec::new();
        for command in [0x01u8, 0x03, 0x05, 0x06] {
            let manager = manager.clone();
            let transport = transport.clone();
            let completed = completed.clone();
            tasks.push(tokio::spawn(async move {
                manager
                    .execute_with(&packets(command, 2), move || {
                        completed.lock().push((command, transport.writes().len()));
                    })
                    .await
            }));
        }
        for task in tasks {
            assert_ok!(task.await.unwrap());
        }

        let mut completed = completed.lock().clone();
        completed.sort_by_key(|(_, written)| *written);
        let counts: Vec<usize> = completed.iter().map(|(_, written)| *written).collect();
        assert_eq!(counts, vec![2, 4, 6, 8]);

        let writes = transport.writes();
        for (command, written) in completed {
            assert_eq!(writes[written - 1][1], command);
        }
    }

    #[tokio::test]
    async fn test_on_written_skipped_on_failure() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        transport.fail_write_at(1);
        let manager = manager(&transport);
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let flag = ran.clone();
        assert_err!(
            manager
                .execute_with(&packets(0x06, 2), move || flag.store(true, Ordering::SeqCst))
                .await
        );
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_disconnect_callback_is_ignored() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        let manager = manager(&transport);

        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        assert_ok!(manager.shutdown().await);
        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        assert_eq!(transport.connect_count(), 2);

        let mut rx = manager.subscribe();
        transport.drop_link_id(1);
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(rx.try_recv().is_err());

        assert_ok!(manager.execute(&packets(0x03, 1)).await);
        assert_eq!(transport.connect_count(), 2);
        assert!(matches!(
            transport.events().last(),
            Some(FakeEvent::Write { link: 2, .. })
        ));

        transport.drop_link_id(2);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_state_events() {
        let transport = Arc::new(FakeTransport::with_device(ADDRESS));
        let manager = manager(&transport);
        let mut rx = manager.subscribe();

        assert_ok!(manager.execute(&packets(0x01, 1)).await);
        assert_ok!(manager.shutdown().await);

        let states: Vec<ConnectionState> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| event.state)
            .collect();
        assert_eq!(
            states,
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_resolve_error_propagates() {
        let mut mock = MockBleTransport::new();
        mock.expect_resolve()
            .times(1)
            .returning(|_| Err(Error::BluetoothUnavailable));
        mock.expect_connect().never();

        let manager = ConnectionManager::new(
            Arc::new(mock),
            ADDRESS,
            LIGHT_WRITE_UUID,
            DEFAULT_IDLE_TIMEOUT,
        );
        let err = assert_err!(manager.execute(&packets(0x01, 1)).await);
        assert!(matches!(err, Error::BluetoothUnavailable));
    }

    #[tokio::test]
    async fn test_foreign_connect_error_becomes_connection_failed() {
        let mut mock = MockBleTransport::new();
        mock.expect_resolve()
            .returning(|address| Ok(Some(address.to_string())));
        mock.expect_connect()
            .times(1)
            .returning(|_, _| Err(Error::Internal("adapter busy".to_string())));
        mock.expect_write().never();

        let manager = ConnectionManager::new(
            Arc::new(mock),
            ADDRESS,
            LIGHT_WRITE_UUID,
            DEFAULT_IDLE_TIMEOUT,
        );
        let err = assert_err!(manager.execute(&packets(0x01, 1)).await);
        match err {
            Error::ConnectionFailed { reason } => assert!(reason.contains("adapter busy")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
