//! Async authenticator service.
//!
//! Provides `AuthenticatorServer<L>`, a tokio task that owns the session of
//! the single active connection and drives the dispatcher from link events.
//! The session is owned by that task alone, so every chunk for a connection
//! is processed strictly in order and never concurrently.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::core::AuthenticatorConfig;
use crate::dispatch::{ConnectionId, Dispatcher, InstructionRegistry, Link, Session};
use crate::gatt::{Characteristic, GattError, read_characteristic};
use crate::transport::Mtu;

/// Errors that can occur talking to the authenticator service.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The service has shut down.
    #[error("server shut down")]
    Shutdown,

    /// Characteristic access failed.
    #[error("gatt error: {0}")]
    Gatt(#[from] GattError),

    /// The event came from a connection other than the active one.
    #[error("inactive connection: {0}")]
    InactiveConnection(ConnectionId),
}

/// Event delivered by the link.
#[derive(Debug)]
pub enum TransportEvent {
    /// A host connected.
    Connected {
        /// Connection ID.
        connection: ConnectionId,
        /// Negotiated MTU, if already known.
        mtu: Option<Mtu>,
    },

    /// The MTU was renegotiated.
    MtuChanged {
        /// Connection ID.
        connection: ConnectionId,
        /// New MTU.
        mtu: Mtu,
    },

    /// The host wrote a chunk to the control point.
    Chunk {
        /// Connection ID.
        connection: ConnectionId,
        /// Chunk bytes.
        chunk: Vec<u8>,
    },

    /// The host read a characteristic.
    Read {
        /// Connection ID.
        connection: ConnectionId,
        /// Characteristic being read.
        characteristic: Characteristic,
        /// Read offset.
        offset: usize,
        /// Where to send the value.
        reply: oneshot::Sender<Result<Vec<u8>, ServerError>>,
    },

    /// The host disconnected.
    Disconnected {
        /// Connection ID.
        connection: ConnectionId,
    },
}

/// [`Link`] that forwards outbound chunks over a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<(ConnectionId, Vec<u8>)>,
}

impl ChannelLink {
    /// Create a link and the receiver of its chunks.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(ConnectionId, Vec<u8>)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Link for ChannelLink {
    type Error = mpsc::error::SendError<(ConnectionId, Vec<u8>)>;

    fn send_outbound_chunk(
        &mut self,
        connection: ConnectionId,
        chunk: &[u8],
    ) -> Result<(), Self::Error> {
        self.tx.send((connection, chunk.to_vec()))
    }
}

/// Handle for feeding link events to a running server.
#[derive(Debug)]
pub struct ServerHandle {
    events: mpsc::Sender<TransportEvent>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ServerHandle {
    /// Deliver a raw event.
    pub async fn send(&self, event: TransportEvent) -> Result<(), ServerError> {
        self.events
            .send(event)
            .await
            .map_err(|_| ServerError::Shutdown)
    }

    /// Report a new connection.
    pub async fn connect(
        &self,
        connection: ConnectionId,
        mtu: Option<Mtu>,
    ) -> Result<(), ServerError> {
        self.send(TransportEvent::Connected { connection, mtu }).await
    }

    /// Report a renegotiated ATT MTU.
    pub async fn mtu_changed(
        &self,
        connection: ConnectionId,
        att_mtu: usize,
    ) -> Result<(), ServerError> {
        let mtu = Mtu::from_att_mtu(att_mtu);
        self.send(TransportEvent::MtuChanged { connection, mtu }).await
    }

    /// Deliver a control point write.
    pub async fn inbound_chunk(
        &self,
        connection: ConnectionId,
        chunk: Vec<u8>,
    ) -> Result<(), ServerError> {
        self.send(TransportEvent::Chunk { connection, chunk }).await
    }

    /// Read a characteristic.
    pub async fn read_characteristic(
        &self,
        connection: ConnectionId,
        characteristic: Characteristic,
        offset: usize,
    ) -> Result<Vec<u8>, ServerError> {
        let (reply, rx) = oneshot::channel();
        self.send(TransportEvent::Read {
            connection,
            characteristic,
            offset,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ServerError::Shutdown)?
    }

    /// Report a disconnection.
    pub async fn disconnect(&self, connection: ConnectionId) -> Result<(), ServerError> {
        self.send(TransportEvent::Disconnected { connection }).await
    }

    /// Stop the server.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// The authenticator service.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use u2f_ble_protocol::prelude::*;
///
/// let registry = InstructionRegistry::builder()
///     .with_version()
///     .register(Instruction::Register, register_handler)
///     .register(Instruction::Authenticate, authenticate_handler)
///     .build();
///
/// let (link, mut notifications) = ChannelLink::new();
/// let server = AuthenticatorServer::new(AuthenticatorConfig::default(), Arc::new(registry), link);
/// let (handle, task) = server.spawn();
///
/// handle.connect(ConnectionId::new(1), None).await?;
/// handle.inbound_chunk(ConnectionId::new(1), vec![0x81, 0x00, 0x00]).await?;
/// let (connection, chunk) = notifications.recv().await.unwrap();
/// ```
pub struct AuthenticatorServer<L: Link> {
    /// Server configuration.
    config: AuthenticatorConfig,

    /// Command dispatcher.
    dispatcher: Dispatcher,

    /// Outbound link.
    link: L,

    /// Session of the active connection.
    session: Option<Session>,
}

impl<L> AuthenticatorServer<L>
where
    L: Link + Send + 'static,
{
    /// Create a server.
    pub fn new(config: AuthenticatorConfig, registry: Arc<InstructionRegistry>, link: L) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::new(registry),
            link,
            session: None,
        }
    }

    /// Spawn the server on the current tokio runtime.
    pub fn spawn(self) -> (ServerHandle, JoinHandle<()>) {
        let (events_tx, events_rx) = mpsc::channel(self.config.event_buffer);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(self.run(events_rx, shutdown_rx));
        let handle = ServerHandle {
            events: events_tx,
            shutdown_tx: Some(shutdown_tx),
        };
        (handle, task)
    }

    /// Run the event loop until shutdown or until every handle is dropped.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<TransportEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        loop {
            let deadline = self.session.as_ref().and_then(Session::reassembly_deadline);

            // An expired deadline is served before any event queued behind it.
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = wait_until(deadline) => self.handle_timeout(),
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
            }
        }
        tracing::debug!("authenticator server stopped");
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { connection, mtu } => self.on_connected(connection, mtu),
            TransportEvent::MtuChanged { connection, mtu } => {
                match self.active_session(connection) {
                    Some(session) => session.set_mtu(mtu),
                    None => tracing::warn!(%connection, "mtu change for inactive connection"),
                }
            }
            TransportEvent::Chunk { connection, chunk } => self.on_chunk(connection, &chunk),
            TransportEvent::Read {
                connection,
                characteristic,
                offset,
                reply,
            } => {
                let _ = reply.send(self.on_read(connection, characteristic, offset));
            }
            TransportEvent::Disconnected { connection } => {
                if let Some(session) = self.active_session(connection) {
                    tracing::debug!(%connection, age = ?session.age(now()), "disconnected");
                    self.session = None;
                }
            }
        }
    }

    fn on_read(
        &self,
        connection: ConnectionId,
        characteristic: Characteristic,
        offset: usize,
    ) -> Result<Vec<u8>, ServerError> {
        // Hosts may read the capabilities before their first write.
        let mtu = match &self.session {
            Some(session) if session.id() == connection => session.current_mtu(),
            Some(session) => {
                tracing::warn!(
                    %connection,
                    active = %session.id(),
                    "read from inactive connection refused"
                );
                return Err(ServerError::InactiveConnection(connection));
            }
            None => Mtu::new(self.config.default_mtu),
        };
        Ok(read_characteristic(characteristic, offset, mtu)?)
    }

    fn on_connected(&mut self, connection: ConnectionId, mtu: Option<Mtu>) {
        if let Some(active) = &self.session {
            if active.id() != connection {
                tracing::warn!(
                    %connection,
                    active = %active.id(),
                    "refusing second connection"
                );
                return;
            }
        }

        let mtu = mtu.unwrap_or_else(|| Mtu::new(self.config.default_mtu));
        tracing::debug!(%connection, %mtu, "connected");
        self.session = Some(Session::with_mtu(connection, mtu, &self.config, now()));
    }

    fn on_chunk(&mut self, connection: ConnectionId, chunk: &[u8]) {
        if self.session.is_none() {
            // Some stacks deliver writes before the connection event.
            self.on_connected(connection, None);
        }
        let Some(session) = self.session.as_mut().filter(|s| s.id() == connection) else {
            tracing::warn!(
                %connection,
                len = chunk.len(),
                "chunk from inactive connection dropped"
            );
            return;
        };

        if let Err(e) = self
            .dispatcher
            .on_inbound_chunk(session, chunk, now(), &mut self.link)
        {
            tracing::warn!(%connection, error = %e, "failed to send response");
        }
    }

    fn handle_timeout(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = self.dispatcher.on_timeout(session, now(), &mut self.link) {
            tracing::warn!(connection = %session.id(), error = %e, "failed to send timeout");
        }
    }

    fn active_session(&mut self, connection: ConnectionId) -> Option<&mut Session> {
        self.session.as_mut().filter(|s| s.id() == connection)
    }

    /// Get the server configuration.
    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }
}

/// Current time on the tokio clock.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::apdu::{ApduRequest, Instruction};
    use crate::dispatch::HandlerResult;

    type Notifications = mpsc::UnboundedReceiver<(ConnectionId, Vec<u8>)>;

    fn spawn(config: AuthenticatorConfig) -> (ServerHandle, JoinHandle<()>, Notifications) {
        let registry = InstructionRegistry::builder()
            .with_version()
            .register(Instruction::Register, |_: &ApduRequest| -> HandlerResult {
                Ok(vec![0x05; 100])
            })
            .build();
        let (link, rx) = ChannelLink::new();
        let (handle, task) = AuthenticatorServer::new(config, Arc::new(registry), link).spawn();
        (handle, task, rx)
    }

    const CONN: ConnectionId = ConnectionId::new(42);

    #[tokio::test]
    async fn test_ping_roundtrip() {
        let (handle, _task, mut rx) = spawn(AuthenticatorConfig::default());
        handle.connect(CONN, None).await.unwrap();
        handle
            .inbound_chunk(CONN, vec![0x81, 0x00, 0x04, 0xDE, 0xAD, 0xBE, 0xEF])
            .await
            .unwrap();

        let (conn, chunk) = rx.recv().await.unwrap();
        assert_eq!(conn, CONN);
        assert_eq!(chunk, vec![0x81, 0x00, 0x04, 0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[tokio::test]
    async fn test_response_uses_negotiated_mtu() {
        let (handle, _task, mut rx) = spawn(AuthenticatorConfig::default());
        handle.connect(CONN, None).await.unwrap();
        handle.mtu_changed(CONN, 63).await.unwrap();
        handle
            .inbound_chunk(CONN, vec![0x83, 0x00, 0x04, 0x00, 0x01, 0x00, 0x00])
            .await
            .unwrap();

        // 100 bytes at MTU 60: 57 + 43
        let (_, first) = rx.recv().await.unwrap();
        let (_, second) = rx.recv().await.unwrap();
        assert_eq!(first.len(), 60);
        assert_eq!(&first[..3], &[0x83, 0x00, 0x64]);
        assert_eq!(second[0], 0x00);
        assert_eq!(second.len(), 1 + 100 - 57);
    }

    #[tokio::test]
    async fn test_read_characteristics() {
        let (handle, _task, _rx) = spawn(AuthenticatorConfig::default());
        handle.connect(CONN, Some(Mtu::new(128))).await.unwrap();

        let len = handle
            .read_characteristic(CONN, Characteristic::ControlPointLength, 0)
            .await
            .unwrap();
        assert_eq!(len, vec![0x00, 0x80]);

        let rev = handle
            .read_characteristic(CONN, Characteristic::ServiceRevisionBitfield, 0)
            .await
            .unwrap();
        assert_eq!(rev, vec![0x40]);

        let err = handle
            .read_characteristic(CONN, Characteristic::Status, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServerError::Gatt(GattError::ReadNotPermitted(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_reassembly_times_out() {
        let config = AuthenticatorConfig::builder()
            .reassembly_timeout(Duration::from_millis(500))
            .build();
        let (handle, _task, mut rx) = spawn(config);
        handle.connect(CONN, None).await.unwrap();
        handle
            .inbound_chunk(CONN, vec![0x83, 0x00, 0x20, 0x00])
            .await
            .unwrap();

        let (conn, chunk) = rx.recv().await.unwrap();
        assert_eq!(conn, CONN);
        assert_eq!(chunk, vec![0xBF, 0x00, 0x01, 0x05]);

        // The connection stays usable.
        handle
            .inbound_chunk(CONN, vec![0x81, 0x00, 0x01, 0x09])
            .await
            .unwrap();
        let (_, chunk) = rx.recv().await.unwrap();
        assert_eq!(chunk, vec![0x81, 0x00, 0x01, 0x09]);
    }

    #[tokio::test]
    async fn test_second_connection_refused() {
        let (handle, _task, mut rx) = spawn(AuthenticatorConfig::default());
        let other = ConnectionId::new(7);
        handle.connect(CONN, None).await.unwrap();
        handle.connect(other, None).await.unwrap();
        handle
            .inbound_chunk(other, vec![0x81, 0x00, 0x01, 0x01])
            .await
            .unwrap();
        handle
            .inbound_chunk(CONN, vec![0x81, 0x00, 0x01, 0x02])
            .await
            .unwrap();

        let (conn, chunk) = rx.recv().await.unwrap();
        assert_eq!(conn, CONN);
        assert_eq!(chunk, vec![0x81, 0x00, 0x01, 0x02]);
    }

    #[tokio::test]
    async fn test_disconnect_frees_slot() {
        let (handle, _task, mut rx) = spawn(AuthenticatorConfig::default());
        let other = ConnectionId::new(7);
        handle.connect(CONN, None).await.unwrap();
        handle.disconnect(CONN).await.unwrap();
        handle.connect(other, None).await.unwrap();
        handle
            .inbound_chunk(other, vec![0x81, 0x00, 0x00])
            .await
            .unwrap();

        let (conn, chunk) = rx.recv().await.unwrap();
        assert_eq!(conn, other);
        assert_eq!(chunk, vec![0x81, 0x00, 0x00]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_initial_reports_timeout_first() {
        let (handle, _task, mut rx) = spawn(AuthenticatorConfig::default());
        handle.connect(CONN, None).await.unwrap();
        handle
            .inbound_chunk(CONN, vec![0x81, 0x00, 0x40, 0x01])
            .await
            .unwrap();
        tokio::task::yield_now().await;

        // Deadline and the next write become ready together.
        tokio::time::advance(Duration::from_secs(30)).await;
        handle
            .inbound_chunk(CONN, vec![0x81, 0x00, 0x01, 0x07])
            .await
            .unwrap();

        let (_, first) = rx.recv().await.unwrap();
        let (_, second) = rx.recv().await.unwrap();
        assert_eq!(first, vec![0xBF, 0x00, 0x01, 0x05]);
        assert_eq!(second, vec![0x81, 0x00, 0x01, 0x07]);
    }

    #[tokio::test]
    async fn test_read_from_inactive_connection_refused() {
        let (handle, _task, _rx) = spawn(AuthenticatorConfig::default());
        let other = ConnectionId::new(7);
        handle.connect(CONN, Some(Mtu::new(128))).await.unwrap();

        let err = handle
            .read_characteristic(other, Characteristic::ControlPointLength, 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServerError::InactiveConnection(c) if c == other
        ));

        let value = handle
            .read_characteristic(CONN, Characteristic::ControlPointLength, 0)
            .await
            .unwrap();
        assert_eq!(value, vec![0x00, 0x80]);
    }

    #[tokio::test]
    async fn test_read_before_connect_uses_default_mtu() {
        let (handle, _task, _rx) = spawn(AuthenticatorConfig::default());
        let value = handle
            .read_characteristic(CONN, Characteristic::ControlPointLength, 0)
            .await
            .unwrap();
        assert_eq!(value, vec![0x00, 0x14]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let (handle, task, _rx) = spawn(AuthenticatorConfig::default());
        handle.shutdown();
        task.await.unwrap();
    }
}
