//! Per-connection session record.
//!
//! Holds everything the dispatcher needs about one connection:
//! - Connection identity
//! - Negotiated MTU
//! - Reassembly state

use std::time::{Duration, Instant};

use crate::core::AuthenticatorConfig;
use crate::transport::{Mtu, Reassembler};

/// Identifier the link assigns to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a connection ID.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// State of one connected host.
#[derive(Debug)]
pub struct Session {
    /// Connection identifier.
    id: ConnectionId,

    /// Current MTU.
    mtu: Mtu,

    /// Inbound message reassembly.
    reassembler: Reassembler,

    /// When the connection was established.
    connected_at: Instant,

    /// Last inbound chunk.
    last_activity: Instant,
}

impl Session {
    /// Create a session using the configured default MTU.
    pub fn new(id: ConnectionId, config: &AuthenticatorConfig, now: Instant) -> Self {
        Self::with_mtu(id, Mtu::new(config.default_mtu), config, now)
    }

    /// Create a session with a known MTU.
    pub fn with_mtu(
        id: ConnectionId,
        mtu: Mtu,
        config: &AuthenticatorConfig,
        now: Instant,
    ) -> Self {
        Self {
            id,
            mtu,
            reassembler: Reassembler::new(config),
            connected_at: now,
            last_activity: now,
        }
    }

    /// Get the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the current MTU.
    pub fn current_mtu(&self) -> Mtu {
        self.mtu
    }

    /// Update the MTU after renegotiation.
    pub fn set_mtu(&mut self, mtu: Mtu) {
        if mtu != self.mtu {
            tracing::debug!(connection = %self.id, old = %self.mtu, new = %mtu, "mtu changed");
        }
        self.mtu = mtu;
    }

    /// Get the reassembler.
    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    /// Get mutable access to the reassembler.
    pub fn reassembler_mut(&mut self) -> &mut Reassembler {
        &mut self.reassembler
    }

    /// When an incomplete inbound message expires, if any.
    pub fn reassembly_deadline(&self) -> Option<Instant> {
        self.reassembler.deadline()
    }

    /// Record activity.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Time since last inbound chunk.
    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Connection age.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.connected_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
        assert_eq!(ConnectionId::from(7), ConnectionId::new(7));
    }

    #[test]
    fn test_session_mtu() {
        let config = AuthenticatorConfig::default();
        let now = Instant::now();
        let mut session = Session::new(ConnectionId::new(1), &config, now);
        assert_eq!(session.current_mtu(), Mtu::new(20));

        session.set_mtu(Mtu::from_att_mtu(185));
        assert_eq!(session.current_mtu().get(), 182);
    }

    #[test]
    fn test_session_timing() {
        let config = AuthenticatorConfig::default();
        let t0 = Instant::now();
        let mut session = Session::new(ConnectionId::new(1), &config, t0);

        let t1 = t0 + Duration::from_secs(3);
        session.touch(t1);
        let later = t1 + Duration::from_secs(1);
        assert_eq!(session.idle_time(later), Duration::from_secs(1));
        assert_eq!(session.age(t1), Duration::from_secs(3));
        assert!(session.reassembly_deadline().is_none());
    }
}
