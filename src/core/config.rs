//! Authenticator configuration.

use std::time::Duration;

use super::constants;

/// What to do when an initial frame arrives while a message is still being
/// reassembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusyPolicy {
    /// Drop the partial message and start over with the new one.
    #[default]
    Restart,
    /// Drop the partial message and answer `ChannelBusy`.
    Reject,
}

/// Authenticator configuration.
#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    /// Discard an incomplete message after this long without a chunk.
    pub reassembly_timeout: Duration,

    /// MTU used for a connection until the link reports one.
    pub default_mtu: usize,

    /// Handling of an initial frame during reassembly.
    pub busy_policy: BusyPolicy,

    /// Capacity of the service event queue.
    pub event_buffer: usize,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            reassembly_timeout: constants::REASSEMBLY_TIMEOUT,
            default_mtu: constants::DEFAULT_MTU,
            busy_policy: BusyPolicy::default(),
            event_buffer: constants::EVENT_BUFFER,
        }
    }
}

impl AuthenticatorConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> AuthenticatorConfigBuilder {
        AuthenticatorConfigBuilder::new()
    }
}

/// Builder for [`AuthenticatorConfig`].
#[derive(Debug)]
pub struct AuthenticatorConfigBuilder {
    config: AuthenticatorConfig,
}

impl AuthenticatorConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: AuthenticatorConfig::default(),
        }
    }

    /// Set the reassembly timeout.
    pub fn reassembly_timeout(mut self, timeout: Duration) -> Self {
        self.config.reassembly_timeout = timeout;
        self
    }

    /// Set the MTU assumed before negotiation. Clamped to the valid range.
    pub fn default_mtu(mut self, mtu: usize) -> Self {
        self.config.default_mtu = mtu.clamp(constants::MIN_MTU, constants::MAX_MTU);
        self
    }

    /// Set the busy policy.
    pub fn busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.config.busy_policy = policy;
        self
    }

    /// Set the event queue capacity.
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity.max(1);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> AuthenticatorConfig {
        self.config
    }
}

impl Default for AuthenticatorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
