//! Reconnection policy.
//!
//! The driver is the only reconnection authority: every disconnect goes
//! through one [`Backoff`] with one attempt counter.

use std::fmt;
use std::time::Duration;

/// Why a session ended (or never started).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The gateway sent a close frame.
    ServerDisconnect,
    /// The stream ended without a close frame.
    TransportClose,
    TransportError,
    /// The handshake failed.
    ConnectError,
    /// The handshake was refused with 401/403.
    Unauthorized,
    /// `close()` was called.
    ClientClose,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::ServerDisconnect => "io server disconnect",
            DisconnectReason::TransportClose => "transport close",
            DisconnectReason::TransportError => "transport error",
            DisconnectReason::ConnectError => "connect_error",
            DisconnectReason::Unauthorized => "unauthorized",
            DisconnectReason::ClientClose => "io client disconnect",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub server_disconnect_step: Duration,
    pub max_attempts: u32,
}

/// Attempt counter and delay schedule for one manager.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// A session was established.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Delay before the next attempt, or `None` when no further attempt
    /// should be made.
    ///
    /// Server-initiated disconnects back off linearly (`step * n`); every
    /// other failure doubles from the base delay up to the cap.
    pub fn next_delay(&mut self, reason: DisconnectReason) -> Option<Duration> {
        if matches!(reason, DisconnectReason::ClientClose | DisconnectReason::Unauthorized) {
            return None;
        }
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        self.attempts += 1;

        let delay = match reason {
            DisconnectReason::ServerDisconnect => self.policy.server_disconnect_step * self.attempts,
            _ => {
                let factor = 1u32 << (self.attempts - 1).min(16);
                (self.policy.base_delay * factor).min(self.policy.max_delay)
            }
        };
        Some(delay)
    }
}
