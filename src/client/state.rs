use std::fmt;

/// Lifecycle of a manager's connection.
///
/// `Disconnected -> Connecting -> Connected -> (Disconnected | Reconnecting)
/// -> Connected | Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Authentication status of the user session that owns a manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Loading,
    Authenticated { access_token: String },
    Unauthenticated,
}
