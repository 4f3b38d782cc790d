//! Connection manager and live views for consumers of the gateway.

pub mod config;
pub mod manager;
pub mod reconnect;
pub mod state;
pub mod views;

pub use config::ClientConfig;
pub use manager::{ConnectionManager, RoomGuard, SubscriptionId};
pub use reconnect::{Backoff, DisconnectReason, ReconnectPolicy};
pub use state::{ConnectionState, Session};
pub use views::{
    InboxItem, Leaderboard, LiveView, NotificationInbox, SubmissionCounter, TeamRoster, ViewState,
};
