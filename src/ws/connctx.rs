use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::models::ServerEvent;

pub type ConnId = Uuid;

/// Item queued for a socket's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    /// Server-initiated close.
    Close,
}

/// An authenticated socket.
#[derive(Clone, Debug)]
pub struct ConnCtx {
    pub id: ConnId,
    pub user_id: String,
    pub connected_at: DateTime<Utc>,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnCtx {
    pub fn new(user_id: impl Into<String>, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            connected_at: Utc::now(),
            tx,
        }
    }

    /// Queue an event for this socket. Returns false when the writer is gone.
    pub fn send(&self, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                error!("Failed to serialize {} for connection {}: {}", event.event_name(), self.id, e);
                false
            }
        }
    }

    pub fn send_text(&self, text: String) -> bool {
        if self.tx.send(Outbound::Text(text)).is_err() {
            debug!("Connection {} writer closed, dropping message", self.id);
            return false;
        }
        true
    }

    pub fn close(&self) -> bool {
        self.tx.send(Outbound::Close).is_ok()
    }
}
