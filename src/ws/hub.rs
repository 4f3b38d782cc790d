//! Connection registry, room membership, presence and event fan-out.
//!
//! All mutations and fan-outs go through one lock, so events emitted to a
//! room reach every member's queue in emission order.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};
use utoipa::ToSchema;

use super::connctx::{ConnCtx, ConnId, Outbound};
use super::presence::PresenceSet;
use super::room::RoomKey;
use crate::models::ServerEvent;

struct ConnEntry {
    ctx: ConnCtx,
    rooms: HashSet<RoomKey>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnId, ConnEntry>,
    rooms: HashMap<RoomKey, HashSet<ConnId>>,
    presence: PresenceSet,
}

impl HubState {
    fn join(&mut self, conn_id: ConnId, room: RoomKey) -> bool {
        let Some(entry) = self.connections.get_mut(&conn_id) else {
            return false;
        };
        if !entry.rooms.insert(room.clone()) {
            return false;
        }
        self.rooms.entry(room).or_default().insert(conn_id);
        true
    }

    fn leave(&mut self, conn_id: ConnId, room: &RoomKey) -> bool {
        let Some(entry) = self.connections.get_mut(&conn_id) else {
            return false;
        };
        if !entry.rooms.remove(room) {
            return false;
        }
        self.detach(conn_id, room);
        true
    }

    /// Drop a connection from a room's member set, removing the room once empty.
    fn detach(&mut self, conn_id: ConnId, room: &RoomKey) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&conn_id);
            if members.is_empty() {
                self.rooms.remove(room);
                debug!("Room {} is empty, removed", room);
            }
        }
    }

    fn emit(&self, room: &RoomKey, text: &str) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter_map(|id| self.connections.get(id))
            .filter(|entry| entry.ctx.send_text(text.to_string()))
            .count()
    }

    fn broadcast(&self, text: &str, except: Option<ConnId>) -> usize {
        self.connections
            .values()
            .filter(|entry| Some(entry.ctx.id) != except)
            .filter(|entry| entry.ctx.send_text(text.to_string()))
            .count()
    }
}

/// Snapshot of hub counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct HubStats {
    pub connections: usize,
    pub rooms: usize,
    pub online_users: usize,
}

#[derive(Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

fn encode(event: &ServerEvent) -> Option<String> {
    match serde_json::to_string(event) {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to serialize {}: {}", event.event_name(), e);
            None
        }
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated socket.
    ///
    /// The connection joins its user's private room. If this is the user's
    /// first connection every other socket receives `user:online`. The new
    /// socket receives the full online set.
    pub async fn register(&self, user_id: &str, tx: mpsc::UnboundedSender<Outbound>) -> ConnCtx {
        let ctx = ConnCtx::new(user_id, tx);
        let mut state = self.state.lock().await;

        let came_online = state.presence.connect(user_id);
        state.connections.insert(
            ctx.id,
            ConnEntry {
                ctx: ctx.clone(),
                rooms: HashSet::new(),
            },
        );
        state.join(ctx.id, RoomKey::user(user_id));

        if came_online {
            if let Some(text) = encode(&ServerEvent::user_online(user_id)) {
                state.broadcast(&text, Some(ctx.id));
            }
            info!("User {} is online", user_id);
        }
        ctx.send(&ServerEvent::users_online(state.presence.online_users()));

        info!(
            "Connection {} registered for user {} ({} open)",
            ctx.id,
            user_id,
            state.presence.connection_count(user_id)
        );
        ctx
    }

    /// Remove a socket, its room memberships and its presence share.
    pub async fn unregister(&self, conn_id: ConnId) -> Option<ConnCtx> {
        let mut state = self.state.lock().await;
        let entry = state.connections.remove(&conn_id)?;

        for room in &entry.rooms {
            state.detach(conn_id, room);
        }

        let user_id = entry.ctx.user_id.clone();
        if state.presence.disconnect(&user_id) {
            if let Some(text) = encode(&ServerEvent::user_offline(user_id.as_str())) {
                state.broadcast(&text, None);
            }
            info!("User {} is offline", user_id);
        }

        info!("Connection {} unregistered", conn_id);
        Some(entry.ctx)
    }

    /// Add a socket to a room. Returns false if it was already a member or
    /// the socket is unknown.
    pub async fn join(&self, conn_id: ConnId, room: RoomKey) -> bool {
        let joined = self.state.lock().await.join(conn_id, room.clone());
        if joined {
            debug!("Connection {} joined {}", conn_id, room);
        }
        joined
    }

    /// Remove a socket from a room. Returns false if it was not a member.
    pub async fn leave(&self, conn_id: ConnId, room: &RoomKey) -> bool {
        let left = self.state.lock().await.leave(conn_id, room);
        if left {
            debug!("Connection {} left {}", conn_id, room);
        }
        left
    }

    /// Deliver an event to every socket in a room. Returns the number of
    /// sockets it was queued for.
    pub async fn emit_to_room(&self, room: &RoomKey, event: &ServerEvent) -> usize {
        let Some(text) = encode(event) else {
            return 0;
        };
        let delivered = self.state.lock().await.emit(room, &text);
        debug!("Relayed {} to {} ({} sockets)", event.event_name(), room, delivered);
        delivered
    }

    pub async fn emit_to_user(&self, user_id: &str, event: &ServerEvent) -> usize {
        self.emit_to_room(&RoomKey::user(user_id), event).await
    }

    /// Deliver an event to every socket.
    pub async fn broadcast(&self, event: &ServerEvent) -> usize {
        let Some(text) = encode(event) else {
            return 0;
        };
        self.state.lock().await.broadcast(&text, None)
    }

    /// Send the full online set to every socket.
    pub async fn broadcast_online_users(&self) -> usize {
        let state = self.state.lock().await;
        let event = ServerEvent::users_online(state.presence.online_users());
        match encode(&event) {
            Some(text) => state.broadcast(&text, None),
            None => 0,
        }
    }

    /// Ask every socket of a user to close. Returns the number of sockets.
    pub async fn disconnect_user(&self, user_id: &str) -> usize {
        let state = self.state.lock().await;
        let Some(members) = state.rooms.get(&RoomKey::user(user_id)) else {
            return 0;
        };
        let closed = members
            .iter()
            .filter_map(|id| state.connections.get(id))
            .filter(|entry| entry.ctx.close())
            .count();
        info!("Requested close of {} connections for user {}", closed, user_id);
        closed
    }

    pub async fn online_users(&self) -> Vec<String> {
        self.state.lock().await.presence.online_users()
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.state.lock().await.presence.is_online(user_id)
    }

    /// Rooms a socket is in, sorted.
    pub async fn rooms_of(&self, conn_id: ConnId) -> Vec<RoomKey> {
        let state = self.state.lock().await;
        let mut rooms: Vec<RoomKey> = state
            .connections
            .get(&conn_id)
            .map(|entry| entry.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    pub async fn room_size(&self, room: &RoomKey) -> usize {
        self.state.lock().await.rooms.get(room).map_or(0, |members| members.len())
    }

    pub async fn stats(&self) -> HubStats {
        let state = self.state.lock().await;
        HubStats {
            connections: state.connections.len(),
            rooms: state.rooms.len(),
            online_users: state.presence.len(),
        }
    }
}
