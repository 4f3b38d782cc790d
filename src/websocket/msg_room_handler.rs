use tracing::debug;

use crate::models::{ClientEvent, RoomOp, ServerEvent};
use crate::ws::{ConnCtx, Hub};

/// Handle `join:*` / `leave:*`. Both are idempotent; an empty id is
/// answered with an `error` event and changes nothing.
pub async fn handle_room_message(hub: &Hub, conn: &ConnCtx, event: &ClientEvent) {
    let Some((op, room)) = event.room_op() else {
        return;
    };

    if room.id().trim().is_empty() {
        conn.send(&ServerEvent::error(format!("{} requires a non-empty id", event.event_name())));
        return;
    }

    let changed = match op {
        RoomOp::Join => hub.join(conn.id, room.clone()).await,
        RoomOp::Leave => hub.leave(conn.id, &room).await,
    };
    if !changed {
        debug!("{} on {} by connection {} changed nothing", event.event_name(), room, conn.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::messages::{HackathonRef, TeamRef};
    use crate::ws::{Outbound, RoomKey};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn join_and_leave_are_idempotent() {
        let hub = Hub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = hub.register("u1", tx).await;
        let join = ClientEvent::JoinTeam(TeamRef { team_id: "t1".to_string() });
        let leave = ClientEvent::LeaveTeam(TeamRef { team_id: "t1".to_string() });

        handle_room_message(&hub, &conn, &join).await;
        handle_room_message(&hub, &conn, &join).await;
        assert_eq!(hub.room_size(&RoomKey::team("t1")).await, 1);

        handle_room_message(&hub, &conn, &leave).await;
        handle_room_message(&hub, &conn, &leave).await;
        assert_eq!(hub.room_size(&RoomKey::team("t1")).await, 0);
        assert_eq!(hub.rooms_of(conn.id).await, vec![RoomKey::user("u1")]);
    }

    #[tokio::test]
    async fn empty_ids_are_answered_with_error() {
        let hub = Hub::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = hub.register("u1", tx).await;
        while rx.try_recv().is_ok() {}

        let join = ClientEvent::JoinHackathon(HackathonRef { hackathon_id: " ".to_string() });
        handle_room_message(&hub, &conn, &join).await;

        let Outbound::Text(text) = rx.try_recv().unwrap() else {
            panic!("expected an error event");
        };
        let event: ServerEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(event, ServerEvent::error("join:hackathon requires a non-empty id"));
        assert_eq!(hub.stats().await.rooms, 1);
    }
}
