use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::info;

use crate::error::GatewayError;
use crate::models::messages::{
    InvitationNew, LeaderboardUpdate, NotificationNew, SubmissionScored, TeamMemberNew, TeamMemberRemoved,
    TeamUpdate,
};
use crate::models::ServerEvent;
use crate::ws::{Hub, RoomKey};

/// Relays domain events produced by API mutations into rooms.
#[derive(Clone)]
pub struct EventPublisher {
    hub: Arc<Hub>,
}

impl EventPublisher {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }

    /// Relay a domain event to a room. Presence, heartbeat and error frames
    /// belong to the gateway and are refused.
    pub async fn publish(&self, room: &RoomKey, event: &ServerEvent) -> Result<usize, GatewayError> {
        if !event.is_domain_event() {
            return Err(GatewayError::NotPublishable(event.event_name().to_string()));
        }
        let delivered = self.hub.emit_to_room(room, event).await;
        info!("Published {} to {} ({} sockets)", event.event_name(), room, delivered);
        Ok(delivered)
    }

    pub async fn leaderboard_update(&self, hackathon_id: &str, leaderboard: Vec<Value>) -> usize {
        let event = ServerEvent::LeaderboardUpdate(LeaderboardUpdate {
            leaderboard,
            extra: Map::new(),
        });
        self.hub.emit_to_room(&RoomKey::hackathon(hackathon_id), &event).await
    }

    pub async fn submission_new(&self, hackathon_id: &str, submission: Value) -> usize {
        let event = ServerEvent::SubmissionNew(submission);
        self.hub.emit_to_room(&RoomKey::hackathon(hackathon_id), &event).await
    }

    pub async fn submission_scored(&self, hackathon_id: &str, submission: Value) -> usize {
        let event = ServerEvent::SubmissionScored(SubmissionScored {
            submission,
            extra: Map::new(),
        });
        self.hub.emit_to_room(&RoomKey::hackathon(hackathon_id), &event).await
    }

    pub async fn team_member_added(&self, team_id: &str, member: Value) -> usize {
        let event = ServerEvent::TeamMemberNew(TeamMemberNew {
            member,
            extra: Map::new(),
        });
        self.hub.emit_to_room(&RoomKey::team(team_id), &event).await
    }

    pub async fn team_member_removed(&self, team_id: &str, member_id: &str) -> usize {
        let event = ServerEvent::TeamMemberRemoved(TeamMemberRemoved {
            member_id: member_id.to_string(),
            extra: Map::new(),
        });
        self.hub.emit_to_room(&RoomKey::team(team_id), &event).await
    }

    pub async fn team_updated(&self, team_id: &str, members: Option<Vec<Value>>) -> usize {
        let event = ServerEvent::TeamUpdate(TeamUpdate {
            members,
            extra: Map::new(),
        });
        self.hub.emit_to_room(&RoomKey::team(team_id), &event).await
    }

    pub async fn notify_user(&self, user_id: &str, notification: Value) -> usize {
        let event = ServerEvent::NotificationNew(NotificationNew {
            notification,
            extra: Map::new(),
        });
        self.hub.emit_to_user(user_id, &event).await
    }

    pub async fn invite_user(&self, user_id: &str, invitation: Value) -> usize {
        let event = ServerEvent::InvitationNew(InvitationNew {
            invitation,
            extra: Map::new(),
        });
        self.hub.emit_to_user(user_id, &event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::Outbound;
    use serde_json::json;
    use tokio::sync::mpsc;

    async fn connect(hub: &Hub, user: &str) -> (crate::ws::ConnCtx, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = hub.register(user, tx).await;
        while rx.try_recv().is_ok() {}
        (conn, rx)
    }

    fn next_event(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Value {
        match rx.try_recv().unwrap() {
            Outbound::Text(text) => serde_json::from_str(&text).unwrap(),
            Outbound::Close => panic!("unexpected close"),
        }
    }

    #[tokio::test]
    async fn refuses_gateway_events() {
        let publisher = EventPublisher::new(Arc::new(Hub::new()));
        let err = publisher
            .publish(&RoomKey::hackathon("h1"), &ServerEvent::user_online("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotPublishable(name) if name == "user:online"));
    }

    #[tokio::test]
    async fn hackathon_events_reach_hackathon_room() {
        let hub = Arc::new(Hub::new());
        let publisher = EventPublisher::new(hub.clone());
        let (conn, mut rx) = connect(&hub, "alice").await;
        hub.join(conn.id, RoomKey::hackathon("h1")).await;

        assert_eq!(publisher.submission_scored("h1", json!({"id": "s1", "score": 9})).await, 1);
        assert_eq!(
            next_event(&mut rx),
            json!({"event": "submission:scored", "data": {"submission": {"id": "s1", "score": 9}}})
        );

        publisher.leaderboard_update("h1", vec![json!({"teamId": "t1", "rank": 1})]).await;
        assert_eq!(
            next_event(&mut rx),
            json!({"event": "leaderboard:update", "data": {"leaderboard": [{"teamId": "t1", "rank": 1}]}})
        );

        assert_eq!(publisher.submission_new("h2", json!({"id": "s2"})).await, 0);
    }

    #[tokio::test]
    async fn team_and_user_events_use_their_rooms() {
        let hub = Arc::new(Hub::new());
        let publisher = EventPublisher::new(hub.clone());
        let (conn, mut rx) = connect(&hub, "alice").await;
        hub.join(conn.id, RoomKey::team("t1")).await;

        publisher.team_member_removed("t1", "m7").await;
        assert_eq!(
            next_event(&mut rx),
            json!({"event": "team:member:removed", "data": {"memberId": "m7"}})
        );

        publisher.team_updated("t1", None).await;
        assert_eq!(next_event(&mut rx), json!({"event": "team:update", "data": {}}));

        assert_eq!(publisher.invite_user("alice", json!({"id": "i1"})).await, 1);
        assert_eq!(
            next_event(&mut rx),
            json!({"event": "invitation:new", "data": {"invitation": {"id": "i1"}}})
        );
        assert_eq!(publisher.notify_user("bob", json!({"id": "n1"})).await, 0);
    }
}
