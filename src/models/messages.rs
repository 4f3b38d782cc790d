use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ws::room::RoomKey;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HackathonRef {
    pub hackathon_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamRef {
    pub team_id: String,
}

/// Frames sent by clients on `/ws`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join:hackathon")]
    JoinHackathon(HackathonRef),
    #[serde(rename = "leave:hackathon")]
    LeaveHackathon(HackathonRef),
    #[serde(rename = "join:team")]
    JoinTeam(TeamRef),
    #[serde(rename = "leave:team")]
    LeaveTeam(TeamRef),
    #[serde(rename = "ping")]
    Ping,
}

/// Direction of a room membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomOp {
    Join,
    Leave,
}

impl ClientEvent {
    /// Join frame for a client-joinable room.
    pub fn join(room: &RoomKey) -> Option<Self> {
        match room {
            RoomKey::Hackathon(id) => Some(ClientEvent::JoinHackathon(HackathonRef { hackathon_id: id.clone() })),
            RoomKey::Team(id) => Some(ClientEvent::JoinTeam(TeamRef { team_id: id.clone() })),
            RoomKey::User(_) => None,
        }
    }

    /// Leave frame for a client-joinable room.
    pub fn leave(room: &RoomKey) -> Option<Self> {
        match room {
            RoomKey::Hackathon(id) => Some(ClientEvent::LeaveHackathon(HackathonRef { hackathon_id: id.clone() })),
            RoomKey::Team(id) => Some(ClientEvent::LeaveTeam(TeamRef { team_id: id.clone() })),
            RoomKey::User(_) => None,
        }
    }

    /// The membership change this frame asks for, if any.
    pub fn room_op(&self) -> Option<(RoomOp, RoomKey)> {
        match self {
            ClientEvent::JoinHackathon(r) => Some((RoomOp::Join, RoomKey::hackathon(r.hackathon_id.clone()))),
            ClientEvent::LeaveHackathon(r) => Some((RoomOp::Leave, RoomKey::hackathon(r.hackathon_id.clone()))),
            ClientEvent::JoinTeam(r) => Some((RoomOp::Join, RoomKey::team(r.team_id.clone()))),
            ClientEvent::LeaveTeam(r) => Some((RoomOp::Leave, RoomKey::team(r.team_id.clone()))),
            ClientEvent::Ping => None,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ClientEvent::JoinHackathon(_) => "join:hackathon",
            ClientEvent::LeaveHackathon(_) => "leave:hackathon",
            ClientEvent::JoinTeam(_) => "join:team",
            ClientEvent::LeaveTeam(_) => "leave:team",
            ClientEvent::Ping => "ping",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    pub user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsers {
    pub user_ids: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub message: String,
}

// Domain payloads keep unknown fields so relays stay verbatim.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LeaderboardUpdate {
    pub leaderboard: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SubmissionScored {
    pub submission: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeamMemberNew {
    pub member: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberRemoved {
    pub member_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TeamUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NotificationNew {
    pub notification: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InvitationNew {
    pub invitation: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Frames sent by the gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "user:online")]
    UserOnline(UserPresence),
    #[serde(rename = "user:offline")]
    UserOffline(UserPresence),
    #[serde(rename = "users:online")]
    UsersOnline(OnlineUsers),
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error(ErrorMessage),
    #[serde(rename = "leaderboard:update")]
    LeaderboardUpdate(LeaderboardUpdate),
    #[serde(rename = "submission:scored")]
    SubmissionScored(SubmissionScored),
    #[serde(rename = "submission:new")]
    SubmissionNew(Value),
    #[serde(rename = "team:member:new")]
    TeamMemberNew(TeamMemberNew),
    #[serde(rename = "team:member:removed")]
    TeamMemberRemoved(TeamMemberRemoved),
    #[serde(rename = "team:update")]
    TeamUpdate(TeamUpdate),
    #[serde(rename = "notification:new")]
    NotificationNew(NotificationNew),
    #[serde(rename = "invitation:new")]
    InvitationNew(InvitationNew),
}

impl ServerEvent {
    pub fn user_online(user_id: impl Into<String>) -> Self {
        ServerEvent::UserOnline(UserPresence { user_id: user_id.into() })
    }

    pub fn user_offline(user_id: impl Into<String>) -> Self {
        ServerEvent::UserOffline(UserPresence { user_id: user_id.into() })
    }

    pub fn users_online(user_ids: Vec<String>) -> Self {
        ServerEvent::UsersOnline(OnlineUsers { user_ids })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorMessage { message: message.into() })
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::UserOnline(_) => "user:online",
            ServerEvent::UserOffline(_) => "user:offline",
            ServerEvent::UsersOnline(_) => "users:online",
            ServerEvent::Pong => "pong",
            ServerEvent::Error(_) => "error",
            ServerEvent::LeaderboardUpdate(_) => "leaderboard:update",
            ServerEvent::SubmissionScored(_) => "submission:scored",
            ServerEvent::SubmissionNew(_) => "submission:new",
            ServerEvent::TeamMemberNew(_) => "team:member:new",
            ServerEvent::TeamMemberRemoved(_) => "team:member:removed",
            ServerEvent::TeamUpdate(_) => "team:update",
            ServerEvent::NotificationNew(_) => "notification:new",
            ServerEvent::InvitationNew(_) => "invitation:new",
        }
    }

    /// Events produced by the API server's mutations, as opposed to
    /// gateway bookkeeping (presence, heartbeat, errors).
    pub fn is_domain_event(&self) -> bool {
        !matches!(
            self,
            ServerEvent::UserOnline(_)
                | ServerEvent::UserOffline(_)
                | ServerEvent::UsersOnline(_)
                | ServerEvent::Pong
                | ServerEvent::Error(_)
        )
    }
}
