use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// A broadcast channel keyed by `kind:id`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoomKey {
    Hackathon(String),
    Team(String),
    /// Private room of a user; every connection of the user is in it.
    User(String),
}

impl RoomKey {
    pub fn hackathon(id: impl Into<String>) -> Self {
        RoomKey::Hackathon(id.into())
    }

    pub fn team(id: impl Into<String>) -> Self {
        RoomKey::Team(id.into())
    }

    pub fn user(id: impl Into<String>) -> Self {
        RoomKey::User(id.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RoomKey::Hackathon(_) => "hackathon",
            RoomKey::Team(_) => "team",
            RoomKey::User(_) => "user",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RoomKey::Hackathon(id) | RoomKey::Team(id) | RoomKey::User(id) => id,
        }
    }

    /// Rooms a client may join or leave on its own.
    pub fn is_client_joinable(&self) -> bool {
        !matches!(self, RoomKey::User(_))
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

impl FromStr for RoomKey {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| GatewayError::InvalidRoom(s.to_string()))?;
        if id.is_empty() {
            return Err(GatewayError::InvalidRoom(s.to_string()));
        }
        match kind {
            "hackathon" => Ok(RoomKey::hackathon(id)),
            "team" => Ok(RoomKey::team(id)),
            "user" => Ok(RoomKey::user(id)),
            _ => Err(GatewayError::InvalidRoom(s.to_string())),
        }
    }
}

impl TryFrom<String> for RoomKey {
    type Error = GatewayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomKey> for String {
    fn from(room: RoomKey) -> Self {
        room.to_string()
    }
}
