use std::str::FromStr;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

/// Platform roles carried in access tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Organizer,
    Judge,
    Mentor,
    Participant,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" | "SUPER_ADMIN" => Ok(Role::Admin),
            "ORGANIZER" => Ok(Role::Organizer),
            "JUDGE" => Ok(Role::Judge),
            "MENTOR" => Ok(Role::Mentor),
            "PARTICIPANT" => Ok(Role::Participant),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    User,
    /// Backend service calling the control API.
    Service,
}

/// Verified bearer of a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// User id, or service name for service tokens.
    pub subject: String,
    pub kind: TokenKind,
    pub roles: Vec<Role>,
    /// Token expiry, seconds since the epoch.
    pub expires_at: i64,
}

impl Identity {
    pub fn is_user(&self) -> bool {
        self.kind == TokenKind::User
    }

    pub fn is_service(&self) -> bool {
        self.kind == TokenKind::Service
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now().timestamp()
    }

    /// Principal string used in logs: `u/{id}` or `s/{name}`.
    pub fn principal(&self) -> String {
        match self.kind {
            TokenKind::User => format!("u/{}", self.subject),
            TokenKind::Service => format!("s/{}", self.subject),
        }
    }
}
