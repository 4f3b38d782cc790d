use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::messages::ServerEvent;

/// Domain event to relay into a room
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct PublishRequest {
    /// `hackathon:{id}`, `team:{id}` or `user:{id}`
    pub room: String,
    /// `{"event": ..., "data": ...}` envelope, delivered verbatim
    #[schema(value_type = Object)]
    pub message: ServerEvent,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct PublishResponse {
    pub delivered: usize,
}
