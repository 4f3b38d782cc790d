use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsersResponse {
    pub user_ids: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct BroadcastResponse {
    pub delivered: usize,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct DisconnectResponse {
    pub closed: usize,
}
