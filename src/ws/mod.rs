pub mod connctx;
pub mod hub;
pub mod presence;
pub mod room;

pub use connctx::{ConnCtx, ConnId, Outbound};
pub use hub::{Hub, HubStats};
pub use presence::PresenceSet;
pub use room::RoomKey;
