pub mod diagnostics;
pub mod error;
pub mod health;
pub mod messages;
pub mod presence;
pub mod publish;

pub use diagnostics::*;
pub use error::*;
pub use health::*;
pub use messages::{ClientEvent, RoomOp, ServerEvent};
pub use presence::*;
pub use publish::*;
