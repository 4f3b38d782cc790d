pub mod diagnostics;
pub mod events;
pub mod health;
pub mod presence;

pub use diagnostics::*;
pub use events::*;
pub use health::*;
pub use presence::*;
