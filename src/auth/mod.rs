pub mod guards;
pub mod identity;

pub use identity::{Identity, Role, TokenKind};
