pub mod auth_service;
pub mod event_service;

pub use auth_service::TokenVerifier;
pub use event_service::EventPublisher;
