use std::sync::Arc;

use crate::config::Config;
use crate::services::{EventPublisher, TokenVerifier};
use crate::ws::Hub;

/// Shared state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub hub: Arc<Hub>,
    pub verifier: TokenVerifier,
    pub publisher: EventPublisher,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let hub = Arc::new(Hub::new());
        Self {
            verifier: TokenVerifier::from_config(&config),
            publisher: EventPublisher::new(hub.clone()),
            hub,
            config,
        }
    }
}
