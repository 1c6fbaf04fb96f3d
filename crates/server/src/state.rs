use std::sync::Arc;
use walkin_core::{Authenticator, Config, QueueService, SanitizedConfig};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    queue: QueueService,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        queue: QueueService,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            authenticator,
            queue,
            ws_broadcaster,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn queue(&self) -> &QueueService {
        &self.queue
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }
}
