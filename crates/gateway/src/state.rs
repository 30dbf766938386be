use std::collections::HashMap;
use std::sync::Arc;

use inv_backends::{BackendFactory, DiscoveryCache};
use inv_domain::config::Config;
use inv_domain::model::ScenarioManifest;
use inv_sessions::SessionRegistry;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub manifests: Arc<HashMap<String, ScenarioManifest>>,
    pub backend_factory: Arc<BackendFactory>,
    pub discovery: Arc<DiscoveryCache>,
}
