use std::default::Default;

use tandem_shared::ManagerConfig;

/// Contains Config properties which will be used by the Server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Cloned into the interaction manager of every spawned entity
    pub manager: ManagerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
        }
    }
}
