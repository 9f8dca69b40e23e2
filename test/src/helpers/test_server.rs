use std::sync::Arc;

use tandem_server::{InteractionServer, ServerConfig};
use tandem_shared::{
    EntityRef, InteractionContext, InteractionManager, InteractionType, RootInteractionResolver,
};

/// Test harness around an `InteractionServer` with default config.
pub struct TestServer {
    server: InteractionServer,
}

impl TestServer {
    pub fn new(resolver: Arc<dyn RootInteractionResolver>) -> Self {
        Self {
            server: InteractionServer::new(ServerConfig::default(), resolver),
        }
    }

    /// Spawns `entities`, panicking on duplicates.
    pub fn with_entities(mut self, entities: &[EntityRef]) -> Self {
        for entity in entities {
            self.server
                .spawn_entity(*entity)
                .expect("test entities are unique");
        }
        self
    }

    pub fn server(&self) -> &InteractionServer {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut InteractionServer {
        &mut self.server
    }

    pub fn manager(&self, entity: EntityRef) -> &InteractionManager {
        self.server.manager(&entity).expect("entity is spawned")
    }

    pub fn manager_mut(&mut self, entity: EntityRef) -> &mut InteractionManager {
        self.server.manager_mut(&entity).expect("entity is spawned")
    }

    pub fn start(&mut self, entity: EntityRef, interaction_type: InteractionType, root: &str) -> bool {
        self.server
            .try_start_chain(entity, interaction_type, InteractionContext::new(entity), root)
            .expect("entity is spawned")
    }

    pub fn tick(&mut self, dt: f32) {
        self.server.tick(dt);
    }
}
