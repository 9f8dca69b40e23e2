use std::{collections::HashMap, mem, sync::Arc};

use log::{info, warn};

use tandem_shared::{
    ChainId, EntityRef, HostType, InteractionContext, InteractionManager, InteractionType,
    RootInteractionId, RootInteractionResolver, StartRequest, SyncInteractionChain,
};

use crate::{InteractionEvents, ServerConfig, ServerError};

/// Owns one authoritative interaction manager per spawned entity and moves
/// sync records between them and the transport.
pub struct InteractionServer {
    config: ServerConfig,
    resolver: Arc<dyn RootInteractionResolver>,
    managers: HashMap<EntityRef, InteractionManager>,
    // managers tick in spawn order
    spawn_order: Vec<EntityRef>,
    outgoing: Vec<(EntityRef, SyncInteractionChain)>,
    events: InteractionEvents,
}

impl InteractionServer {
    /// Create a new Server
    pub fn new(config: ServerConfig, resolver: Arc<dyn RootInteractionResolver>) -> Self {
        Self {
            config,
            resolver,
            managers: HashMap::new(),
            spawn_order: Vec::new(),
            outgoing: Vec::new(),
            events: InteractionEvents::new(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // Entities

    pub fn spawn_entity(&mut self, entity: EntityRef) -> Result<(), ServerError> {
        if self.managers.contains_key(&entity) {
            return Err(ServerError::EntityAlreadySpawned { entity });
        }
        let manager = InteractionManager::new(
            entity,
            HostType::Server,
            self.resolver.clone(),
            self.config.manager.clone(),
        );
        self.managers.insert(entity, manager);
        self.spawn_order.push(entity);
        info!("Spawned interaction manager for {}", entity);
        Ok(())
    }

    /// Removes the entity's manager, cancelling its chains. The flushed
    /// Cancellation records are returned rather than queued.
    pub fn despawn_entity(
        &mut self,
        entity: EntityRef,
    ) -> Result<Vec<SyncInteractionChain>, ServerError> {
        let Some(mut manager) = self.managers.remove(&entity) else {
            return Err(ServerError::EntityNotFound { entity });
        };
        self.spawn_order.retain(|spawned| *spawned != entity);

        let flushed = manager.clear();
        self.events
            .push_completions(entity, manager.take_completions());
        self.events.push_world_commands(manager.take_world_commands());
        info!(
            "Despawned {}; flushed {} records",
            entity,
            flushed.len()
        );
        Ok(flushed)
    }

    pub fn has_entity(&self, entity: &EntityRef) -> bool {
        self.managers.contains_key(entity)
    }

    /// Spawned entities in tick order.
    pub fn entities(&self) -> &[EntityRef] {
        &self.spawn_order
    }

    pub fn manager(&self, entity: &EntityRef) -> Option<&InteractionManager> {
        self.managers.get(entity)
    }

    pub fn manager_mut(&mut self, entity: &EntityRef) -> Option<&mut InteractionManager> {
        self.managers.get_mut(entity)
    }

    // Chains

    /// Starts a server-owned chain. `Ok(false)` means the manager refused it.
    pub fn try_start_chain(
        &mut self,
        entity: EntityRef,
        interaction_type: InteractionType,
        context: InteractionContext,
        root: impl Into<RootInteractionId>,
    ) -> Result<bool, ServerError> {
        let manager = self.manager_for(entity)?;
        Ok(manager.try_start_chain(interaction_type, context, root))
    }

    pub fn start_chain(
        &mut self,
        entity: EntityRef,
        request: StartRequest,
    ) -> Result<ChainId, ServerError> {
        let manager = self.manager_for(entity)?;
        manager
            .start_chain(request)
            .map_err(|source| ServerError::Start { entity, source })
    }

    pub fn cancel_chains(&mut self, entity: EntityRef, chain_id: ChainId) -> Result<bool, ServerError> {
        let manager = self.manager_for(entity)?;
        Ok(manager.cancel_chains(chain_id))
    }

    /// Queues a decoded client record for the entity's next tick.
    pub fn receive_record(
        &mut self,
        entity: EntityRef,
        record: SyncInteractionChain,
    ) -> Result<(), ServerError> {
        match self.managers.get_mut(&entity) {
            Some(manager) => {
                manager.receive_record(record);
                Ok(())
            }
            None => {
                warn!(
                    "Dropped {:?} record for unknown entity {}",
                    record.reason, entity
                );
                Err(ServerError::EntityNotFound { entity })
            }
        }
    }

    /// Ticks every manager once, in spawn order.
    pub fn tick(&mut self, dt: f32) {
        for entity in self.spawn_order.iter() {
            let Some(manager) = self.managers.get_mut(entity) else {
                continue;
            };
            manager.tick(dt);

            self.outgoing.extend(
                manager
                    .take_outgoing_records()
                    .into_iter()
                    .map(|record| (*entity, record)),
            );
            self.events
                .push_completions(*entity, manager.take_completions());
            self.events.push_world_commands(manager.take_world_commands());
        }
    }

    /// Records to hand to the transport, addressed by entity.
    pub fn take_outgoing(&mut self) -> Vec<(EntityRef, SyncInteractionChain)> {
        mem::take(&mut self.outgoing)
    }

    pub fn take_events(&mut self) -> InteractionEvents {
        mem::replace(&mut self.events, InteractionEvents::new())
    }

    fn manager_for(&mut self, entity: EntityRef) -> Result<&mut InteractionManager, ServerError> {
        self.managers
            .get_mut(&entity)
            .ok_or(ServerError::EntityNotFound { entity })
    }
}
