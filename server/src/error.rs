use thiserror::Error;

use tandem_shared::{EntityRef, StartError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// No manager is registered for the entity
    #[error("Entity {entity} has no interaction manager")]
    EntityNotFound { entity: EntityRef },

    #[error("Entity {entity} is already spawned")]
    EntityAlreadySpawned { entity: EntityRef },

    #[error("Entity {entity} could not start a chain: {source}")]
    Start {
        entity: EntityRef,
        source: StartError,
    },
}
