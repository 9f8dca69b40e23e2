use std::time::Duration;

use thiserror::Error;

use crate::{ChainId, InteractionType, RootInteractionId};

/// Why `InteractionManager::start_chain` refused to start a chain. A refused
/// start has no side effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("Root interaction {root} is not registered")]
    UnknownRoot { root: RootInteractionId },

    #[error("Cooldown {cooldown} is active for another {remaining:?}")]
    CooldownActive { cooldown: String, remaining: Duration },

    /// An active chain's rules (or the new root's own) forbid the start
    #[error("{interaction_type:?} interaction blocked by active chain {blocked_by}")]
    Blocked {
        interaction_type: InteractionType,
        blocked_by: ChainId,
    },

    /// A peer asked to start a chain under an id this manager already used
    #[error("Chain id {id} is already in use")]
    ChainIdInUse { id: ChainId },
}
