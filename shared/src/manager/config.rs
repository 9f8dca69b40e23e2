//! # `ManagerConfig` – tuning knobs of one interaction manager
//!
//! Cloned into every manager at construction; nothing mutates it afterwards.

/// Contains Config properties which will be used by an `InteractionManager`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Upper bound on inbound sync records applied per tick. Anything past
    /// it stays queued for the next tick, oldest first.
    pub max_inbound_per_tick: usize,
    /// How many retired root chain ids are remembered so that late records
    /// addressed to them are dropped instead of recreating the chain.
    pub retired_chain_memory: usize,
    /// Deepest fork nesting allowed below a root chain. Spawning past it
    /// fails the spawning chain; a peer record past it is rejected.
    pub max_fork_depth: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_inbound_per_tick: 256,
            retired_chain_memory: 64,
            max_fork_depth: 8,
        }
    }
}
