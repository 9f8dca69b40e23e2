//! # Tandem Shared
//! Interaction chains, their synchronization records and the per-entity
//! interaction manager, shared between tandem servers and clients.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

mod interaction;
mod manager;
pub mod meta;
mod types;
mod wrapping_number;

cfg_if! {
    if #[cfg(feature = "bevy_support")] {
        pub mod bevy_integration;
    }
}

pub use interaction::{
    chain::{
        ChainCompletion, ChainEnv, ChainEvents, ChainOutcome, ChainState, CompletionCallback,
        InteractionChain,
    },
    chain_sync_storage::{ChainSyncStorage, SyncReport},
    context::{CancelScope, ContextId, HeldItem, InteractionContext, WorldCommand},
    entry::{InteractionEntry, SyncApply},
    error::{ChainError, ContextError, InvalidForkError, OperationError, SyncError},
    forked_chain_id::{ChainPath, ForkedChainId},
    one_shot::OneShot,
    root_interaction::{
        from_fn, Operation, RootInteraction, RootInteractionId, RootInteractionMap,
        RootInteractionResolver, Step, StepOutcome,
    },
    sync_data::{InteractionState, InteractionSyncData},
    sync_record::{EntrySync, SyncInteractionChain, SyncReason},
};
pub use manager::{
    config::ManagerConfig,
    cooldowns::{CooldownSpec, Cooldowns},
    error::StartError,
    manager::{InteractionManager, StartRequest},
    rules::{DefaultRules, InteractionRules, RuleDecision, RulePolicy},
};
pub use meta::{MetaDelta, MetaKey, MetaStore, MetaValue};
pub use types::{ChainId, EntityRef, HostType, InteractionType, SyncIndex};
pub use wrapping_number::{sequence_greater_than, sequence_less_than, SyncCounter, SyncCursor};
