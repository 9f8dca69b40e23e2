//! # Tandem Server
//! Runs the authoritative interaction manager of every spawned entity,
//! routes decoded client records to them and collects the records owed back.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use tandem_shared::{
        ChainCompletion, ChainId, ChainOutcome, ChainPath, EntityRef, InteractionContext,
        InteractionType, ManagerConfig, RootInteraction, RootInteractionId, RootInteractionMap,
        RootInteractionResolver, StartRequest, SyncInteractionChain, SyncReason, WorldCommand,
    };
}

mod error;
mod events;
mod server;

pub use error::ServerError;
pub use events::InteractionEvents;
pub use server::{InteractionServer, ServerConfig};
