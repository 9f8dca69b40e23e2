use thiserror::Error;

use crate::{ChainPath, RootInteractionId};

/// Raised when a step tries to fork with its own context instead of a
/// derived one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot fork chain {chain} with the context that is already running it")]
pub struct InvalidForkError {
    pub chain: String,
}

/// Errors raised at the call site of an `InteractionContext` control operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error(transparent)]
    InvalidFork(#[from] InvalidForkError),

    /// The label is not defined by the root interaction currently running
    #[error("Root interaction {root} has no step labelled {label:?}")]
    UnknownLabel {
        root: RootInteractionId,
        label: String,
    },

    /// `jump`/`fork` called outside of a running step
    #[error("Context is not attached to a running chain")]
    Detached,
}

/// Unrecoverable failure reported by an operation. Fails the owning chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct OperationError {
    message: String,
}

impl OperationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ContextError> for OperationError {
    fn from(error: ContextError) -> Self {
        Self::new(error.to_string())
    }
}

/// Why a chain stopped executing before its steps ran out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Operation failed at entry {entry_index} of chain {path}: {source}")]
    Operation {
        path: ChainPath,
        entry_index: u32,
        source: OperationError,
    },

    /// `execute`, a fork or a realignment referenced a root the resolver does not know
    #[error("Root interaction {root} could not be resolved for chain {path}")]
    UnknownRoot {
        path: ChainPath,
        root: RootInteractionId,
    },

    /// Fork nesting went past `ManagerConfig::max_fork_depth`
    #[error("Fork depth limit {limit} exceeded by chain {path}")]
    ForkDepthExceeded { path: ChainPath, limit: usize },

    /// The authoritative peer reported the entry as failed
    #[error("Authoritative peer failed entry {entry_index} of chain {path}")]
    RemoteFailure { path: ChainPath, entry_index: u32 },

    /// The chain cannot advance past entry `entry_index`
    #[error("Chain {path} has no entry after {entry_index}")]
    EntryOutOfRange { path: ChainPath, entry_index: u32 },
}

/// Errors applying an inbound sync record to a fork tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A missing fork could not be created because its root is unknown
    #[error("Cannot create fork {path}: root interaction {root} is unknown")]
    UnknownRoot {
        path: ChainPath,
        root: RootInteractionId,
    },

    /// The addressed node sits below a chain that already reached a terminal state
    #[error("Cannot sync {path}: chain is no longer active")]
    ChainTerminated { path: ChainPath },

    /// The addressed root chain does not exist on this manager
    #[error("No chain {path} on this manager")]
    ChainNotFound { path: ChainPath },

    /// Lazily creating the fork would exceed the fork depth limit
    #[error("Cannot create fork {path}: depth limit {limit} exceeded")]
    ForkDepthExceeded { path: ChainPath, limit: usize },
}
