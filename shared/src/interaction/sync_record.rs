use crate::{
    ChainId, ChainPath, ForkedChainId, InteractionSyncData, InteractionType, RootInteractionId,
    SyncIndex,
};

/// Why a record was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncReason {
    /// First snapshot of newly created entries.
    Initial,
    /// Entries whose snapshot changed since it was last sent.
    Update,
    /// Authoritative override after a detected desync.
    Correction,
    /// The addressed chain and its subtree were torn down.
    Cancellation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntrySync {
    pub index: u32,
    pub position: SyncIndex,
    pub data: InteractionSyncData,
}

/// One decoded synchronization record, addressed to a node of a fork tree.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncInteractionChain {
    pub chain_id: ChainId,
    pub fork_path: Vec<ForkedChainId>,
    pub interaction_type: InteractionType,
    /// Root the addressed chain was started with; lets the receiver create
    /// the chain if it has not observed it yet.
    pub root_interaction: RootInteractionId,
    pub reason: SyncReason,
    pub entries: Vec<EntrySync>,
}

impl SyncInteractionChain {
    pub fn new(
        path: &ChainPath,
        interaction_type: InteractionType,
        root_interaction: RootInteractionId,
        reason: SyncReason,
    ) -> Self {
        Self {
            chain_id: path.chain_id(),
            fork_path: path.forks().to_vec(),
            interaction_type,
            root_interaction,
            reason,
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, index: u32, position: SyncIndex, data: InteractionSyncData) -> Self {
        self.entries.push(EntrySync {
            index,
            position,
            data,
        });
        self
    }

    pub fn path(&self) -> ChainPath {
        ChainPath::from_parts(self.chain_id, self.fork_path.clone())
    }
}
