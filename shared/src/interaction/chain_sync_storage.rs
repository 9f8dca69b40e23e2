use crate::{
    ChainEnv, ChainEvents, ChainState, ForkedChainId, InteractionEntry, InteractionSyncData,
    SyncApply, SyncError, SyncIndex, SyncInteractionChain,
};

/// Counts of what one inbound record did to the addressed chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub applied: usize,
    pub desynced: usize,
    pub stale: usize,
}

/// The storage side of a chain as seen by the network path.
pub trait ChainSyncStorage {
    fn chain_state(&self) -> ChainState;

    fn entry(&self, index: u32) -> Option<&InteractionEntry>;

    /// Server side: records what the client reported for entry `index`.
    fn put_client_state(
        &mut self,
        index: u32,
        position: SyncIndex,
        data: InteractionSyncData,
    ) -> SyncApply;

    /// Client side: records the server's snapshot for entry `index`.
    fn put_authoritative_state(
        &mut self,
        index: u32,
        position: SyncIndex,
        data: InteractionSyncData,
    ) -> SyncApply;

    fn is_sync_position_stale(&self, index: u32, position: SyncIndex) -> bool;

    /// Applies `record` to the node `forks` addresses below this chain,
    /// creating the final node if this side has not observed it yet.
    fn sync_fork(
        &mut self,
        forks: &[ForkedChainId],
        record: &SyncInteractionChain,
        env: &ChainEnv<'_>,
        events: &mut ChainEvents,
    ) -> Result<SyncReport, SyncError>;
}
