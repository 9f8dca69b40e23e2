//! ## `InteractionEntry` – one position of a chain, three views of it
//!
//! | slot | written by | read by |
//! |------|-----------|---------|
//! | server | authoritative execution (server) or authoritative records (client) | game logic when not simulating |
//! | simulation | predicted execution (client) | game logic while `use_simulation_state` |
//! | client | client reports arriving at the server | desync comparison only |
//!
//! Inbound records carry a wrap-safe sync position; anything at or behind
//! the last applied position is dropped before it can touch the entry, so
//! replays and duplicates are no-ops.
//!
//! Initial and Correction records carry the full active view. Update records
//! carry the marker plus only the meta keys written since the last send.

use crate::{
    interaction::one_shot::OneShot,
    wrapping_number::{SyncCounter, SyncCursor},
    InteractionSyncData, MetaDelta, MetaStore, SyncIndex,
};

/// What happened to an inbound entry snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncApply {
    Applied,
    /// Applied, and it disagrees with the local view. The desync flag is raised.
    Desync,
    /// At or behind the last applied position; nothing changed.
    Stale,
}

#[derive(Debug)]
pub struct InteractionEntry {
    index: u32,
    server_state: Option<InteractionSyncData>,
    client_state: Option<InteractionSyncData>,
    simulation_state: Option<InteractionSyncData>,
    use_simulation_state: bool,
    // a client report accepted before any local baseline existed
    client_unverified: bool,
    desync: OneShot,
    send_initial: OneShot,
    inbound: SyncCursor,
    outbound: SyncCounter,
    last_sent: Option<InteractionSyncData>,
    // meta written to the active view since `last_sent`
    unsent_meta: MetaDelta,
    meta: MetaStore,
}

impl InteractionEntry {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            server_state: None,
            client_state: None,
            simulation_state: None,
            use_simulation_state: false,
            client_unverified: false,
            desync: OneShot::new(),
            send_initial: OneShot::new(),
            inbound: SyncCursor::new(),
            outbound: SyncCounter::new(),
            last_sent: None,
            unsent_meta: MetaDelta::new(),
            meta: MetaStore::new(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// The active view: simulation while predicting, server otherwise.
    pub fn get_state(&self) -> Option<&InteractionSyncData> {
        if self.use_simulation_state {
            self.simulation_state.as_ref()
        } else {
            self.server_state.as_ref()
        }
    }

    pub fn server_state(&self) -> Option<&InteractionSyncData> {
        self.server_state.as_ref()
    }

    pub fn client_state(&self) -> Option<&InteractionSyncData> {
        self.client_state.as_ref()
    }

    pub fn simulation_state(&self) -> Option<&InteractionSyncData> {
        self.simulation_state.as_ref()
    }

    pub fn uses_simulation_state(&self) -> bool {
        self.use_simulation_state
    }

    pub fn set_use_simulation_state(&mut self, use_simulation_state: bool) {
        self.use_simulation_state = use_simulation_state;
    }

    pub fn meta(&self) -> &MetaStore {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut MetaStore {
        &mut self.meta
    }

    pub(crate) fn take_meta(&mut self) -> MetaStore {
        std::mem::take(&mut self.meta)
    }

    pub(crate) fn restore_meta(&mut self, meta: MetaStore) {
        self.meta = meta;
    }

    /// Authoritative local write (server execution).
    pub fn set_server_state(&mut self, data: InteractionSyncData) {
        if !self.use_simulation_state {
            self.unsent_meta.merge(data.meta.clone());
        }
        match self.server_state.as_mut() {
            Some(existing) => existing.absorb(data),
            None => {
                self.server_state = Some(data);
                if !self.use_simulation_state {
                    self.send_initial.raise();
                }
            }
        }
        self.verify_pending_client_report();
    }

    /// Predicted local write (client execution).
    pub fn set_simulation_state(&mut self, data: InteractionSyncData) {
        self.unsent_meta.merge(data.meta.clone());
        match self.simulation_state.as_mut() {
            Some(existing) => existing.absorb(data),
            None => {
                self.simulation_state = Some(data);
                self.use_simulation_state = true;
                self.send_initial.raise();
            }
        }
    }

    /// Records a client report, validating it against the active view.
    pub fn set_client_state(&mut self, position: SyncIndex, data: InteractionSyncData) -> SyncApply {
        if !self.inbound.advance(position) {
            return SyncApply::Stale;
        }

        let baseline = self
            .get_state()
            .map(|active| (data.diverges_from(active), active.state.is_terminal()));

        match baseline {
            Some((true, _)) => {
                self.client_unverified = false;
                self.desync.raise();
                SyncApply::Desync
            }
            Some((false, baseline_terminal)) => {
                self.client_unverified = !baseline_terminal;
                self.store_client_report(data);
                SyncApply::Applied
            }
            None => {
                self.client_unverified = true;
                self.store_client_report(data);
                SyncApply::Applied
            }
        }
    }

    fn store_client_report(&mut self, data: InteractionSyncData) {
        match self.client_state.as_mut() {
            Some(existing) => existing.absorb(data),
            None => self.client_state = Some(data),
        }
    }

    /// Records an authoritative snapshot received from the server.
    pub fn apply_authoritative(&mut self, position: SyncIndex, data: InteractionSyncData) -> SyncApply {
        if !self.inbound.advance(position) {
            return SyncApply::Stale;
        }

        let diverged = match self.simulation_state.as_ref() {
            Some(simulated) if self.use_simulation_state => data.diverges_from(simulated),
            _ => false,
        };

        match self.server_state.as_mut() {
            Some(existing) => existing.absorb(data),
            None => self.server_state = Some(data),
        }

        if diverged {
            self.use_simulation_state = false;
            self.desync.raise();
            SyncApply::Desync
        } else {
            SyncApply::Applied
        }
    }

    pub fn is_sync_position_stale(&self, position: SyncIndex) -> bool {
        self.inbound.is_stale(position)
    }

    pub fn last_applied_position(&self) -> Option<SyncIndex> {
        self.inbound.last_applied()
    }

    pub fn flag_desync(&mut self) {
        self.desync.raise();
    }

    pub fn is_desynced(&self) -> bool {
        self.desync.is_raised()
    }

    pub fn consume_desync_flag(&mut self) -> bool {
        self.desync.take()
    }

    pub fn consume_send_initial(&mut self) -> bool {
        self.send_initial.take()
    }

    pub(crate) fn next_outbound_position(&mut self) -> SyncIndex {
        self.outbound.next()
    }

    /// Snapshot of the active view for transmission, remembered as sent.
    pub(crate) fn snapshot_for_send(&mut self) -> Option<InteractionSyncData> {
        let data = self.get_state()?.clone();
        self.last_sent = Some(data.clone());
        self.unsent_meta = MetaDelta::new();
        Some(data)
    }

    /// The active view's marker and the meta written since the last send,
    /// if either changed.
    pub(crate) fn take_pending_update(&mut self) -> Option<InteractionSyncData> {
        let active = self.get_state()?.clone();
        let last_sent = self.last_sent.as_ref()?;
        let marker_changed = active.state != last_sent.state
            || active.root_interaction != last_sent.root_interaction
            || active.operation_counter != last_sent.operation_counter;
        if !marker_changed && self.unsent_meta.is_empty() {
            return None;
        }

        let update = InteractionSyncData::new(
            active.state,
            active.root_interaction.clone(),
            active.operation_counter,
        )
        .with_meta(std::mem::take(&mut self.unsent_meta));
        self.last_sent = Some(active);
        Some(update)
    }

    fn verify_pending_client_report(&mut self) {
        if !self.client_unverified {
            return;
        }
        let (Some(client), Some(server)) = (self.client_state.as_ref(), self.server_state.as_ref()) else {
            return;
        };
        if client.diverges_from(server) {
            self.client_unverified = false;
            self.desync.raise();
        } else if server.state.is_terminal() {
            self.client_unverified = false;
        }
    }
}
