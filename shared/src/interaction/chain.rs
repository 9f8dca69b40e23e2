//! # Interaction chains
//!
//! An [`InteractionChain`] walks the steps of a root interaction, one step per
//! tick, writing one [`InteractionEntry`] per step it executes. Steps may
//! reshape the walk through the context:
//!
//! * `execute` pushes another root onto the call stack; when that root runs
//!   out of steps it is popped and the caller resumes.
//! * `jump` moves the pointer inside the current root.
//! * `fork` spawns a child chain that runs in parallel and keeps its parent
//!   from finishing until it is terminal itself.
//!
//! Controls a step queues are applied in the order they were queued, after a
//! `Complete` outcome has advanced the pointer.
//!
//! A chain is identified by its [`ChainPath`]. Forks are stored by value in
//! their parent, so the tree is owned top-down and a path is the only way to
//! address a node from the outside.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use log::{debug, info, warn};

use crate::{
    interaction::context::{ChainControl, ForkRequest},
    CancelScope, ChainError, ChainPath, ChainSyncStorage, EntrySync, ForkedChainId, HostType,
    InteractionContext, InteractionEntry, InteractionState, InteractionSyncData,
    InteractionType, RootInteraction, RootInteractionId, RootInteractionResolver, StepOutcome,
    SyncApply, SyncError, SyncIndex, SyncInteractionChain, SyncReason, SyncReport, WorldCommand,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChainState {
    Active,
    Finished,
    Failed,
    Cancelled,
}

impl ChainState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChainState::Active)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainOutcome {
    Finished,
    Failed(ChainError),
    Cancelled,
}

/// Delivered once per chain when it reaches a terminal state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainCompletion {
    pub path: ChainPath,
    pub interaction_type: InteractionType,
    pub root_interaction: RootInteractionId,
    pub outcome: ChainOutcome,
}

pub type CompletionCallback = Box<dyn FnOnce(&ChainCompletion) + Send + Sync>;

/// Read-only collaborators a chain needs while ticking or syncing.
#[derive(Clone, Copy)]
pub struct ChainEnv<'a> {
    pub host_type: HostType,
    pub resolver: &'a dyn RootInteractionResolver,
    pub max_fork_depth: usize,
}

/// Side effects collected while ticking or syncing a fork tree.
#[derive(Debug, Default)]
pub struct ChainEvents {
    pub(crate) completions: Vec<ChainCompletion>,
    // cancellations decided on this side, to be announced to the peer
    pub(crate) cancelled: Vec<ChainCompletion>,
    pub(crate) commands: Vec<WorldCommand>,
    pub(crate) root_cancel: Option<ChainPath>,
}

impl ChainEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completions(&self) -> &[ChainCompletion] {
        &self.completions
    }

    pub fn cancelled(&self) -> &[ChainCompletion] {
        &self.cancelled
    }

    pub fn commands(&self) -> &[WorldCommand] {
        &self.commands
    }

    /// The first `CancelScope::Root` request of the tick, if any.
    pub fn root_cancel(&self) -> Option<&ChainPath> {
        self.root_cancel.as_ref()
    }
}

#[derive(Clone, Debug)]
struct CallFrame {
    root: Arc<RootInteraction>,
    step: usize,
}

impl CallFrame {
    fn is_exhausted(&self) -> bool {
        self.step >= self.root.step_count()
    }
}

pub struct InteractionChain {
    path: ChainPath,
    interaction_type: InteractionType,
    initial_root: RootInteractionId,
    context: InteractionContext,
    entries: BTreeMap<u32, InteractionEntry>,
    call_stack: Vec<CallFrame>,
    current_entry: u32,
    forks: HashMap<ForkedChainId, InteractionChain>,
    fork_order: Vec<ForkedChainId>,
    next_fork_sequence: u32,
    // created from a peer's record before local execution reached the fork
    remote_created: bool,
    state: ChainState,
    failure: Option<ChainError>,
    on_complete: Option<CompletionCallback>,
}

impl InteractionChain {
    pub fn new(
        path: ChainPath,
        interaction_type: InteractionType,
        context: InteractionContext,
        root: Arc<RootInteraction>,
    ) -> Self {
        Self {
            path,
            interaction_type,
            initial_root: root.id().clone(),
            context,
            entries: BTreeMap::new(),
            call_stack: vec![CallFrame { root, step: 0 }],
            current_entry: 0,
            forks: HashMap::new(),
            fork_order: Vec::new(),
            next_fork_sequence: 0,
            remote_created: false,
            state: ChainState::Active,
            failure: None,
            on_complete: None,
        }
    }

    pub fn with_on_complete(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    pub fn set_on_complete(&mut self, callback: CompletionCallback) {
        self.on_complete = Some(callback);
    }

    pub fn path(&self) -> &ChainPath {
        &self.path
    }

    pub fn interaction_type(&self) -> InteractionType {
        self.interaction_type
    }

    pub fn initial_root(&self) -> &RootInteractionId {
        &self.initial_root
    }

    /// Root interaction on top of the call stack.
    pub fn current_root(&self) -> Option<&RootInteractionId> {
        self.call_stack.last().map(|frame| frame.root.id())
    }

    /// Step pointer inside `current_root`.
    pub fn current_step(&self) -> Option<usize> {
        self.call_stack.last().map(|frame| frame.step)
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn current_entry(&self) -> u32 {
        self.current_entry
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn failure(&self) -> Option<&ChainError> {
        self.failure.as_ref()
    }

    pub fn context(&self) -> &InteractionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut InteractionContext {
        &mut self.context
    }

    pub fn is_remote_created(&self) -> bool {
        self.remote_created
    }

    pub fn entries(&self) -> impl Iterator<Item = &InteractionEntry> {
        self.entries.values()
    }

    pub fn entry_mut(&mut self, index: u32) -> Option<&mut InteractionEntry> {
        self.entries.get_mut(&index)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn fork(&self, id: &ForkedChainId) -> Option<&InteractionChain> {
        self.forks.get(id)
    }

    /// Direct children in creation order.
    pub fn forks(&self) -> impl Iterator<Item = &InteractionChain> {
        self.fork_order.iter().filter_map(|id| self.forks.get(id))
    }

    /// The node `forks` addresses below this chain.
    pub fn find(&self, forks: &[ForkedChainId]) -> Option<&InteractionChain> {
        match forks.split_first() {
            None => Some(self),
            Some((first, rest)) => self.forks.get(first)?.find(rest),
        }
    }

    pub fn find_mut(&mut self, forks: &[ForkedChainId]) -> Option<&mut InteractionChain> {
        match forks.split_first() {
            None => Some(self),
            Some((first, rest)) => self.forks.get_mut(first)?.find_mut(rest),
        }
    }

    /// This chain and every descendant, parents before children.
    pub fn nodes(&self) -> Vec<&InteractionChain> {
        let mut nodes = vec![self];
        for fork in self.forks() {
            nodes.extend(fork.nodes());
        }
        nodes
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    fn steps_exhausted(&self) -> bool {
        self.call_stack.last().map_or(true, CallFrame::is_exhausted)
    }

    fn unwind_exhausted_frames(&mut self) {
        while self.call_stack.len() > 1
            && self.call_stack.last().map_or(false, CallFrame::is_exhausted)
        {
            self.call_stack.pop();
        }
    }

    /// Advances the chain and its forks by one tick.
    pub fn tick(&mut self, dt: f32, env: &ChainEnv<'_>, events: &mut ChainEvents) {
        if self.state.is_terminal() {
            return;
        }

        self.unwind_exhausted_frames();
        if !self.steps_exhausted() {
            self.run_step(dt, env, events);
            if self.state.is_terminal() {
                return;
            }
        }

        for id in self.fork_order.iter() {
            if let Some(fork) = self.forks.get_mut(id) {
                fork.tick(dt, env, events);
            }
        }

        if self.state == ChainState::Active
            && self.steps_exhausted()
            && self.forks.values().all(InteractionChain::is_finished)
        {
            self.state = ChainState::Finished;
            info!("Chain {} finished after {} entries", self.path, self.entries.len());
            self.complete(ChainOutcome::Finished, events);
        }
    }

    fn run_step(&mut self, dt: f32, env: &ChainEnv<'_>, events: &mut ChainEvents) {
        let Some(frame) = self.call_stack.last() else {
            return;
        };
        let root = frame.root.clone();
        let step_index = frame.step;
        let Some(step) = root.step(step_index) else {
            return;
        };

        let entry_index = self.current_entry;
        let entry_meta = self
            .entries
            .entry(entry_index)
            .or_insert_with(|| InteractionEntry::new(entry_index))
            .take_meta();

        self.context
            .attach_chain(env.host_type, self.path.clone(), self.interaction_type);
        self.context
            .enter_step(entry_index, root.clone(), entry_meta, self.next_fork_sequence);
        let result = step.operation().execute(&mut self.context, dt);
        let (entry_meta, next_fork_sequence) = self.context.leave_step();
        self.next_fork_sequence = next_fork_sequence;

        events.commands.extend(self.context.take_commands());
        let fork_requests = self.context.take_fork_requests();
        let controls = self.context.take_controls();

        let state = match &result {
            Ok(outcome) => InteractionState::from(*outcome),
            Err(_) => InteractionState::Failed,
        };
        let data = InteractionSyncData::new(state, root.id().clone(), step_index as u32)
            .with_meta(self.context.meta_mut().take_delta());
        if let Some(entry) = self.entries.get_mut(&entry_index) {
            entry.restore_meta(entry_meta);
            match env.host_type {
                HostType::Server => entry.set_server_state(data),
                HostType::Client => entry.set_simulation_state(data),
            }
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(source) => {
                warn!(
                    "Step {} of {} failed on chain {}: {}",
                    step_index,
                    root.id(),
                    self.path,
                    source
                );
                let error = ChainError::Operation {
                    path: self.path.clone(),
                    entry_index,
                    source,
                };
                self.fail(error, events);
                return;
            }
        };

        for request in fork_requests {
            self.spawn_fork(request, env, events);
            if self.state.is_terminal() {
                return;
            }
        }

        let mut moved = false;
        if outcome == StepOutcome::Complete {
            if let Some(frame) = self.call_stack.last_mut() {
                frame.step += 1;
            }
            moved = true;
        }

        for control in controls {
            match control {
                ChainControl::Jump(target) => {
                    if let Some(frame) = self.call_stack.last_mut() {
                        frame.step = target;
                    }
                    moved = true;
                }
                ChainControl::Execute(root_id) => match env.resolver.resolve(&root_id) {
                    Some(nested) => {
                        self.call_stack.push(CallFrame {
                            root: nested,
                            step: 0,
                        });
                        moved = true;
                    }
                    None => {
                        let error = ChainError::UnknownRoot {
                            path: self.path.clone(),
                            root: root_id,
                        };
                        self.fail(error, events);
                        return;
                    }
                },
                ChainControl::ExitRoot => {
                    self.call_stack.pop();
                    moved = true;
                }
                ChainControl::Cancel(CancelScope::Chain) => {
                    self.cancel_into(events, true);
                    return;
                }
                ChainControl::Cancel(CancelScope::Root) => {
                    if events.root_cancel.is_none() {
                        events.root_cancel = Some(self.path.clone());
                    } else {
                        debug!(
                            "Chain {} requested a root cancel after another one this tick; ignored",
                            self.path
                        );
                    }
                }
            }
        }

        if moved {
            let Some(next_entry) = self.current_entry.checked_add(1) else {
                let error = ChainError::EntryOutOfRange {
                    path: self.path.clone(),
                    entry_index: self.current_entry,
                };
                self.fail(error, events);
                return;
            };
            self.current_entry = next_entry;
        }
        self.unwind_exhausted_frames();
    }

    fn spawn_fork(&mut self, request: ForkRequest, env: &ChainEnv<'_>, events: &mut ChainEvents) {
        let ForkRequest {
            id,
            context,
            root,
            interaction_type,
        } = request;

        if let Some(existing) = self.forks.get_mut(&id) {
            if existing.remote_created {
                existing.remote_created = false;
                debug!("Chain {} claimed fork {} created by the peer", self.path, id);
            } else {
                warn!("Chain {} spawned fork {} twice", self.path, id);
            }
            return;
        }

        let path = self.path.child(id);
        if path.depth() > env.max_fork_depth {
            let error = ChainError::ForkDepthExceeded {
                path,
                limit: env.max_fork_depth,
            };
            self.fail(error, events);
            return;
        }
        let Some(root) = env.resolver.resolve(&root) else {
            let error = ChainError::UnknownRoot { path, root };
            self.fail(error, events);
            return;
        };

        let fork = InteractionChain::new(
            path,
            interaction_type.unwrap_or(self.interaction_type),
            context,
            root,
        );
        self.forks.insert(id, fork);
        self.fork_order.push(id);
    }

    /// Cancels this chain and its subtree. Children are torn down first.
    pub fn cancel(&mut self, events: &mut ChainEvents) {
        self.cancel_into(events, true);
    }

    fn cancel_into(&mut self, events: &mut ChainEvents, local: bool) {
        for id in self.fork_order.iter() {
            if let Some(fork) = self.forks.get_mut(id) {
                fork.cancel_into(events, local);
            }
        }
        if self.state.is_terminal() {
            return;
        }
        self.state = ChainState::Cancelled;
        info!("Chain {} cancelled", self.path);
        let completion = self.complete(ChainOutcome::Cancelled, events);
        if local {
            events.cancelled.push(completion);
        }
    }

    fn fail(&mut self, error: ChainError, events: &mut ChainEvents) {
        for id in self.fork_order.iter() {
            if let Some(fork) = self.forks.get_mut(id) {
                fork.cancel_into(events, true);
            }
        }
        self.state = ChainState::Failed;
        self.failure = Some(error.clone());
        warn!("Chain {} failed: {}", self.path, error);
        self.complete(ChainOutcome::Failed(error), events);
    }

    fn complete(&mut self, outcome: ChainOutcome, events: &mut ChainEvents) -> ChainCompletion {
        let completion = ChainCompletion {
            path: self.path.clone(),
            interaction_type: self.interaction_type,
            root_interaction: self.initial_root.clone(),
            outcome,
        };
        if let Some(callback) = self.on_complete.take() {
            callback(&completion);
        }
        events.completions.push(completion.clone());
        completion
    }

    // Sync

    fn apply_record(
        &mut self,
        record: &SyncInteractionChain,
        env: &ChainEnv<'_>,
        events: &mut ChainEvents,
    ) -> Result<SyncReport, SyncError> {
        if record.reason == SyncReason::Cancellation {
            if !self.state.is_terminal() {
                debug!("Chain {} cancelled by peer", self.path);
                self.cancel_into(events, false);
            }
            return Ok(SyncReport::default());
        }
        if self.state.is_terminal() {
            return Err(SyncError::ChainTerminated {
                path: self.path.clone(),
            });
        }

        let mut report = SyncReport::default();
        for update in record.entries.iter() {
            let result = match env.host_type {
                HostType::Server => {
                    self.put_client_state(update.index, update.position, update.data.clone())
                }
                HostType::Client => self.apply_server_update(update, record.reason, env, events),
            };
            match result {
                SyncApply::Applied => report.applied += 1,
                SyncApply::Desync => report.desynced += 1,
                SyncApply::Stale => {
                    debug!(
                        "Dropped stale position {} for entry {} of chain {}",
                        update.position, update.index, self.path
                    );
                    report.stale += 1;
                }
            }
            if self.state.is_terminal() {
                break;
            }
        }
        Ok(report)
    }

    fn apply_server_update(
        &mut self,
        update: &EntrySync,
        reason: SyncReason,
        env: &ChainEnv<'_>,
        events: &mut ChainEvents,
    ) -> SyncApply {
        let result = self.put_authoritative_state(update.index, update.position, update.data.clone());
        if result == SyncApply::Stale {
            return result;
        }
        self.context.meta_mut().apply_delta(&update.data.meta);

        if update.data.state == InteractionState::Failed {
            let error = ChainError::RemoteFailure {
                path: self.path.clone(),
                entry_index: update.index,
            };
            self.fail(error, events);
        } else if result == SyncApply::Desync || reason == SyncReason::Correction {
            self.realign(update.index, &update.data, env, events);
        }
        result
    }

    /// Moves the execution pointer to where the authoritative snapshot says
    /// entry `index` is. Nested frames above the snapshot's root are dropped;
    /// a root not on the stack is entered as a new frame.
    fn realign(
        &mut self,
        index: u32,
        data: &InteractionSyncData,
        env: &ChainEnv<'_>,
        events: &mut ChainEvents,
    ) {
        let finished = data.state == InteractionState::Finished;
        let step = usize::try_from(data.operation_counter)
            .ok()
            .and_then(|counter| counter.checked_add(usize::from(finished)));
        let (Some(step), Some(next_entry)) = (step, index.checked_add(u32::from(finished))) else {
            let error = ChainError::EntryOutOfRange {
                path: self.path.clone(),
                entry_index: index,
            };
            self.fail(error, events);
            return;
        };

        let matching = self
            .call_stack
            .iter()
            .rposition(|frame| frame.root.id() == &data.root_interaction);
        match matching {
            Some(depth) => {
                self.call_stack.truncate(depth + 1);
                if let Some(frame) = self.call_stack.last_mut() {
                    frame.step = step;
                }
            }
            None => {
                let Some(root) = env.resolver.resolve(&data.root_interaction) else {
                    let error = ChainError::UnknownRoot {
                        path: self.path.clone(),
                        root: data.root_interaction.clone(),
                    };
                    self.fail(error, events);
                    return;
                };
                self.call_stack.push(CallFrame { root, step });
            }
        }

        if next_entry > self.current_entry {
            self.current_entry = next_entry;
        }
        info!(
            "Chain {} realigned to step {} of {} at entry {}",
            self.path, step, data.root_interaction, self.current_entry
        );
    }

    fn create_remote_fork(
        &mut self,
        id: ForkedChainId,
        record: &SyncInteractionChain,
        env: &ChainEnv<'_>,
    ) -> Result<(), SyncError> {
        let path = self.path.child(id);
        if self.state.is_terminal() {
            return Err(SyncError::ChainTerminated { path });
        }
        if path.depth() > env.max_fork_depth {
            return Err(SyncError::ForkDepthExceeded {
                path,
                limit: env.max_fork_depth,
            });
        }
        let Some(root) = env.resolver.resolve(&record.root_interaction) else {
            return Err(SyncError::UnknownRoot {
                path,
                root: record.root_interaction.clone(),
            });
        };

        debug!("Chain {} created fork {} from a peer record", self.path, id);
        let mut fork =
            InteractionChain::new(path, record.interaction_type, self.context.duplicate(), root);
        fork.remote_created = true;
        self.forks.insert(id, fork);
        self.fork_order.push(id);
        Ok(())
    }

    /// Appends the outbound records this node and its subtree owe the peer.
    /// A cancelled subtree owes nothing beyond its Cancellation record.
    pub fn collect_sync(&mut self, host_type: HostType, out: &mut Vec<SyncInteractionChain>) {
        if self.state == ChainState::Cancelled {
            return;
        }

        let mut initial = Vec::new();
        let mut update = Vec::new();
        let mut correction = Vec::new();

        for (index, entry) in self.entries.iter_mut() {
            if entry.consume_desync_flag() {
                match host_type {
                    HostType::Server => {
                        entry.consume_send_initial();
                        if let Some(data) = entry.snapshot_for_send() {
                            let position = entry.next_outbound_position();
                            correction.push((*index, position, data));
                        }
                        continue;
                    }
                    HostType::Client => {
                        debug!("Entry {} of chain {} desynced; following server", index, self.path);
                    }
                }
            }
            if host_type == HostType::Client && !entry.uses_simulation_state() {
                entry.consume_send_initial();
                continue;
            }

            if entry.consume_send_initial() {
                if let Some(data) = entry.snapshot_for_send() {
                    let position = entry.next_outbound_position();
                    initial.push((*index, position, data));
                }
            } else if let Some(data) = entry.take_pending_update() {
                let position = entry.next_outbound_position();
                update.push((*index, position, data));
            }
        }

        for (reason, entries) in [
            (SyncReason::Initial, initial),
            (SyncReason::Update, update),
            (SyncReason::Correction, correction),
        ] {
            if entries.is_empty() {
                continue;
            }
            let record = entries.into_iter().fold(
                SyncInteractionChain::new(
                    &self.path,
                    self.interaction_type,
                    self.initial_root.clone(),
                    reason,
                ),
                |record, (index, position, data)| record.with_entry(index, position, data),
            );
            out.push(record);
        }

        for id in self.fork_order.iter() {
            if let Some(fork) = self.forks.get_mut(id) {
                fork.collect_sync(host_type, out);
            }
        }
    }

    /// A Cancellation record addressed to this node.
    pub fn cancellation_record(&self) -> SyncInteractionChain {
        SyncInteractionChain::new(
            &self.path,
            self.interaction_type,
            self.initial_root.clone(),
            SyncReason::Cancellation,
        )
    }
}

impl ChainSyncStorage for InteractionChain {
    fn chain_state(&self) -> ChainState {
        self.state
    }

    fn entry(&self, index: u32) -> Option<&InteractionEntry> {
        self.entries.get(&index)
    }

    fn put_client_state(
        &mut self,
        index: u32,
        position: SyncIndex,
        data: InteractionSyncData,
    ) -> SyncApply {
        self.entries
            .entry(index)
            .or_insert_with(|| InteractionEntry::new(index))
            .set_client_state(position, data)
    }

    fn put_authoritative_state(
        &mut self,
        index: u32,
        position: SyncIndex,
        data: InteractionSyncData,
    ) -> SyncApply {
        self.entries
            .entry(index)
            .or_insert_with(|| InteractionEntry::new(index))
            .apply_authoritative(position, data)
    }

    fn is_sync_position_stale(&self, index: u32, position: SyncIndex) -> bool {
        self.entries
            .get(&index)
            .map_or(false, |entry| entry.is_sync_position_stale(position))
    }

    fn sync_fork(
        &mut self,
        forks: &[ForkedChainId],
        record: &SyncInteractionChain,
        env: &ChainEnv<'_>,
        events: &mut ChainEvents,
    ) -> Result<SyncReport, SyncError> {
        let Some((first, rest)) = forks.split_first() else {
            return self.apply_record(record, env, events);
        };

        if !self.forks.contains_key(first) {
            if !rest.is_empty() {
                return Err(SyncError::ChainNotFound {
                    path: self.path.child(*first),
                });
            }
            if record.reason == SyncReason::Cancellation {
                return Ok(SyncReport::default());
            }
            self.create_remote_fork(*first, record, env)?;
        }

        match self.forks.get_mut(first) {
            Some(fork) => fork.sync_fork(rest, record, env, events),
            None => Err(SyncError::ChainNotFound {
                path: self.path.child(*first),
            }),
        }
    }
}

impl fmt::Debug for InteractionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionChain")
            .field("path", &self.path)
            .field("interaction_type", &self.interaction_type)
            .field("state", &self.state)
            .field("current_entry", &self.current_entry)
            .field("call_depth", &self.call_stack.len())
            .field("forks", &self.fork_order)
            .finish()
    }
}
