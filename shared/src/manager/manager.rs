//! # `InteractionManager` – every chain of one entity
//!
//! The manager is the single writer for its entity's chains. One call to
//! [`InteractionManager::tick`] does, in order:
//!
//! 1. advance cooldowns,
//! 2. apply queued inbound records (oldest first, bounded per tick),
//! 3. tick every root chain in creation order,
//! 4. gather outbound records: Corrections for consumed desync flags
//!    (server), Initial for new entries, Update for changed entries,
//! 5. retire terminal chains.
//!
//! Root chain ids are split by sign so both peers allocate without talking
//! to each other: the server counts down from -1, a client counts up from 1.

use std::{collections::VecDeque, sync::Arc};

use log::{debug, info, warn};

use crate::{
    ChainCompletion, ChainEnv, ChainEvents, ChainId, ChainPath, ChainState, ChainSyncStorage,
    CompletionCallback, Cooldowns, DefaultRules, EntityRef, HostType, InteractionChain,
    InteractionContext, InteractionType, ManagerConfig, RootInteraction, RootInteractionId,
    RootInteractionResolver, RuleDecision, RulePolicy, StartError, SyncInteractionChain,
    SyncReason, WorldCommand,
};

/// Everything needed to start one root chain.
pub struct StartRequest {
    pub interaction_type: InteractionType,
    pub context: InteractionContext,
    pub root: RootInteractionId,
    /// Set when a peer already picked the id.
    pub chain_id: Option<ChainId>,
    pub on_complete: Option<CompletionCallback>,
}

impl StartRequest {
    pub fn new(
        interaction_type: InteractionType,
        context: InteractionContext,
        root: impl Into<RootInteractionId>,
    ) -> Self {
        Self {
            interaction_type,
            context,
            root: root.into(),
            chain_id: None,
            on_complete: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_on_complete(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }
}

pub struct InteractionManager {
    owner: EntityRef,
    host_type: HostType,
    config: ManagerConfig,
    resolver: Arc<dyn RootInteractionResolver>,
    rules: Box<dyn RulePolicy>,
    chains: Vec<InteractionChain>,
    next_chain_id: i32,
    cooldowns: Cooldowns,
    inbound: VecDeque<SyncInteractionChain>,
    outbound: Vec<SyncInteractionChain>,
    completions: Vec<ChainCompletion>,
    commands: Vec<WorldCommand>,
    retired: VecDeque<ChainId>,
}

impl InteractionManager {
    pub fn new(
        owner: EntityRef,
        host_type: HostType,
        resolver: Arc<dyn RootInteractionResolver>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            owner,
            host_type,
            config,
            resolver,
            rules: Box::new(DefaultRules),
            chains: Vec::new(),
            next_chain_id: first_chain_id(host_type),
            cooldowns: Cooldowns::new(),
            inbound: VecDeque::new(),
            outbound: Vec::new(),
            completions: Vec::new(),
            commands: Vec::new(),
            retired: VecDeque::new(),
        }
    }

    pub fn with_rules(mut self, rules: impl RulePolicy + 'static) -> Self {
        self.rules = Box::new(rules);
        self
    }

    // Accessors

    pub fn owner(&self) -> EntityRef {
        self.owner
    }

    pub fn host_type(&self) -> HostType {
        self.host_type
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn cooldowns(&self) -> &Cooldowns {
        &self.cooldowns
    }

    pub fn chain(&self, id: ChainId) -> Option<&InteractionChain> {
        self.chains.iter().find(|chain| chain.path().chain_id() == id)
    }

    pub fn chain_mut(&mut self, id: ChainId) -> Option<&mut InteractionChain> {
        self.chains
            .iter_mut()
            .find(|chain| chain.path().chain_id() == id)
    }

    /// Any node of any fork tree.
    pub fn find(&self, path: &ChainPath) -> Option<&InteractionChain> {
        self.chain(path.chain_id())?.find(path.forks())
    }

    /// Root chains in creation order.
    pub fn chains(&self) -> impl Iterator<Item = &InteractionChain> {
        self.chains.iter()
    }

    pub fn active_chain_count(&self) -> usize {
        self.chains
            .iter()
            .filter(|chain| chain.state() == ChainState::Active)
            .count()
    }

    pub fn is_retired(&self, id: ChainId) -> bool {
        self.retired.contains(&id)
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    // Starting

    /// Starts a chain, reporting only whether it started.
    pub fn try_start_chain(
        &mut self,
        interaction_type: InteractionType,
        context: InteractionContext,
        root: impl Into<RootInteractionId>,
    ) -> bool {
        match self.start_chain(StartRequest::new(interaction_type, context, root)) {
            Ok(_) => true,
            Err(error) => {
                debug!("Entity {} did not start {:?}: {}", self.owner, interaction_type, error);
                false
            }
        }
    }

    pub fn start_chain(&mut self, request: StartRequest) -> Result<ChainId, StartError> {
        let StartRequest {
            interaction_type,
            context,
            root,
            chain_id,
            on_complete,
        } = request;

        let Some(root) = self.resolver.resolve(&root) else {
            return Err(StartError::UnknownRoot { root });
        };
        if let Some(cooldown) = root.cooldown() {
            if let Some(remaining) = self.cooldowns.remaining(&cooldown.id) {
                return Err(StartError::CooldownActive {
                    cooldown: cooldown.id.clone(),
                    remaining,
                });
            }
        }
        if let Some(id) = chain_id {
            if self.chain(id).is_some() || self.is_retired(id) {
                return Err(StartError::ChainIdInUse { id });
            }
        }
        let interrupted = self.apply_rules(interaction_type, &root)?;

        let mut events = ChainEvents::new();
        for id in interrupted {
            if let Some(chain) = self.chain_mut(id) {
                info!("Chain {} interrupted by {}", id, root.id());
                chain.cancel(&mut events);
            }
        }
        self.absorb_events(events);

        let id = match chain_id {
            Some(id) => id,
            None => self.allocate_chain_id(),
        };
        let mut chain =
            InteractionChain::new(ChainPath::root(id), interaction_type, context, root.clone());
        if let Some(callback) = on_complete {
            chain.set_on_complete(callback);
        }
        self.chains.push(chain);

        if let Some(cooldown) = root.cooldown() {
            self.cooldowns.set(cooldown);
        }
        info!(
            "Entity {} started chain {} ({:?}, {})",
            self.owner,
            id,
            interaction_type,
            root.id()
        );
        Ok(id)
    }

    /// Evaluates the rule policy against every active root chain. Returns the
    /// chains to interrupt, or the first chain that blocks.
    pub fn apply_rules(
        &self,
        interaction_type: InteractionType,
        root: &RootInteraction,
    ) -> Result<Vec<ChainId>, StartError> {
        let mut interrupted = Vec::new();
        for chain in self.chains.iter() {
            if chain.state() != ChainState::Active {
                continue;
            }
            let Some(active_root) = self.resolver.resolve(chain.initial_root()) else {
                continue;
            };
            let id = chain.path().chain_id();
            match self.rules.decide(
                interaction_type,
                root,
                chain.interaction_type(),
                &active_root,
            ) {
                RuleDecision::Allow => {}
                RuleDecision::Interrupt => interrupted.push(id),
                RuleDecision::Block => {
                    return Err(StartError::Blocked {
                        interaction_type,
                        blocked_by: id,
                    });
                }
            }
        }
        Ok(interrupted)
    }

    fn allocate_chain_id(&mut self) -> ChainId {
        loop {
            let id = ChainId::new(self.next_chain_id);
            self.next_chain_id = match self.host_type {
                HostType::Server => self.next_chain_id.checked_sub(1).unwrap_or(-1),
                HostType::Client => self.next_chain_id.checked_add(1).unwrap_or(1),
            };
            if self.chain(id).is_none() && !self.is_retired(id) {
                return id;
            }
        }
    }

    // Cancelling

    /// Cancels a root chain and its subtree, queuing one Cancellation record
    /// per node that transitioned.
    pub fn cancel_chains(&mut self, id: ChainId) -> bool {
        let mut events = ChainEvents::new();
        let found = match self.chain_mut(id) {
            Some(chain) => {
                chain.cancel(&mut events);
                true
            }
            None => false,
        };
        self.absorb_events(events);
        found
    }

    /// Cancels one node of a fork tree and its subtree.
    pub fn cancel_fork(&mut self, path: &ChainPath) -> bool {
        let mut events = ChainEvents::new();
        let found = match self
            .chain_mut(path.chain_id())
            .and_then(|chain| chain.find_mut(path.forks()))
        {
            Some(node) => {
                node.cancel(&mut events);
                true
            }
            None => false,
        };
        self.absorb_events(events);
        found
    }

    /// Cancels every chain and hands back the flushed outbound records
    /// without waiting for the next tick.
    pub fn clear(&mut self) -> Vec<SyncInteractionChain> {
        let mut events = ChainEvents::new();
        for chain in self.chains.iter_mut() {
            chain.cancel(&mut events);
        }
        self.absorb_events(events);
        self.inbound.clear();
        self.retire_terminal_chains();
        info!("Cleared interactions of entity {}", self.owner);
        self.take_outgoing_records()
    }

    // Ticking

    pub fn receive_record(&mut self, record: SyncInteractionChain) {
        self.inbound.push_back(record);
    }

    pub fn tick(&mut self, dt: f32) {
        self.cooldowns.tick(dt);

        let resolver = self.resolver.clone();
        let env = ChainEnv {
            host_type: self.host_type,
            resolver: resolver.as_ref(),
            max_fork_depth: self.config.max_fork_depth,
        };
        let mut events = ChainEvents::new();

        self.process_inbound(&env, &mut events);

        for chain in self.chains.iter_mut() {
            chain.tick(dt, &env, &mut events);
            if let Some(requested_by) = events.root_cancel.take() {
                info!("Chain {} cancelled its root", requested_by);
                chain.cancel(&mut events);
            }
        }
        self.absorb_events(events);

        for chain in self.chains.iter_mut() {
            chain.collect_sync(self.host_type, &mut self.outbound);
        }

        self.retire_terminal_chains();
    }

    fn process_inbound(&mut self, env: &ChainEnv<'_>, events: &mut ChainEvents) {
        for _ in 0..self.config.max_inbound_per_tick {
            let Some(record) = self.inbound.pop_front() else {
                break;
            };
            self.apply_record(record, env, events);
        }
        if !self.inbound.is_empty() {
            debug!(
                "Entity {} deferred {} inbound records to the next tick",
                self.owner,
                self.inbound.len()
            );
        }
    }

    fn apply_record(
        &mut self,
        record: SyncInteractionChain,
        env: &ChainEnv<'_>,
        events: &mut ChainEvents,
    ) {
        let chain_id = record.chain_id;
        if self.is_retired(chain_id) {
            debug!("Dropped {:?} record for retired chain {}", record.reason, chain_id);
            return;
        }

        let position = self
            .chains
            .iter()
            .position(|chain| chain.path().chain_id() == chain_id);
        let index = match position {
            Some(index) => index,
            None => match self.adopt_remote_chain(&record) {
                Some(index) => index,
                None => return,
            },
        };

        let Some(chain) = self.chains.get_mut(index) else {
            return;
        };
        match chain.sync_fork(&record.fork_path, &record, env, events) {
            Ok(report) => {
                if report.stale > 0 {
                    debug!(
                        "Dropped {} stale entries for {}",
                        report.stale,
                        record.path()
                    );
                }
                if report.desynced > 0 {
                    warn!(
                        "{} entries of {} desynced on entity {}",
                        report.desynced,
                        record.path(),
                        self.owner
                    );
                }
            }
            Err(error) => warn!("Dropped record on entity {}: {}", self.owner, error),
        }
    }

    /// Creates the root chain a peer record refers to. Returns its index.
    fn adopt_remote_chain(&mut self, record: &SyncInteractionChain) -> Option<usize> {
        let path = record.path();
        if record.reason == SyncReason::Cancellation {
            debug!("Dropped cancellation for unknown chain {}", path);
            return None;
        }
        if !record.fork_path.is_empty() || record.chain_id.owner() == self.host_type {
            debug!("Dropped {:?} record for unknown chain {}", record.reason, path);
            return None;
        }

        match self.host_type {
            HostType::Server => {
                if record.reason != SyncReason::Initial {
                    debug!("Dropped {:?} record for unstarted chain {}", record.reason, path);
                    return None;
                }
                let request = StartRequest::new(
                    record.interaction_type,
                    InteractionContext::new(self.owner),
                    record.root_interaction.clone(),
                )
                .with_chain_id(record.chain_id);
                match self.start_chain(request) {
                    Ok(_) => Some(self.chains.len() - 1),
                    Err(error) => {
                        warn!("Refused client chain {} on entity {}: {}", path, self.owner, error);
                        self.outbound.push(SyncInteractionChain::new(
                            &path,
                            record.interaction_type,
                            record.root_interaction.clone(),
                            SyncReason::Cancellation,
                        ));
                        None
                    }
                }
            }
            HostType::Client => {
                let Some(root) = self.resolver.resolve(&record.root_interaction) else {
                    warn!(
                        "Cannot follow server chain {}: root interaction {} is unknown",
                        path, record.root_interaction
                    );
                    return None;
                };
                debug!("Following server chain {} on entity {}", path, self.owner);
                self.chains.push(InteractionChain::new(
                    path,
                    record.interaction_type,
                    InteractionContext::new(self.owner),
                    root,
                ));
                Some(self.chains.len() - 1)
            }
        }
    }

    fn absorb_events(&mut self, events: ChainEvents) {
        let ChainEvents {
            completions,
            cancelled,
            commands,
            root_cancel: _,
        } = events;

        for completion in cancelled {
            self.outbound.push(SyncInteractionChain::new(
                &completion.path,
                completion.interaction_type,
                completion.root_interaction,
                SyncReason::Cancellation,
            ));
        }
        self.completions.extend(completions);
        self.commands.extend(commands);
    }

    fn retire_terminal_chains(&mut self) {
        let mut retired = Vec::new();
        self.chains.retain(|chain| {
            if chain.state().is_terminal() {
                retired.push(chain.path().chain_id());
                false
            } else {
                true
            }
        });
        for id in retired {
            self.retired.push_back(id);
            while self.retired.len() > self.config.retired_chain_memory {
                self.retired.pop_front();
            }
        }
    }

    // Drains

    pub fn take_outgoing_records(&mut self) -> Vec<SyncInteractionChain> {
        std::mem::take(&mut self.outbound)
    }

    pub fn take_completions(&mut self) -> Vec<ChainCompletion> {
        std::mem::take(&mut self.completions)
    }

    pub fn take_world_commands(&mut self) -> Vec<WorldCommand> {
        std::mem::take(&mut self.commands)
    }
}

fn first_chain_id(host_type: HostType) -> i32 {
    match host_type {
        HostType::Server => -1,
        HostType::Client => 1,
    }
}
