use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    interaction::error::{ContextError, InvalidForkError},
    ChainPath, EntityRef, ForkedChainId, HostType, InteractionType, MetaStore, MetaValue,
    RootInteraction, RootInteractionId,
};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a context. `Clone` keeps it, `duplicate` mints a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Snapshot of the item held when the interaction started.
#[derive(Clone, Debug, PartialEq)]
pub struct HeldItem {
    pub item_type: String,
    pub quantity: u32,
    pub durability: Option<f64>,
}

impl HeldItem {
    pub fn new(item_type: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_type: item_type.into(),
            quantity,
            durability: None,
        }
    }
}

/// What `InteractionContext::cancel` tears down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelScope {
    /// The chain (or fork) running the step, with its subtree.
    Chain,
    /// The root-level chain this step belongs to, with every fork under it.
    Root,
}

/// A world change requested by an operation. Applied by the entity store
/// after the tick, never from inside it.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldCommand {
    pub issuer: EntityRef,
    pub target: EntityRef,
    pub kind: String,
    pub payload: Option<MetaValue>,
}

impl WorldCommand {
    pub fn new(issuer: EntityRef, target: EntityRef, kind: impl Into<String>) -> Self {
        Self {
            issuer,
            target,
            kind: kind.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<MetaValue>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ForkRequest {
    pub(crate) id: ForkedChainId,
    pub(crate) context: InteractionContext,
    pub(crate) root: RootInteractionId,
    pub(crate) interaction_type: Option<InteractionType>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ChainControl {
    Execute(RootInteractionId),
    ExitRoot,
    Jump(usize),
    Cancel(CancelScope),
}

/// Parameter object handed to every operation.
///
/// Holds handles (chain path, entry index) rather than references; the chain
/// running the step reads the queued fork and control requests back once
/// the operation returns.
#[derive(Clone)]
pub struct InteractionContext {
    id: ContextId,
    owner: EntityRef,
    runs_for: Option<EntityRef>,
    held_item: Option<HeldItem>,
    original_item_type: Option<String>,
    meta: MetaStore,

    host_type: Option<HostType>,
    chain: Option<ChainPath>,
    interaction_type: Option<InteractionType>,
    entry: Option<u32>,
    root: Option<Arc<RootInteraction>>,
    entry_meta: MetaStore,
    next_fork_sequence: u32,

    forks: Vec<ForkRequest>,
    controls: Vec<ChainControl>,
    commands: Vec<WorldCommand>,
}

impl InteractionContext {
    pub fn new(owner: EntityRef) -> Self {
        Self {
            id: ContextId::next(),
            owner,
            runs_for: None,
            held_item: None,
            original_item_type: None,
            meta: MetaStore::new(),

            host_type: None,
            chain: None,
            interaction_type: None,
            entry: None,
            root: None,
            entry_meta: MetaStore::new(),
            next_fork_sequence: 0,

            forks: Vec::new(),
            controls: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Executes on behalf of `runs_for` while `owner` keeps the chain.
    pub fn with_runs_for(mut self, runs_for: EntityRef) -> Self {
        self.runs_for = Some(runs_for);
        self
    }

    pub fn with_held_item(mut self, item: HeldItem) -> Self {
        self.original_item_type = Some(item.item_type.clone());
        self.held_item = Some(item);
        self
    }

    pub fn with_meta(mut self, meta: MetaStore) -> Self {
        self.meta = meta;
        self
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn owner(&self) -> EntityRef {
        self.owner
    }

    pub fn runs_for(&self) -> EntityRef {
        self.runs_for.unwrap_or(self.owner)
    }

    pub fn held_item(&self) -> Option<&HeldItem> {
        self.held_item.as_ref()
    }

    /// Replaces the live item view; the original type is kept.
    pub fn set_held_item(&mut self, item: Option<HeldItem>) {
        self.held_item = item;
    }

    /// Item type the interaction started with, even if the stack changed since.
    pub fn original_item_type(&self) -> Option<&str> {
        self.original_item_type.as_deref()
    }

    pub fn meta(&self) -> &MetaStore {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut MetaStore {
        &mut self.meta
    }

    /// Scratch store owned by the entry currently executing.
    pub fn entry_meta(&self) -> &MetaStore {
        &self.entry_meta
    }

    pub fn entry_meta_mut(&mut self) -> &mut MetaStore {
        &mut self.entry_meta
    }

    pub fn host_type(&self) -> Option<HostType> {
        self.host_type
    }

    /// True when running as the client's prediction.
    pub fn is_simulating(&self) -> bool {
        self.host_type == Some(HostType::Client)
    }

    pub fn chain_path(&self) -> Option<&ChainPath> {
        self.chain.as_ref()
    }

    pub fn interaction_type(&self) -> Option<InteractionType> {
        self.interaction_type
    }

    pub fn entry_index(&self) -> Option<u32> {
        self.entry
    }

    pub fn current_root(&self) -> Option<&RootInteractionId> {
        self.root.as_ref().map(|root| root.id())
    }

    /// A context for an unrelated chain: same owner, item and meta values,
    /// new identity, not attached to any chain.
    pub fn duplicate(&self) -> Self {
        Self {
            id: ContextId::next(),
            owner: self.owner,
            runs_for: self.runs_for,
            held_item: self.held_item.clone(),
            original_item_type: self.original_item_type.clone(),
            meta: self.meta.duplicate(),

            host_type: None,
            chain: None,
            interaction_type: None,
            entry: None,
            root: None,
            entry_meta: MetaStore::new(),
            next_fork_sequence: 0,

            forks: Vec::new(),
            controls: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Spawns a child chain running `root` with `context`, inheriting this
    /// chain's interaction type.
    pub fn fork(
        &mut self,
        context: InteractionContext,
        root: impl Into<RootInteractionId>,
    ) -> Result<ForkedChainId, ContextError> {
        self.push_fork(context, root.into(), None)
    }

    pub fn fork_with(
        &mut self,
        context: InteractionContext,
        root: impl Into<RootInteractionId>,
        interaction_type: InteractionType,
    ) -> Result<ForkedChainId, ContextError> {
        self.push_fork(context, root.into(), Some(interaction_type))
    }

    /// Pushes `root` onto the chain's call stack once this step returns.
    pub fn execute(&mut self, root: impl Into<RootInteractionId>) {
        self.controls.push(ChainControl::Execute(root.into()));
    }

    /// Leaves the current root early, resuming whatever pushed it.
    pub fn exit_root(&mut self) {
        self.controls.push(ChainControl::ExitRoot);
    }

    /// Moves the execution pointer to the step labelled `label`.
    pub fn jump(&mut self, label: &str) -> Result<(), ContextError> {
        let Some(root) = self.root.as_ref() else {
            return Err(ContextError::Detached);
        };
        let Some(step) = root.label_index(label) else {
            return Err(ContextError::UnknownLabel {
                root: root.id().clone(),
                label: label.to_string(),
            });
        };
        self.controls.push(ChainControl::Jump(step));
        Ok(())
    }

    pub fn cancel(&mut self, scope: CancelScope) {
        self.controls.push(ChainControl::Cancel(scope));
    }

    pub fn queue_command(&mut self, command: WorldCommand) {
        self.commands.push(command);
    }

    fn push_fork(
        &mut self,
        context: InteractionContext,
        root: RootInteractionId,
        interaction_type: Option<InteractionType>,
    ) -> Result<ForkedChainId, ContextError> {
        let (Some(chain), Some(entry)) = (self.chain.as_ref(), self.entry) else {
            return Err(ContextError::Detached);
        };
        if context.id == self.id {
            return Err(InvalidForkError {
                chain: chain.to_string(),
            }
            .into());
        }

        let id = ForkedChainId::new(entry, self.next_fork_sequence);
        self.next_fork_sequence += 1;
        self.forks.push(ForkRequest {
            id,
            context,
            root,
            interaction_type,
        });
        Ok(id)
    }

    // Chain-facing plumbing

    pub(crate) fn attach_chain(
        &mut self,
        host_type: HostType,
        path: ChainPath,
        interaction_type: InteractionType,
    ) {
        self.host_type = Some(host_type);
        self.chain = Some(path);
        self.interaction_type = Some(interaction_type);
    }

    pub(crate) fn enter_step(
        &mut self,
        entry: u32,
        root: Arc<RootInteraction>,
        entry_meta: MetaStore,
        next_fork_sequence: u32,
    ) {
        self.entry = Some(entry);
        self.root = Some(root);
        self.entry_meta = entry_meta;
        self.next_fork_sequence = next_fork_sequence;
    }

    /// Returns the lent entry meta and the advanced fork counter.
    pub(crate) fn leave_step(&mut self) -> (MetaStore, u32) {
        self.entry = None;
        self.root = None;
        (std::mem::take(&mut self.entry_meta), self.next_fork_sequence)
    }

    pub(crate) fn take_fork_requests(&mut self) -> Vec<ForkRequest> {
        std::mem::take(&mut self.forks)
    }

    pub(crate) fn take_controls(&mut self) -> Vec<ChainControl> {
        std::mem::take(&mut self.controls)
    }

    pub(crate) fn take_commands(&mut self) -> Vec<WorldCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl fmt::Debug for InteractionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionContext")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("runs_for", &self.runs_for)
            .field("chain", &self.chain)
            .field("entry", &self.entry)
            .finish()
    }
}
