use crate::{MetaDelta, RootInteractionId, StepOutcome};

/// Progress marker of one entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionState {
    NotFinished,
    Finished,
    Failed,
}

impl InteractionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InteractionState::NotFinished)
    }
}

impl From<StepOutcome> for InteractionState {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Running => InteractionState::NotFinished,
            StepOutcome::Complete => InteractionState::Finished,
        }
    }
}

/// Wire snapshot of one entry at one point in time.
#[derive(Clone, Debug, PartialEq)]
pub struct InteractionSyncData {
    pub state: InteractionState,
    /// Root interaction the entry's step belongs to.
    pub root_interaction: RootInteractionId,
    /// Step index inside `root_interaction`.
    pub operation_counter: u32,
    pub meta: MetaDelta,
}

impl InteractionSyncData {
    pub fn new(
        state: InteractionState,
        root_interaction: RootInteractionId,
        operation_counter: u32,
    ) -> Self {
        Self {
            state,
            root_interaction,
            operation_counter,
            meta: MetaDelta::new(),
        }
    }

    pub fn with_meta(mut self, meta: MetaDelta) -> Self {
        self.meta = meta;
        self
    }

    /// Compares progress markers only. Meta is advisory and may legitimately
    /// differ (a client cannot know server-computed damage).
    ///
    /// A finished/unfinished mismatch is latency, not divergence: one peer is
    /// simply further along the same step. Two terminal states must agree.
    pub fn diverges_from(&self, other: &InteractionSyncData) -> bool {
        if self.operation_counter != other.operation_counter
            || self.root_interaction != other.root_interaction
        {
            return true;
        }
        self.state.is_terminal() && other.state.is_terminal() && self.state != other.state
    }

    /// Replaces the marker with `newer` and folds its meta delta into ours.
    pub(crate) fn absorb(&mut self, newer: InteractionSyncData) {
        self.state = newer.state;
        self.root_interaction = newer.root_interaction;
        self.operation_counter = newer.operation_counter;
        self.meta.merge(newer.meta);
    }
}
