use std::mem;

use tandem_shared::{ChainCompletion, ChainOutcome, EntityRef, WorldCommand};

/// What the managers produced since the last `take_events`.
pub struct InteractionEvents {
    completions: Vec<(EntityRef, ChainCompletion)>,
    commands: Vec<WorldCommand>,
}

impl InteractionEvents {
    pub(crate) fn new() -> Self {
        Self {
            completions: Vec::new(),
            commands: Vec::new(),
        }
    }

    // Public

    pub fn is_empty(&self) -> bool {
        self.completions.is_empty() && self.commands.is_empty()
    }

    pub fn has_completions(&self) -> bool {
        !self.completions.is_empty()
    }
    pub fn take_completions(&mut self) -> Vec<(EntityRef, ChainCompletion)> {
        mem::take(&mut self.completions)
    }

    /// Completions whose chain failed, so game logic can undo their effects.
    pub fn failures(&self) -> impl Iterator<Item = &(EntityRef, ChainCompletion)> {
        self.completions
            .iter()
            .filter(|(_, completion)| matches!(completion.outcome, ChainOutcome::Failed(_)))
    }

    pub fn has_world_commands(&self) -> bool {
        !self.commands.is_empty()
    }
    pub fn take_world_commands(&mut self) -> Vec<WorldCommand> {
        mem::take(&mut self.commands)
    }

    // Crate-public

    pub(crate) fn push_completions(
        &mut self,
        entity: EntityRef,
        completions: impl IntoIterator<Item = ChainCompletion>,
    ) {
        self.completions
            .extend(completions.into_iter().map(|completion| (entity, completion)));
    }

    pub(crate) fn push_world_commands(&mut self, commands: impl IntoIterator<Item = WorldCommand>) {
        self.commands.extend(commands);
    }
}

impl Default for InteractionEvents {
    fn default() -> Self {
        Self::new()
    }
}
