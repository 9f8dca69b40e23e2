use std::collections::HashSet;

use crate::{InteractionType, RootInteraction};

/// Conflict rules a root interaction declares about other interaction types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InteractionRules {
    /// This root cannot start while one of these types is active.
    pub blocked_by: HashSet<InteractionType>,
    /// While this root runs, these types cannot start.
    pub blocking: HashSet<InteractionType>,
    /// Starting this root cancels active chains of these types.
    pub interrupting: HashSet<InteractionType>,
}

impl InteractionRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocked_by(mut self, interaction_type: InteractionType) -> Self {
        self.blocked_by.insert(interaction_type);
        self
    }

    pub fn blocking(mut self, interaction_type: InteractionType) -> Self {
        self.blocking.insert(interaction_type);
        self
    }

    pub fn interrupting(mut self, interaction_type: InteractionType) -> Self {
        self.interrupting.insert(interaction_type);
        self
    }
}

/// Verdict for one active chain when a new chain is proposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleDecision {
    Allow,
    Block,
    Interrupt,
}

/// Decides whether a proposed chain may start next to an active one.
pub trait RulePolicy: Send + Sync {
    fn decide(
        &self,
        proposed_type: InteractionType,
        proposed_root: &RootInteraction,
        active_type: InteractionType,
        active_root: &RootInteraction,
    ) -> RuleDecision;
}

/// Declarative rules from `InteractionRules`, plus one chain per type.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRules;

impl RulePolicy for DefaultRules {
    fn decide(
        &self,
        proposed_type: InteractionType,
        proposed_root: &RootInteraction,
        active_type: InteractionType,
        active_root: &RootInteraction,
    ) -> RuleDecision {
        if proposed_root.rules().interrupting.contains(&active_type) {
            return RuleDecision::Interrupt;
        }
        if proposed_type == active_type
            || active_root.rules().blocking.contains(&proposed_type)
            || proposed_root.rules().blocked_by.contains(&active_type)
        {
            return RuleDecision::Block;
        }
        RuleDecision::Allow
    }
}
