use std::{collections::HashMap, fmt, sync::Arc};

use crate::{CooldownSpec, InteractionContext, InteractionRules, OperationError};

/// String key a root interaction is registered under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootInteractionId(String);

impl RootInteractionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RootInteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RootInteractionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RootInteractionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Result of running one step for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Re-run the same step next tick.
    Running,
    /// Advance to the next step.
    Complete,
}

/// The game logic behind a step. Opaque to the engine.
pub trait Operation: Send + Sync {
    fn execute(
        &self,
        context: &mut InteractionContext,
        dt: f32,
    ) -> Result<StepOutcome, OperationError>;
}

impl<F> Operation for F
where
    F: Fn(&mut InteractionContext, f32) -> Result<StepOutcome, OperationError> + Send + Sync,
{
    fn execute(
        &self,
        context: &mut InteractionContext,
        dt: f32,
    ) -> Result<StepOutcome, OperationError> {
        self(context, dt)
    }
}

/// Pins a closure to the `Operation` call signature so its argument types
/// can be left out at the call site.
pub fn from_fn<F>(operation: F) -> F
where
    F: Fn(&mut InteractionContext, f32) -> Result<StepOutcome, OperationError> + Send + Sync,
{
    operation
}

#[derive(Clone)]
pub struct Step {
    label: Option<String>,
    operation: Arc<dyn Operation>,
}

impl Step {
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn operation(&self) -> &dyn Operation {
        self.operation.as_ref()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("label", &self.label).finish()
    }
}

/// Immutable step sequence a chain executes.
#[derive(Clone, Debug)]
pub struct RootInteraction {
    id: RootInteractionId,
    steps: Vec<Step>,
    rules: InteractionRules,
    cooldown: Option<CooldownSpec>,
}

impl RootInteraction {
    pub fn new(id: impl Into<RootInteractionId>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            rules: InteractionRules::default(),
            cooldown: None,
        }
    }

    pub fn with_step(mut self, operation: impl Operation + 'static) -> Self {
        self.steps.push(Step {
            label: None,
            operation: Arc::new(operation),
        });
        self
    }

    pub fn with_labelled_step(
        mut self,
        label: impl Into<String>,
        operation: impl Operation + 'static,
    ) -> Self {
        self.steps.push(Step {
            label: Some(label.into()),
            operation: Arc::new(operation),
        });
        self
    }

    pub fn with_shared_step(mut self, label: Option<String>, operation: Arc<dyn Operation>) -> Self {
        self.steps.push(Step { label, operation });
        self
    }

    pub fn with_rules(mut self, rules: InteractionRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_cooldown(mut self, cooldown: CooldownSpec) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn id(&self) -> &RootInteractionId {
        &self.id
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn rules(&self) -> &InteractionRules {
        &self.rules
    }

    pub fn cooldown(&self) -> Option<&CooldownSpec> {
        self.cooldown.as_ref()
    }

    /// First step carrying `label`.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.label.as_deref() == Some(label))
    }
}

/// Looks up root interactions by id. "Not found" is a normal answer.
pub trait RootInteractionResolver: Send + Sync {
    fn resolve(&self, id: &RootInteractionId) -> Option<Arc<RootInteraction>>;
}

/// In-memory resolver.
#[derive(Clone, Default)]
pub struct RootInteractionMap {
    roots: HashMap<RootInteractionId, Arc<RootInteraction>>,
}

impl RootInteractionMap {
    pub fn new() -> Self {
        Self {
            roots: HashMap::new(),
        }
    }

    /// Registers `root`, replacing any previous definition with the same id.
    pub fn insert(&mut self, root: RootInteraction) -> Option<Arc<RootInteraction>> {
        self.roots.insert(root.id().clone(), Arc::new(root))
    }

    pub fn with(mut self, root: RootInteraction) -> Self {
        self.insert(root);
        self
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

impl RootInteractionResolver for RootInteractionMap {
    fn resolve(&self, id: &RootInteractionId) -> Option<Arc<RootInteraction>> {
        self.roots.get(id).cloned()
    }
}
