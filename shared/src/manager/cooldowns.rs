use std::{collections::HashMap, time::Duration};

/// Cooldown a root interaction arms when a chain for it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CooldownSpec {
    /// Roots sharing an id share the cooldown.
    pub id: String,
    pub duration: Duration,
}

impl CooldownSpec {
    pub fn new(id: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            duration,
        }
    }
}

/// Remaining time per cooldown id, advanced by the manager tick.
#[derive(Clone, Debug, Default)]
pub struct Cooldowns {
    remaining: HashMap<String, Duration>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `spec`, keeping the longer of the current and new remaining time.
    pub fn set(&mut self, spec: &CooldownSpec) {
        let remaining = self.remaining.entry(spec.id.clone()).or_default();
        if spec.duration > *remaining {
            *remaining = spec.duration;
        }
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.remaining(id).is_some()
    }

    pub fn remaining(&self, id: &str) -> Option<Duration> {
        self.remaining.get(id).copied().filter(|left| !left.is_zero())
    }

    /// Advances every cooldown by `dt` seconds. A step too large to represent
    /// expires them all.
    pub fn tick(&mut self, dt: f32) {
        let Ok(elapsed) = Duration::try_from_secs_f32(dt.max(0.0)) else {
            self.remaining.clear();
            return;
        };
        self.remaining.retain(|_, left| {
            *left = left.saturating_sub(elapsed);
            !left.is_zero()
        });
    }

    pub fn clear(&mut self) {
        self.remaining.clear();
    }
}
