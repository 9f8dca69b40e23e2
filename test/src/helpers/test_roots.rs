use std::time::Duration;

use tandem_shared::{
    meta::DAMAGE, CooldownSpec, EntityRef, InteractionRules, InteractionType, RootInteraction,
    RootInteractionMap,
};

use super::operations::{
    cancel_root, complete, fail_with, fork_each, queue_hit, run_for, running, set_meta,
};

pub const TARGET: EntityRef = EntityRef::from_u64(900);

/// Root interactions shared by the integration tests.
///
/// | id | steps |
/// |----|-------|
/// | `A` | two completing steps |
/// | `B` | forks `C1` and `C2`, then runs forever |
/// | `charge` | one step completing on its third tick |
/// | `swing` | writes `DAMAGE`, hits `TARGET`, completes |
/// | `guard` | runs forever, blocks `Use` |
/// | `drink` | completes, 1s cooldown |
/// | `dodge` | completes, interrupts `Primary` |
/// | `broken` | fails |
/// | `abort` | requests a root cancel |
pub fn test_roots() -> RootInteractionMap {
    RootInteractionMap::new()
        .with(RootInteraction::new("A").with_step(complete()).with_step(complete()))
        .with(
            RootInteraction::new("B")
                .with_step(fork_each(&["C1", "C2"]))
                .with_step(running()),
        )
        .with(RootInteraction::new("C1").with_step(running()))
        .with(RootInteraction::new("C2").with_step(running()))
        .with(RootInteraction::new("charge").with_step(run_for(3)))
        .with(
            RootInteraction::new("swing")
                .with_step(set_meta(DAMAGE, 4))
                .with_step(queue_hit(TARGET, 4)),
        )
        .with(
            RootInteraction::new("guard")
                .with_step(running())
                .with_rules(InteractionRules::new().blocking(InteractionType::Use)),
        )
        .with(
            RootInteraction::new("drink")
                .with_step(complete())
                .with_cooldown(CooldownSpec::new("drink", Duration::from_secs(1))),
        )
        .with(
            RootInteraction::new("dodge")
                .with_step(complete())
                .with_rules(InteractionRules::new().interrupting(InteractionType::Primary)),
        )
        .with(RootInteraction::new("broken").with_step(fail_with("out of stamina")))
        .with(RootInteraction::new("abort").with_step(cancel_root()))
}
