//! Scripted operations for driving chains from tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tandem_shared::{
    from_fn, CancelScope, EntityRef, MetaKey, MetaValue, Operation, OperationError, StepOutcome,
    WorldCommand,
};

const TICKS_RUN: MetaKey = MetaKey::from_static("test.ticks_run");

pub fn complete() -> impl Operation {
    from_fn(|_, _| Ok(StepOutcome::Complete))
}

pub fn running() -> impl Operation {
    from_fn(|_, _| Ok(StepOutcome::Running))
}

pub fn fail_with(message: &'static str) -> impl Operation {
    from_fn(move |_, _| Err(OperationError::new(message)))
}

/// Completes on its `ticks`-th run. The count lives in the entry's meta.
pub fn run_for(ticks: i64) -> impl Operation {
    from_fn(move |context, _| {
        let seen = context
            .entry_meta()
            .get(&TICKS_RUN)
            .and_then(MetaValue::as_int)
            .unwrap_or(0)
            + 1;
        context.entry_meta_mut().set(TICKS_RUN, seen);
        if seen >= ticks {
            Ok(StepOutcome::Complete)
        } else {
            Ok(StepOutcome::Running)
        }
    })
}

/// Forks one child chain per root, each with a duplicated context.
pub fn fork_each(roots: &'static [&'static str]) -> impl Operation {
    from_fn(move |context, _| {
        for root in roots {
            let child = context.duplicate();
            context.fork(child, *root)?;
        }
        Ok(StepOutcome::Complete)
    })
}

pub fn set_meta(key: MetaKey, value: i64) -> impl Operation {
    from_fn(move |context, _| {
        context.meta_mut().set(key.clone(), value);
        Ok(StepOutcome::Complete)
    })
}

pub fn count_into(counter: Arc<AtomicUsize>) -> impl Operation {
    from_fn(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(StepOutcome::Complete)
    })
}

pub fn queue_hit(target: EntityRef, damage: i64) -> impl Operation {
    from_fn(move |context, _| {
        let command = WorldCommand::new(context.runs_for(), target, "hit").with_payload(damage);
        context.queue_command(command);
        Ok(StepOutcome::Complete)
    })
}

pub fn cancel_root() -> impl Operation {
    from_fn(|context, _| {
        context.cancel(CancelScope::Root);
        Ok(StepOutcome::Running)
    })
}
