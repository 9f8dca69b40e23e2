/// Integration tests for chain execution on the authoritative side
/// These tests drive chains through InteractionServer ticks and check
/// completions, cancellation records and world commands

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tandem_server::ServerError;
use tandem_shared::{
    meta::DAMAGE, ChainCompletion, ChainError, ChainId, ChainOutcome, ChainPath, ChainState, EntityRef,
    ForkedChainId, InteractionContext, InteractionType, MetaValue, StartRequest, SyncReason,
};
use tandem_test::{assert_chain_state, assert_no_active_nodes, test_roots, TestServer, TARGET};

const DT: f32 = 0.05;
const PLAYER: EntityRef = EntityRef::from_u64(1);

fn init_logger() {
    env_logger::builder().is_test(true).try_init().ok();
}

fn server() -> TestServer {
    TestServer::new(Arc::new(test_roots())).with_entities(&[PLAYER])
}

/// A two-step chain finishes on its second tick and reports exactly once
#[test]
fn simple_chain_completes_once() {
    init_logger();
    let mut server = server();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let request = StartRequest::new(
        InteractionType::Primary,
        InteractionContext::new(PLAYER),
        "A",
    )
    .with_on_complete(Box::new(move |completion: &ChainCompletion| {
        assert_eq!(completion.outcome, ChainOutcome::Finished);
        seen.fetch_add(1, Ordering::SeqCst);
    }));
    let id = server
        .server_mut()
        .start_chain(PLAYER, request)
        .expect("nothing blocks A");
    assert_eq!(id, ChainId::new(-1));

    server.tick(DT);
    assert_chain_state!(server.manager(PLAYER), id, ChainState::Active);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    server.tick(DT);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(server.manager(PLAYER).is_retired(id));

    for _ in 0..3 {
        server.tick(DT);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let outgoing = server.server_mut().take_outgoing();
    let reasons: Vec<SyncReason> = outgoing.iter().map(|(_, record)| record.reason).collect();
    assert_eq!(reasons, vec![SyncReason::Initial, SyncReason::Initial]);
    assert_eq!(outgoing[1].1.entries[0].index, 1);

    let mut events = server.server_mut().take_events();
    let completions = events.take_completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].0, PLAYER);
}

/// Cancelling a chain tears down its forks first and queues one
/// Cancellation record per node
#[test]
fn cancel_reaches_every_fork() {
    init_logger();
    let mut server = server();
    assert!(server.start(PLAYER, InteractionType::Primary, "B"));
    let id = ChainId::new(-1);

    server.tick(DT);
    {
        let chain = server.manager(PLAYER).chain(id).expect("B is running");
        assert_eq!(chain.forks().count(), 2);
        assert!(chain.forks().all(|fork| fork.state() == ChainState::Active));
    }
    server.server_mut().take_outgoing();

    assert_eq!(server.server_mut().cancel_chains(PLAYER, id), Ok(true));
    assert_chain_state!(server.manager(PLAYER), id, ChainState::Cancelled);
    assert_no_active_nodes!(server.manager(PLAYER));

    server.tick(DT);
    let outgoing = server.server_mut().take_outgoing();
    assert!(outgoing
        .iter()
        .all(|(_, record)| record.reason == SyncReason::Cancellation));

    let root = ChainPath::root(id);
    let paths: Vec<ChainPath> = outgoing.iter().map(|(_, record)| record.path()).collect();
    assert_eq!(
        paths,
        vec![
            root.child(ForkedChainId::new(0, 0)),
            root.child(ForkedChainId::new(0, 1)),
            root,
        ]
    );

    let mut events = server.server_mut().take_events();
    let completions = events.take_completions();
    assert_eq!(completions.len(), 3);
    assert!(completions
        .iter()
        .all(|(_, completion)| completion.outcome == ChainOutcome::Cancelled));
    assert!(server.manager(PLAYER).is_retired(id));
}

/// A failing chain reports its error and leaves sibling chains running
#[test]
fn failure_is_isolated_to_its_chain() {
    init_logger();
    let mut server = server();
    assert!(server.start(PLAYER, InteractionType::Primary, "charge"));
    assert!(server.start(PLAYER, InteractionType::Secondary, "broken"));
    let charge = ChainId::new(-1);
    let broken = ChainId::new(-2);

    server.tick(DT);
    assert_chain_state!(server.manager(PLAYER), charge, ChainState::Active);
    assert!(server.manager(PLAYER).is_retired(broken));

    let events = server.server_mut().take_events();
    let failures: Vec<_> = events.failures().collect();
    assert_eq!(failures.len(), 1);
    match &failures[0].1.outcome {
        ChainOutcome::Failed(ChainError::Operation {
            path,
            entry_index,
            source,
        }) => {
            assert_eq!(path, &ChainPath::root(broken));
            assert_eq!(*entry_index, 0);
            assert_eq!(source.message(), "out of stamina");
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    server.tick(DT);
    server.tick(DT);
    assert!(server.manager(PLAYER).is_retired(charge));
    let mut events = server.server_mut().take_events();
    let completions = events.take_completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].1.outcome, ChainOutcome::Finished);
}

/// A step asking to cancel its root chain ends it with only a Cancellation record
#[test]
fn root_cancel_from_a_step() {
    init_logger();
    let mut server = server();
    assert!(server.start(PLAYER, InteractionType::Use, "abort"));

    server.tick(DT);
    let outgoing = server.server_mut().take_outgoing();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].1.reason, SyncReason::Cancellation);

    let mut events = server.server_mut().take_events();
    let completions = events.take_completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].1.outcome, ChainOutcome::Cancelled);
    assert_eq!(server.manager(PLAYER).active_chain_count(), 0);
}

/// World commands queued by steps surface in the server events, and meta
/// written by a step rides on its entry snapshot
#[test]
fn swing_queues_a_hit() {
    init_logger();
    let mut server = server();
    assert!(server.start(PLAYER, InteractionType::Primary, "swing"));
    let id = ChainId::new(-1);

    server.tick(DT);
    let damage = server
        .manager(PLAYER)
        .chain(id)
        .and_then(|chain| chain.context().meta().get(&DAMAGE))
        .and_then(MetaValue::as_int);
    assert_eq!(damage, Some(4));

    let outgoing = server.server_mut().take_outgoing();
    assert_eq!(outgoing.len(), 1);
    let delta = &outgoing[0].1.entries[0].data.meta;
    assert_eq!(delta.get(&DAMAGE), Some(Some(&MetaValue::Int(4))));
    assert!(!server.server_mut().take_events().has_world_commands());

    server.tick(DT);
    let mut events = server.server_mut().take_events();
    let commands = events.take_world_commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].issuer, PLAYER);
    assert_eq!(commands[0].target, TARGET);
    assert_eq!(commands[0].kind, "hit");
    assert_eq!(commands[0].payload, Some(MetaValue::Int(4)));
}

#[test]
fn despawn_of_unknown_entity_fails() {
    init_logger();
    let mut server = server();
    let stranger = EntityRef::from_u64(77);
    assert_eq!(
        server.server_mut().despawn_entity(stranger),
        Err(ServerError::EntityNotFound { entity: stranger })
    );
    assert_eq!(
        server.server_mut().try_start_chain(
            stranger,
            InteractionType::Primary,
            InteractionContext::new(stranger),
            "A"
        ),
        Err(ServerError::EntityNotFound { entity: stranger })
    );
}
