/// Integration tests for client prediction against the authoritative server
/// Records travel through exchange_records exactly as a transport would
/// deliver them, in order and without loss

use std::sync::Arc;

use tandem_shared::{
    from_fn, ChainId, ChainOutcome, ChainState, ChainSyncStorage, EntityRef, InteractionState,
    InteractionSyncData, InteractionType, OperationError, RootInteraction, RootInteractionMap,
    SyncApply, SyncInteractionChain, SyncReason,
};
use tandem_test::{
    assert_chain_state, exchange_records, test_roots, tick_and_exchange, tick_and_exchange_n_times,
    TestClient, TestServer,
};

const DT: f32 = 0.05;
const PLAYER: EntityRef = EntityRef::from_u64(1);

fn init_logger() {
    env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();
}

fn setup() -> (TestServer, TestClient) {
    let roots = Arc::new(test_roots());
    let server = TestServer::new(roots.clone()).with_entities(&[PLAYER]);
    let client = TestClient::new(PLAYER, roots);
    (server, client)
}

/// The server adopts a predicted chain from its Initial record and the
/// client's report checks out against authoritative execution
#[test]
fn predicted_chain_is_adopted_and_verified() {
    init_logger();
    let (mut server, mut client) = setup();
    assert!(client.start(InteractionType::Primary, "A"));
    let id = ChainId::new(1);

    tick_and_exchange(&mut server, &mut [&mut client], DT);
    {
        let chain = server.manager(PLAYER).chain(id).expect("server adopted the chain");
        let entry = chain.entry(0).expect("entry 0 executed");
        assert!(entry.client_state().is_some());
        assert!(!entry.is_desynced());
    }

    tick_and_exchange(&mut server, &mut [&mut client], DT);
    assert!(client.manager().is_retired(id));
    assert!(server.manager(PLAYER).is_retired(id));

    let client_done = client.manager_mut().take_completions();
    assert_eq!(client_done.len(), 1);
    assert_eq!(client_done[0].outcome, ChainOutcome::Finished);

    let mut events = server.server_mut().take_events();
    let server_done = events.take_completions();
    assert_eq!(server_done.len(), 1);
    assert_eq!(server_done[0].1.outcome, ChainOutcome::Finished);

    // late server records for the retired chain are dropped quietly
    tick_and_exchange_n_times(&mut server, &mut [&mut client], DT, 2);
    assert_eq!(client.manager().chains().count(), 0);
}

/// A client start the server refuses comes back as a Cancellation, which
/// the client applies without echoing it
#[test]
fn refused_remote_start_is_cancelled_without_echo() {
    init_logger();
    let (mut server, mut client) = setup();
    assert!(server.start(PLAYER, InteractionType::Secondary, "guard"));
    tick_and_exchange(&mut server, &mut [&mut client], DT);

    // the client has not applied the guard record yet, so it predicts freely
    assert!(client.start(InteractionType::Use, "charge"));
    let charge = ChainId::new(1);
    tick_and_exchange(&mut server, &mut [&mut client], DT);
    assert!(server.manager(PLAYER).chain(charge).is_none());
    assert_chain_state!(client.manager(), charge, ChainState::Active);

    client.tick(DT);
    let outgoing = client.take_outgoing();
    assert!(outgoing
        .iter()
        .all(|record| record.reason != SyncReason::Cancellation));
    assert!(client.manager().is_retired(charge));

    let completions = client.manager_mut().take_completions();
    let cancelled: Vec<_> = completions
        .iter()
        .filter(|completion| completion.path.chain_id() == charge)
        .collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].outcome, ChainOutcome::Cancelled);

    // the client now follows the server's guard chain
    assert_chain_state!(client.manager(), ChainId::new(-1), ChainState::Active);
}

/// Forks the server spawned are created on the client from their records,
/// then claimed when the client's own execution reaches them
#[test]
fn server_forks_are_claimed_by_prediction() {
    init_logger();
    let (mut server, mut client) = setup();
    assert!(server.start(PLAYER, InteractionType::Primary, "B"));
    let id = ChainId::new(-1);
    tick_and_exchange(&mut server, &mut [&mut client], DT);

    client.tick(DT);
    let chain = client.manager().chain(id).expect("client follows B");
    assert_eq!(chain.forks().count(), 2);
    assert!(chain.forks().all(|fork| !fork.is_remote_created()));
    assert!(chain
        .nodes()
        .iter()
        .all(|node| node.entries().all(|entry| !entry.is_desynced())));
}

/// The server flags a client report whose terminal state disagrees and
/// answers with a Correction
#[test]
fn diverging_terminal_state_is_corrected() {
    init_logger();
    let server_roots = Arc::new(test_roots());
    let client_roots = Arc::new(RootInteractionMap::new().with(
        RootInteraction::new("drink")
            .with_step(from_fn(|_, _| Err(OperationError::new("spilled")))),
    ));
    let mut server = TestServer::new(server_roots).with_entities(&[PLAYER]);
    let mut client = TestClient::new(PLAYER, client_roots);

    assert!(client.start(InteractionType::Use, "drink"));
    client.tick(DT);
    let reports = client.take_outgoing();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].entries[0].data.state, InteractionState::Failed);
    for record in reports {
        server
            .server_mut()
            .receive_record(PLAYER, record)
            .expect("player is spawned");
    }

    server.tick(DT);
    let outgoing = server.server_mut().take_outgoing();
    assert_eq!(outgoing.len(), 1);
    let (entity, correction) = &outgoing[0];
    assert_eq!(*entity, PLAYER);
    assert_eq!(correction.reason, SyncReason::Correction);
    assert_eq!(correction.chain_id, ChainId::new(1));
    assert_eq!(correction.entries[0].data.state, InteractionState::Finished);
}

/// A client view injected against an existing server baseline raises the
/// desync flag; the next tick answers it with one Correction and clears it
#[test]
fn desync_against_baseline_is_corrected_next_tick() {
    init_logger();
    let mut server = TestServer::new(Arc::new(test_roots())).with_entities(&[PLAYER]);
    assert!(server.start(PLAYER, InteractionType::Primary, "charge"));
    let id = ChainId::new(-1);

    server.tick(DT);
    let initial = server.server_mut().take_outgoing();
    assert_eq!(initial.len(), 1);
    assert_eq!(initial[0].1.reason, SyncReason::Initial);

    let report = InteractionSyncData::new(InteractionState::NotFinished, "charge".into(), 2);
    let applied = server
        .manager_mut(PLAYER)
        .chain_mut(id)
        .and_then(|chain| chain.entry_mut(0))
        .map(|entry| entry.set_client_state(0, report));
    assert_eq!(applied, Some(SyncApply::Desync));
    let desynced = |server: &TestServer| {
        server
            .manager(PLAYER)
            .chain(id)
            .and_then(|chain| chain.entry(0))
            .map(|entry| entry.is_desynced())
    };
    assert_eq!(desynced(&server), Some(true));

    server.tick(DT);
    let outgoing = server.server_mut().take_outgoing();
    log::info!("Server answered the desync with {} records", outgoing.len());
    assert_eq!(outgoing.len(), 1);
    let (entity, correction) = &outgoing[0];
    assert_eq!(*entity, PLAYER);
    assert_eq!(correction.reason, SyncReason::Correction);
    assert_eq!(correction.chain_id, id);
    assert_eq!(correction.entries[0].index, 0);
    assert_eq!(correction.entries[0].data.operation_counter, 0);
    assert_eq!(desynced(&server), Some(false));

    server.tick(DT);
    assert!(server
        .server_mut()
        .take_outgoing()
        .iter()
        .all(|(_, record)| record.reason != SyncReason::Correction));
}

/// A Correction fast-forwards a lagging prediction past the step the
/// server already finished
#[test]
fn correction_fast_forwards_prediction() {
    init_logger();
    let (mut server, mut client) = setup();
    assert!(client.start(InteractionType::Primary, "charge"));
    let id = ChainId::new(1);
    client.tick(DT);
    client.take_outgoing();

    let correction = SyncInteractionChain::new(
        client.manager().chain(id).expect("charge runs").path(),
        InteractionType::Primary,
        "charge".into(),
        SyncReason::Correction,
    )
    .with_entry(
        0,
        0,
        InteractionSyncData::new(InteractionState::Finished, "charge".into(), 0),
    );
    client.receive(std::iter::once(correction));

    client.tick(DT);
    assert!(client.manager().is_retired(id));
    let completions = client.manager_mut().take_completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].outcome, ChainOutcome::Finished);

    // nothing was ever sent to the server in this test
    assert_eq!(exchange_records(&mut server, &mut [&mut client]), 0);
}

/// Cancelling a predicted chain on the client cancels the server's copy
#[test]
fn client_cancel_reaches_the_server() {
    init_logger();
    let (mut server, mut client) = setup();
    assert!(client.start(InteractionType::Primary, "charge"));
    let id = ChainId::new(1);
    tick_and_exchange(&mut server, &mut [&mut client], DT);
    assert_chain_state!(server.manager(PLAYER), id, ChainState::Active);

    assert!(client.manager_mut().cancel_chains(id));
    client.tick(DT);
    exchange_records(&mut server, &mut [&mut client]);
    server.tick(DT);

    assert!(server.manager(PLAYER).is_retired(id));
    let mut events = server.server_mut().take_events();
    let completions = events.take_completions();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].1.outcome, ChainOutcome::Cancelled);
    // the server does not send the cancellation back
    assert!(server
        .server_mut()
        .take_outgoing()
        .iter()
        .all(|(_, record)| record.reason != SyncReason::Cancellation));
}
