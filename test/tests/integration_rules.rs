/// Integration tests for start gating: blocking, interrupting and cooldowns
/// A refused start must leave the entity's chains untouched

use std::sync::Arc;

use tandem_server::ServerError;
use tandem_shared::{
    ChainId, ChainState, EntityRef, InteractionContext, InteractionType, StartError, StartRequest,
};
use tandem_test::{assert_chain_state, test_roots, TestServer};

const DT: f32 = 0.05;
const PLAYER: EntityRef = EntityRef::from_u64(1);

fn init_logger() {
    env_logger::builder().is_test(true).try_init().ok();
}

fn server() -> TestServer {
    TestServer::new(Arc::new(test_roots())).with_entities(&[PLAYER])
}

#[test]
fn guard_blocks_use() {
    init_logger();
    let mut server = server();
    assert!(server.start(PLAYER, InteractionType::Secondary, "guard"));
    let guard = ChainId::new(-1);
    server.tick(DT);

    let request = StartRequest::new(InteractionType::Use, InteractionContext::new(PLAYER), "drink");
    assert_eq!(
        server.server_mut().start_chain(PLAYER, request),
        Err(ServerError::Start {
            entity: PLAYER,
            source: StartError::Blocked {
                interaction_type: InteractionType::Use,
                blocked_by: guard,
            },
        })
    );
    assert_eq!(server.manager(PLAYER).chains().count(), 1);
    // the refused start did not arm the drink cooldown
    assert!(!server.manager(PLAYER).cooldowns().is_active("drink"));

    assert!(server.start(PLAYER, InteractionType::Primary, "charge"));
}

#[test]
fn same_type_blocks_a_second_chain() {
    init_logger();
    let mut server = server();
    assert!(server.start(PLAYER, InteractionType::Primary, "charge"));
    assert!(!server.start(PLAYER, InteractionType::Primary, "swing"));
    assert_eq!(server.manager(PLAYER).chains().count(), 1);
}

#[test]
fn dodge_interrupts_primary() {
    init_logger();
    let mut server = server();
    assert!(server.start(PLAYER, InteractionType::Primary, "charge"));
    let charge = ChainId::new(-1);
    server.tick(DT);
    server.server_mut().take_outgoing();

    assert!(server.start(PLAYER, InteractionType::Ability1, "dodge"));
    assert_chain_state!(server.manager(PLAYER), charge, ChainState::Cancelled);
    assert_chain_state!(server.manager(PLAYER), ChainId::new(-2), ChainState::Active);

    server.tick(DT);
    let outgoing = server.server_mut().take_outgoing();
    let cancelled: Vec<_> = outgoing
        .iter()
        .filter(|(_, record)| record.chain_id == charge)
        .collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(
        cancelled[0].1.reason,
        tandem_shared::SyncReason::Cancellation
    );
}

#[test]
fn cooldown_gates_restart_until_it_runs_out() {
    init_logger();
    let mut server = server();
    assert!(server.start(PLAYER, InteractionType::Use, "drink"));
    server.tick(0.5);
    assert!(server.manager(PLAYER).cooldowns().is_active("drink"));
    assert!(!server.start(PLAYER, InteractionType::Use, "drink"));

    server.tick(0.6);
    assert!(!server.manager(PLAYER).cooldowns().is_active("drink"));
    assert!(server.start(PLAYER, InteractionType::Use, "drink"));
}
