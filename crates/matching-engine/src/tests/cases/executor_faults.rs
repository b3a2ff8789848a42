//! Executor crash faults: 3-of-5 tolerates two missing executors; with
//! three missing the round aborts without touching the pool, and matching
//! resumes once an executor returns.

use {
    crate::tests::setup::{self, OrderSpec},
    model::order::Side,
};

fn cross(test: &setup::TestEngine, nonce: u64) {
    test.submit(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 10,
        tick: 100,
        nonce,
    });
    test.submit(&OrderSpec {
        owner: "bob",
        side: Side::Sell,
        amount: 10,
        tick: 100,
        nonce,
    });
}

#[tokio::test]
async fn two_offline_executors_do_not_change_the_result() {
    let test = setup::engine(setup::test_config());
    test.transport.set_offline(2, true);
    test.transport.set_offline(4, true);
    cross(&test, 1);

    let result = test.run_round().await.unwrap();
    assert_eq!(result.clearing_price, 100);
    assert_eq!(result.matched_volume, 10);
    assert_eq!(result.pairs.len(), 1);
    // Identical outcome to the all-online case: the Lagrange weights adapt
    // to whichever quorum answered.
    assert_eq!(test.pending(), (0, 0));
}

#[tokio::test]
async fn quorum_loss_aborts_and_recovery_resumes() {
    let test = setup::engine(setup::test_config());
    for index in [1, 2, 3] {
        test.transport.set_offline(index, true);
    }
    cross(&test, 1);

    // The round aborts; every order stays pending.
    assert!(test.run_round().await.is_none());
    assert_eq!(test.pending(), (1, 1));

    // One executor rejoining restores the quorum and the next round
    // matches as if nothing happened.
    test.transport.set_offline(1, false);
    let result = test.run_round().await.unwrap();
    assert_eq!(result.matched_volume, 10);
    assert_eq!(test.pending(), (0, 0));
}
