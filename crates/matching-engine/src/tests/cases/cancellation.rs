//! Order cancellation is idempotent; round cancellation restores the pool.

use {
    crate::tests::setup::{self, OrderSpec},
    model::order::Side,
    std::time::Duration,
};

#[tokio::test]
async fn cancel_order_is_idempotent() {
    let test = setup::engine(setup::test_config());
    test.submit(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 10,
        tick: 100,
        nonce: 1,
    });

    assert!(test.engine.cancel_order("alice", 1).cancelled);
    assert!(!test.engine.cancel_order("alice", 1).cancelled);
    assert!(!test.engine.cancel_order("alice", 99).cancelled);
    assert_eq!(test.pending(), (0, 0));
}

#[tokio::test]
async fn matched_orders_cannot_be_cancelled() {
    let test = setup::engine(setup::test_config());
    test.submit(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 10,
        tick: 100,
        nonce: 1,
    });
    test.submit(&OrderSpec {
        owner: "bob",
        side: Side::Sell,
        amount: 10,
        tick: 100,
        nonce: 1,
    });
    test.run_round().await.unwrap();
    assert!(!test.engine.cancel_order("alice", 1).cancelled);
}

#[tokio::test]
async fn cancelling_a_round_restores_the_pool() {
    let test = setup::engine(setup::test_config());
    test.submit(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 10,
        tick: 100,
        nonce: 1,
    });
    test.submit(&OrderSpec {
        owner: "bob",
        side: Side::Sell,
        amount: 10,
        tick: 100,
        nonce: 1,
    });

    // Stall the whole network so the round parks in the decryption phase,
    // then cancel. Cancellation applies once the external calls resolve.
    for index in 1..=5 {
        test.transport.set_stalled(index, true);
    }
    let previous = test.engine.round_status(&test.market).unwrap().round_id;
    test.engine.trigger(&test.market);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(test.engine.cancel_round(&test.market));

    // Wait for the round to unwind.
    for _ in 0..500 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let status = test.engine.round_status(&test.market).unwrap();
        if status.round_id > previous && status.phase == "idle" {
            break;
        }
    }
    let status = test.engine.round_status(&test.market).unwrap();
    assert_eq!(status.phase, "idle");
    // No result was emitted and the orders are back, untouched.
    assert!(test.engine.result(model::round::RoundId(previous + 1)).is_none());
    assert_eq!(test.pending(), (1, 1));

    // Cancelling with no round in flight reports so.
    assert!(!test.engine.cancel_round(&test.market));
}
