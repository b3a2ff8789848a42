//! A book whose best bid sits below the best ask produces an empty result
//! and returns both sides.

use {
    crate::tests::setup::{self, OrderSpec},
    model::order::Side,
};

#[tokio::test]
async fn no_cross() {
    let test = setup::engine(setup::test_config());
    test.submit(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 10,
        tick: 90,
        nonce: 1,
    });
    test.submit(&OrderSpec {
        owner: "bob",
        side: Side::Sell,
        amount: 10,
        tick: 110,
        nonce: 1,
    });

    let result = test.run_round().await.unwrap();
    assert!(result.pairs.is_empty());
    assert_eq!(result.matched_volume, 0);
    assert_eq!(result.clearing_price, 0);
    assert_eq!(test.pending(), (1, 1));

    // Nothing was consumed: the same orders cross once a matching sell
    // arrives.
    test.submit(&OrderSpec {
        owner: "carol",
        side: Side::Sell,
        amount: 10,
        tick: 80,
        nonce: 1,
    });
    let result = test.run_round().await.unwrap();
    assert_eq!(result.matched_volume, 10);
}

#[tokio::test]
async fn empty_market_produces_no_round_result() {
    let test = setup::engine(setup::test_config());
    assert!(test.run_round().await.is_none());
}
