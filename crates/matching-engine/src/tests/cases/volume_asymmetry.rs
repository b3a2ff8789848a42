//! Buys totalling 15 against sells totalling 10: exactly 10 units match
//! and the 5-unit buy tail returns to the pool.

use {
    crate::tests::setup::{self, OrderSpec},
    model::order::Side,
};

#[tokio::test]
async fn volume_asymmetry() {
    let test = setup::engine(setup::test_config());
    test.submit(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 10,
        tick: 100,
        nonce: 1,
    });
    test.submit(&OrderSpec {
        owner: "carol",
        side: Side::Buy,
        amount: 5,
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

    let result = test.run_round().await.unwrap();
    assert_eq!(result.matched_volume, 10);
    assert_eq!(result.clearing_price, 100);
    let total_paired: u64 = result.pairs.iter().map(|pair| pair.amount).sum();
    assert_eq!(total_paired, 10);
    // 5 units of buy interest survive; which buy order carries them is
    // decided by the shuffled pairing sequence.
    assert_eq!(test.pending(), (1, 0));

    // The leftover buy matches a fresh sell in the next round.
    test.submit(&OrderSpec {
        owner: "dave",
        side: Side::Sell,
        amount: 5,
        tick: 100,
        nonce: 1,
    });
    let result = test.run_round().await.unwrap();
    assert_eq!(result.matched_volume, 5);
    assert_eq!(test.pending(), (0, 0));
}
