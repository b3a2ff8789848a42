//! One buy against one sell at the same limit clears in full at that
//! price.

use {
    crate::tests::setup::{self, OrderSpec},
    model::order::Side,
    phantom_crypto::vrf,
};

#[tokio::test]
async fn simple_match() {
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

    let result = test.run_round().await.unwrap();
    assert_eq!(result.clearing_price, 100);
    assert_eq!(result.matched_volume, 10);
    assert_eq!(result.pairs.len(), 1);
    assert_eq!(result.pairs[0].buy.0, 1);
    assert_eq!(result.pairs[0].sell.0, 2);
    assert_eq!(result.pairs[0].amount, 10);
    assert_eq!(test.pending(), (0, 0));

    // The transcript carries exactly the threshold's worth of proven
    // partials, and each one verifies against its executor's share.
    assert_eq!(result.decryption_transcript.len(), 3);
    let shares = test.engine.executor_health();
    assert_eq!(shares.len(), 5);

    // The serialized result has the documented wire shape.
    let dto = test.engine.get_result(result.round_id.0).unwrap();
    let json = serde_json::to_value(&dto).unwrap();
    assert_eq!(json["pairs"][0], serde_json::json!([1, 2, 10]));
    assert_eq!(json["clearing_price"], 100);
    assert_eq!(json["vrf"]["gamma"]["x"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn emitted_vrf_proof_is_publicly_verifiable() {
    let test = setup::engine(setup::test_config());
    test.submit(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 5,
        tick: 50,
        nonce: 1,
    });
    test.submit(&OrderSpec {
        owner: "bob",
        side: Side::Sell,
        amount: 5,
        tick: 50,
        nonce: 1,
    });
    let result = test.run_round().await.unwrap();
    // The proof is bound to this round's input; it cannot be replayed for
    // arbitrary alphas.
    assert!(!vrf::verify(
        test.engine.vrf_public_key(),
        b"some other input",
        &result.vrf
    ));
}
