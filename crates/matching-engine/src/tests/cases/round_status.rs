//! The status API reflects pool contents and round phases.

use {
    crate::tests::setup::{self, OrderSpec},
    model::order::{Market, Side},
};

#[tokio::test]
async fn status_tracks_pending_orders_and_phases() {
    let test = setup::engine(setup::test_config());
    let status = test.engine.round_status(&test.market).unwrap();
    assert_eq!(status.phase, "idle");
    assert_eq!(status.round_id, 0);
    assert_eq!((status.pending_buys, status.pending_sells), (0, 0));
    // Periodic matching is disabled in this configuration.
    assert_eq!(status.next_round_in_ms, 0);

    test.submit(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 3,
        tick: 10,
        nonce: 1,
    });
    let status = test.engine.round_status(&test.market).unwrap();
    assert_eq!(status.phase, "collecting");
    assert_eq!(status.pending_buys, 1);

    assert!(test.engine.round_status(&Market::from("NO/PE")).is_none());
}

#[tokio::test]
async fn unknown_market_submissions_are_rejected() {
    let test = setup::engine(setup::test_config());
    let mut request = test.request(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 3,
        tick: 10,
        nonce: 1,
    });
    request.market = "NO/PE".to_string();
    let response = test.engine.submit_order(&request);
    assert_eq!(response.reason.as_deref(), Some("unknown_market"));
}

#[tokio::test]
async fn closed_markets_reject_submissions() {
    let test = setup::engine(setup::test_config());
    test.engine.set_market_open(&test.market, false);
    let request = test.request(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 3,
        tick: 10,
        nonce: 1,
    });
    let response = test.engine.submit_order(&request);
    assert_eq!(response.reason.as_deref(), Some("market_closed"));

    test.engine.set_market_open(&test.market, true);
    test.submit(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 3,
        tick: 10,
        nonce: 2,
    });
}

#[tokio::test]
async fn duplicate_nonce_rejected_across_rounds() {
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

    // The nonce stays consumed even after the order was matched out.
    let request = test.request(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 10,
        tick: 100,
        nonce: 1,
    });
    let response = test.engine.submit_order(&request);
    assert_eq!(response.reason.as_deref(), Some("duplicate_nonce"));
}
