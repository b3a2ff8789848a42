//! Submissions whose range proof does not verify are rejected with
//! `SolvencyFailed` and leave no trace in the pool.

use {
    crate::tests::setup::{self, OrderSpec},
    model::{dto::PointDto, order::Side},
    phantom_crypto::{Point, curve::Scalar, rangeproof},
};

#[tokio::test]
async fn solvency_rejection() {
    let test = setup::engine(setup::test_config());
    let spec = OrderSpec {
        owner: "mallory",
        side: Side::Buy,
        amount: 10,
        tick: 100,
        nonce: 1,
    };
    let mut request = test.request(&spec);

    // Swap in a commitment the proof does not cover, re-signing over it so
    // the signature check passes and the solvency check is what fails.
    let (other_commitment, _) = rangeproof::prove(
        &test.generators,
        999,
        Scalar::from_u64(7),
        &mut rand::rngs::OsRng,
    )
    .unwrap();
    request.solvency_commitment = PointDto::try_from(other_commitment).unwrap();
    let message = model::order::Order::signing_message(
        &model::order::Owner("mallory".to_string()),
        &test.market,
        Side::Buy,
        other_commitment,
        model::order::Nonce(1),
        model::time::Timestamp(1),
    );
    request.signature = hex::encode(setup::sign("mallory", &message));

    let response = test.engine.submit_order(&request);
    assert!(!response.accepted);
    assert_eq!(response.reason.as_deref(), Some("solvency_failed"));
    assert_eq!(test.pending(), (0, 0));
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let test = setup::engine(setup::test_config());
    let mut request = test.request(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 10,
        tick: 100,
        nonce: 1,
    });
    // Flip the side; the signature no longer covers the order.
    request.side = model::dto::SideDto::Sell;
    let response = test.engine.submit_order(&request);
    assert!(!response.accepted);
    assert_eq!(response.reason.as_deref(), Some("invalid_signature"));
}

#[tokio::test]
async fn malformed_points_are_rejected_at_the_boundary() {
    let test = setup::engine(setup::test_config());
    let mut request = test.request(&OrderSpec {
        owner: "alice",
        side: Side::Buy,
        amount: 10,
        tick: 100,
        nonce: 1,
    });
    request.encrypted_amount.c1 = PointDto::try_from(Point::generator()).unwrap();
    request.encrypted_amount.c1.x = "zz".repeat(32);
    let response = test.engine.submit_order(&request);
    assert!(!response.accepted);
}
