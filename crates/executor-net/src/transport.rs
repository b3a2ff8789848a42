use phantom_crypto::{
    Point, Scalar,
    elgamal::{BatchPartialDecryption, PartialDecryption},
};

/// Opaque executor address, interpreted only by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(pub String);

/// The closed set of messages the coordinator sends to executors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    PartialDecrypt {
        c1: Point,
    },
    BatchPartialDecrypt {
        c1s: Vec<Point>,
    },
    /// First round of threshold signing: commit to the signing nonce for
    /// this session.
    NonceCommit {
        session: u64,
        message: [u8; 32],
    },
    /// Second round: respond to the aggregated challenge.
    PartialSign {
        session: u64,
        message: [u8; 32],
        challenge: Scalar,
    },
    Heartbeat,
}

/// Executor replies, one variant per request kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    PartialDecrypt(PartialDecryption),
    BatchPartialDecrypt(BatchPartialDecryption),
    NonceCommit { index: u32, commitment: Point },
    PartialSign { index: u32, share: Scalar },
    Heartbeat { index: u32 },
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// The transport collaborator. Real deployments put a network here; tests
/// and the demo binary use [`crate::LocalTransport`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, endpoint: &Endpoint, request: Request)
    -> Result<Response, TransportError>;
}
