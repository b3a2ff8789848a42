use executor_net::ThresholdSignature;

/// Identifier of the settlement transaction, opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxId(pub String);

#[derive(Debug, thiserror::Error)]
#[error("settlement submission failed: {0}")]
pub struct SettlementError(pub String);

/// The settlement sink collaborator: consumes a threshold-signed batch
/// commitment and eventually lands it on chain. Failures here never undo an
/// emitted result; they are logged and counted.
#[async_trait::async_trait]
pub trait SettlementSubmitting: Send + Sync + 'static {
    async fn submit(
        &self,
        batch_commitment: [u8; 32],
        signature: ThresholdSignature,
    ) -> Result<TxId, SettlementError>;
}

/// Default sink for deployments without a chain connection: logs the batch
/// and acknowledges with a commitment-derived id.
pub struct LoggingSettlement;

#[async_trait::async_trait]
impl SettlementSubmitting for LoggingSettlement {
    async fn submit(
        &self,
        batch_commitment: [u8; 32],
        _signature: ThresholdSignature,
    ) -> Result<TxId, SettlementError> {
        let id = hex::encode(&batch_commitment[..8]);
        tracing::info!(commitment = %hex::encode(batch_commitment), "batch submitted");
        Ok(TxId(format!("local-{id}")))
    }
}
