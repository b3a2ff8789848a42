/// The wallet collaborator. The engine never interprets addresses or
/// signature bytes itself.
pub trait SignatureVerifying: Send + Sync + 'static {
    fn verify_signature(&self, address: &str, message: &[u8], signature: &[u8]) -> bool;
}
