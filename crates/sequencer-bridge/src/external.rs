/// The two capabilities the core consumes from the settlement-layer
/// (on-chain) program. The program itself is out of scope here; this is
/// the seam an embedder supplies a concrete client for.
#[async_trait::async_trait]
pub trait SettlementLayer: Send + Sync + 'static {
    /// Current L1 Merkle root, hex-encoded.
    async fn get_merkle_root(&self) -> Result<String, crate::Error>;

    /// Submit a batch payload for settlement, returning an opaque
    /// confirmation value.
    async fn submit_batch(&self, payload: serde_json::Value) -> Result<serde_json::Value, crate::Error>;
}
