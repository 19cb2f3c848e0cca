/// Deposit (L1→L2) or withdrawal (L2→L1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Deposit,
    Withdrawal,
}

/// Monotonic status progression: `Pending -> (ProcessingOptimistic?) ->
/// Processing -> (Succeeded | Failed)`. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OperationStatus {
    Pending,
    ProcessingOptimistic,
    Processing,
    Succeeded,
    Failed,
}

/// A single deposit or withdrawal operation, §3 "Operation".
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Operation {
    pub id: String,
    pub kind: OperationKind,
    pub amount: u128,
    pub sender: String,
    pub recipient: String,
    pub token: Option<String>,
    pub priority: u32,
    pub confirmations: u32,
    /// Ordered sibling hashes, hex-encoded, present only for withdrawals.
    pub proof: Option<Vec<String>>,
    pub created_at_ms: i64,
    pub status: OperationStatus,
}

/// Input accepted by `deposit`.
#[derive(Debug, Clone)]
pub struct DepositParams {
    pub amount: u128,
    pub sender: String,
    pub recipient: String,
    pub token: Option<String>,
    pub priority: u32,
}

/// Input accepted by `withdraw`. `proof` is mandatory (§4.3).
#[derive(Debug, Clone)]
pub struct WithdrawParams {
    pub amount: u128,
    pub sender: String,
    pub recipient: String,
    pub token: Option<String>,
    pub priority: u32,
    pub proof: Vec<String>,
}

/// Params validation shared by `deposit` and `withdraw` (§3 invariants:
/// amounts strictly positive, sender/recipient non-empty).
pub fn validate_amount_and_parties(amount: u128, sender: &str, recipient: &str) -> Result<(), crate::Error> {
    if amount == 0 {
        return Err(crate::Error::ValidationFailed("amount must be strictly positive".into()));
    }
    if sender.is_empty() {
        return Err(crate::Error::ValidationFailed("sender must not be empty".into()));
    }
    if recipient.is_empty() {
        return Err(crate::Error::ValidationFailed("recipient must not be empty".into()));
    }
    Ok(())
}

/// Random 128-bit identifier, rendered as lowercase hex (32 chars), per
/// §9 "Deterministic IDs: Operation IDs are 128 random bits".
pub fn generate_operation_id() -> String {
    let mut bytes = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    hex::encode(bytes)
}
