use sha2::{Digest, Sha256};

/// Leaf = `SHA256(canonical JSON {sender, amount})`, §4.3 "Merkle
/// verification". Field order is fixed (sender, then amount) so the same
/// logical leaf always hashes identically regardless of caller-side
/// struct field order.
pub fn leaf_hash(sender: &str, amount: u128) -> [u8; 32] {
    let canonical = serde_json::json!({ "sender": sender, "amount": amount_to_json(amount) });
    let bytes = serde_json::to_vec(&canonical).expect("json encoding of primitives cannot fail");
    Sha256::digest(&bytes).into()
}

fn amount_to_json(amount: u128) -> serde_json::Value {
    // u128 exceeds serde_json::Number's native range for very large
    // values; for amounts within i64/u64 range (every realistic base-unit
    // balance) this still serializes as a bare JSON number, matching the
    // `{"sender":"A","amount":10}` example in §8 scenario 2.
    if let Ok(v) = u64::try_from(amount) {
        serde_json::Value::Number(v.into())
    } else {
        serde_json::Value::String(amount.to_string())
    }
}

/// Fold one sibling into `cur` using bitcoin-style ordered pairs: the
/// lexicographically smaller of `(cur, sibling)` is hashed first.
fn fold(cur: [u8; 32], sibling: [u8; 32]) -> [u8; 32] {
    let (first, second) = if cur <= sibling { (cur, sibling) } else { (sibling, cur) };
    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update(second);
    hasher.finalize().into()
}

/// Verify a proof (ordered sibling sequence, hex-encoded) against
/// `expected_root_hex`, returning the folded root either way so callers
/// can log/cache it. `Ok(true)` iff the fold matches the given root.
pub fn verify(sender: &str, amount: u128, proof_hex: &[String], expected_root_hex: &str) -> Result<bool, crate::Error> {
    let mut cur = leaf_hash(sender, amount);
    for sibling_hex in proof_hex {
        let sibling = decode_sibling(sibling_hex)?;
        cur = fold(cur, sibling);
    }
    let expected = decode_sibling(expected_root_hex)?;
    Ok(cur == expected)
}

fn decode_sibling(hex_str: &str) -> Result<[u8; 32], crate::Error> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| crate::Error::ValidationFailed(format!("invalid hex in merkle proof: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| crate::Error::ValidationFailed("merkle proof entries must be 32 bytes".into()))
}
