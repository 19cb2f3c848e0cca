use rand::RngCore;
use sha2::{Digest, Sha256};

/// `SHA256(sequencerKey ‖ millis ‖ counter ‖ 16 random bytes)`, truncated
/// to its first 16 hex characters (8 bytes). Includes both a counter and
/// random bytes so two checkpoints created within the same millisecond
/// never collide, even under a deterministic test RNG that always returns
/// the same bytes.
pub fn generate(sequencer_key: &str, millis: i64, counter: u64) -> String {
    let mut rng = rand::thread_rng();
    let mut random_bytes = [0u8; 16];
    rng.fill_bytes(&mut random_bytes);
    generate_with_random(sequencer_key, millis, counter, &random_bytes)
}

pub(crate) fn generate_with_random(
    sequencer_key: &str,
    millis: i64,
    counter: u64,
    random_bytes: &[u8; 16],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sequencer_key.as_bytes());
    hasher.update(millis.to_be_bytes());
    hasher.update(counter.to_be_bytes());
    hasher.update(random_bytes);
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_16_hex_chars() {
        let id = generate("seq-key", 1_700_000_000_000, 0);
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn differs_with_counter_even_with_same_random_bytes() {
        let random_bytes = [7u8; 16];
        let a = generate_with_random("seq-key", 100, 0, &random_bytes);
        let b = generate_with_random("seq-key", 100, 1, &random_bytes);
        assert_ne!(a, b);
    }
}
