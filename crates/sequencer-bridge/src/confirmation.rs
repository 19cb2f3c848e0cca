/// Adaptive confirmation level for an operation of `amount`, per §4.3:
/// high-value transfers wait for more L1 confirmations, dust moves
/// immediately. Non-decreasing in `amount` and always within
/// `[min_conf, max_conf]` (P1).
pub fn adaptive_confirmations(amount: u128, min_conf: u32, max_conf: u32, high_value_threshold: u128) -> u32 {
    if high_value_threshold == 0 || amount >= high_value_threshold {
        return max_conf;
    }
    let span = (max_conf - min_conf) as u128;
    let scaled = (amount * span) / high_value_threshold;
    (min_conf + scaled as u32).clamp(min_conf, max_conf)
}
