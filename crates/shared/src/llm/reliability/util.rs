use std::time::Duration;

pub(crate) fn retry_delay(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::from_millis(base_ms.min(max_ms));
    }

    let capped_exponent = attempt.saturating_sub(1).min(20);
    let multiplier = 1_u64 << capped_exponent;

    Duration::from_millis(base_ms.saturating_mul(multiplier).min(max_ms))
}
