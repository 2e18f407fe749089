use std::time::Duration;

use rand::Rng;

const BASE_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);
const BACKOFF_FACTOR: u32 = 2;
const JITTER_FRACTION: f64 = 0.25;

/// Exponential backoff with ±25% jitter, base 100ms / factor 2 / cap 5s
/// (§4.4). `attempt` is zero-based (the delay before the *next* retry).
pub fn backoff_with_jitter(attempt: u32) -> Duration {
    let exp_ms = BASE_RETRY_DELAY
        .as_millis()
        .saturating_mul(BACKOFF_FACTOR.pow(attempt) as u128);
    let capped_ms = exp_ms.min(MAX_RETRY_DELAY.as_millis()) as f64;
    let jitter = rand::rng().random_range(-JITTER_FRACTION..=JITTER_FRACTION);
    let jittered_ms = (capped_ms * (1.0 + jitter)).max(0.0);
    Duration::from_millis(jittered_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_at_zero_attempt_is_near_base() {
        let d = backoff_with_jitter(0);
        assert!(d.as_millis() <= 125, "got {d:?}");
    }

    #[test]
    fn backoff_is_bounded_by_cap_plus_jitter() {
        for attempt in 0..10 {
            let d = backoff_with_jitter(attempt);
            assert!(
                d.as_millis() <= MAX_RETRY_DELAY.as_millis() + MAX_RETRY_DELAY.as_millis() / 4
            );
        }
    }

    #[test]
    fn backoff_grows_with_attempt_on_average() {
        let low: u128 = (0..200).map(|_| backoff_with_jitter(0).as_millis()).sum();
        let high: u128 = (0..200).map(|_| backoff_with_jitter(3).as_millis()).sum();
        assert!(high > low);
    }
}
