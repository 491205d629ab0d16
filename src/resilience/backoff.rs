//! Exponential backoff with jitter between origin attempts.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay before attempt `attempt + 1`, given `attempt` attempts so far.
///
/// `base * 2^(attempt-1)`, capped at `max`, plus up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

/// [`calculate_backoff`] with the delays from the retry configuration.
pub fn origin_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_until_cap() {
        let first = calculate_backoff(1, 100, 2000).as_millis();
        assert!((100..110).contains(&first));

        let second = calculate_backoff(2, 100, 2000).as_millis();
        assert!((200..220).contains(&second));

        let capped = calculate_backoff(10, 100, 1000).as_millis();
        assert!((1000..1100).contains(&capped));
    }

    #[test]
    fn test_zero_attempts_no_delay() {
        assert_eq!(calculate_backoff(0, 100, 1000), Duration::ZERO);
    }

    #[test]
    fn test_uses_config_delays() {
        let config = RetryConfig {
            base_delay_ms: 5,
            max_delay_ms: 5,
            ..RetryConfig::default()
        };
        assert_eq!(origin_backoff(3, &config), Duration::from_millis(5));
    }
}
