use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay policy between automatic retries of a failed upload attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Backoff cap, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplier for each subsequent retry.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Jitter as a fraction of the delay (0.25 = ±25%).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.25
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    /// Calculates the delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let ms = self.initial_delay_ms as f64 * self.backoff_factor.powi(exp);
        let capped = ms.min(self.max_delay_ms as f64);
        let jitter = capped * self.jitter.clamp(0.0, 1.0);
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / 1_000_000_000.0)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        let with_jitter = (capped + jitter * offset).max(0.0);
        Duration::from_micros((with_jitter * 1000.0).round() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30_000);
        assert!((config.backoff_factor - 2.0).abs() < f64::EPSILON);
        assert!((config.jitter - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn delay_backoff_with_jitter() {
        let config = RetryConfig::default();
        // Base delays: 1s, 2s, 4s, 8s, 16s, 30s (capped), 30s...
        let expected_base = [1.0, 2.0, 4.0, 8.0, 16.0, 30.0, 30.0];
        for (i, &base) in expected_base.iter().enumerate() {
            let delay = config.delay_for_attempt((i + 1) as u32);
            let secs = delay.as_secs_f64();
            let lo = base * 0.74;
            let hi = base * 1.26;
            assert!(
                secs >= lo && secs <= hi,
                "attempt {}: {secs:.3}s not in [{lo:.3}, {hi:.3}]",
                i + 1
            );
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let config = RetryConfig {
            initial_delay_ms: 10,
            max_delay_ms: 50,
            backoff_factor: 3.0,
            jitter: 0.0,
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(10));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(30));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(50));
        assert_eq!(config.delay_for_attempt(u32::MAX), Duration::from_millis(50));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: RetryConfig = toml::from_str("initial_delay_ms = 250").unwrap();
        assert_eq!(config.initial_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 30_000);
    }
}
