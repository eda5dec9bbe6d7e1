//! Backoff strategies for retrying failed mutations

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff strategy for mutation retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base * attempt`
    #[default]
    Linear,
    /// `base * 2^(attempt - 1)`
    Exponential,
    /// `base * fib(attempt)` with fib(1) = fib(2) = 1
    Fibonacci,
}

impl BackoffStrategy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, base: Duration, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let factor: u32 = match self {
            BackoffStrategy::Linear => attempt,
            BackoffStrategy::Exponential => 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX),
            BackoffStrategy::Fibonacci => fibonacci(attempt),
        };
        base.saturating_mul(factor)
    }
}

fn fibonacci(n: u32) -> u32 {
    let (mut previous, mut current) = (0u32, 1u32);
    for _ in 1..n {
        let next = previous.saturating_add(current);
        previous = current;
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(1000);

    #[test]
    fn test_linear_multiplies_by_attempt() {
        let delays: Vec<_> = (1..=3)
            .map(|attempt| BackoffStrategy::Linear.delay(BASE, attempt))
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(3000)
            ]
        );
    }

    #[test]
    fn test_exponential_and_fibonacci() {
        assert_eq!(
            BackoffStrategy::Exponential.delay(BASE, 4),
            Duration::from_millis(8000)
        );
        assert_eq!(
            BackoffStrategy::Fibonacci.delay(BASE, 5),
            Duration::from_millis(5000)
        );
    }

    #[test]
    fn test_huge_attempts_saturate() {
        let delay = BackoffStrategy::Exponential.delay(BASE, 64);
        assert!(delay >= Duration::from_secs(1000));
    }
}
