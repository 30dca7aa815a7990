use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::Config;

/// Bounded exponential backoff for collaborator calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts; used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling and capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(error = %e, attempt, ?delay, "{} failed, retrying", what);
                    if !delay.is_zero() {
                        actix_web::rt::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs `op` with retries; on exhaustion returns `fallback` marked as degraded.
    pub async fn call_with_fallback<T, E, F, Fut>(
        &self,
        what: &str,
        fallback: T,
        op: F,
    ) -> Resilient<T>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.run(what, op).await {
            Ok(value) => Resilient {
                value,
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, attempts = self.max_attempts, "{} unavailable, using fallback", what);
                Resilient {
                    value: fallback,
                    degraded: true,
                }
            }
        }
    }
}

/// A collaborator answer plus whether it is a fallback rather than a real lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Resilient<T> {
    pub value: T,
    pub degraded: bool,
}

impl<T> Resilient<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            degraded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[actix_web::test]
    async fn recovers_after_transient_failures() {
        let calls = Cell::new(0);
        let result: Resilient<bool> = RetryPolicy::immediate(3)
            .call_with_fallback("lookup", false, || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { if n < 3 { Err("timeout") } else { Ok(true) } }
            })
            .await;
        assert_eq!(result, Resilient { value: true, degraded: false });
        assert_eq!(calls.get(), 3);
    }

    #[actix_web::test]
    async fn falls_back_after_capped_attempts() {
        let calls = Cell::new(0);
        let result = RetryPolicy::immediate(2)
            .call_with_fallback("lookup", 7u32, || {
                calls.set(calls.get() + 1);
                async { Err::<u32, _>("down") }
            })
            .await;
        assert!(result.degraded);
        assert_eq!(result.value, 7);
        assert_eq!(calls.get(), 2);
    }
}
