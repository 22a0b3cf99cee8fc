//! 启动步骤重试
//!
//! 指数退避，单次等待不超过 `max_delay`

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use storefront_config::RetryPolicy;
use tracing::{info, warn};

use crate::state::BootstrapStep;

/// 第 `failures` 次失败之后的等待时间（从 1 开始计数）
pub fn backoff_delay(policy: &RetryPolicy, failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(i32::MAX as u32) as i32;
    let scaled = policy.initial_delay.as_secs_f64() * policy.multiplier.powi(exponent);

    if !scaled.is_finite() || scaled >= policy.max_delay.as_secs_f64() {
        policy.max_delay
    } else {
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

/// 按策略重复执行一个启动步骤
///
/// 至少执行一次；所有尝试都失败时返回最后一次的错误。
pub async fn retry_step<F, Fut, T, E>(
    policy: &RetryPolicy,
    step: BootstrapStep,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut failures = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if failures > 0 {
                    info!(
                        step = step.as_str(),
                        attempts = failures + 1,
                        "{} recovered after retry",
                        step
                    );
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        failures += 1;
        if failures >= max_attempts {
            if max_attempts > 1 {
                warn!(
                    step = step.as_str(),
                    max_attempts,
                    error = %error,
                    "{} failed, retries exhausted",
                    step
                );
            }
            return Err(error);
        }

        let delay = backoff_delay(policy, failures);
        warn!(
            step = step.as_str(),
            attempt = failures,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "{} failed, retrying",
            step
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(3),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_backoff_doubles_until_capped() {
        let policy = policy(10);
        let delays: Vec<u64> = (1..=5)
            .map(|n| backoff_delay(&policy, n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![500, 1000, 2000, 3000, 3000]);
    }

    #[test]
    fn test_backoff_survives_huge_exponent() {
        assert_eq!(backoff_delay(&policy(2), u32::MAX), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = Cell::new(0);
        let started = Instant::now();

        let result: Result<&str, String> =
            retry_step(&policy(4), BootstrapStep::CheckDependency, || {
                calls.set(calls.get() + 1);
                let call = calls.get();
                async move {
                    if call < 3 {
                        Err(format!("connection refused ({call})"))
                    } else {
                        Ok("ready")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ready");
        assert_eq!(calls.get(), 3);
        // 500ms + 1000ms 的退避
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500) && elapsed < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_last_error_when_exhausted() {
        let calls = Cell::new(0);

        let result: Result<(), String> =
            retry_step(&policy(3), BootstrapStep::SynchronizeSchema, || {
                calls.set(calls.get() + 1);
                let call = calls.get();
                async move { Err(format!("attempt {call}")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "attempt 3");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_default_policy_fails_fast() {
        let calls = Cell::new(0);
        let started = Instant::now();

        let result: Result<(), &str> =
            retry_step(&RetryPolicy::default(), BootstrapStep::CheckDependency, || {
                calls.set(calls.get() + 1);
                async { Err("database does not answer") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = Cell::new(0);

        let _: Result<(), &str> = retry_step(&policy(0), BootstrapStep::CheckDependency, || {
            calls.set(calls.get() + 1);
            async { Err("nope") }
        })
        .await;

        assert_eq!(calls.get(), 1);
    }
}
