//! Retry with linear backoff for throttled API calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Retry policy for "too many requests" responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Wait after attempt `n` is `backoff_base * n`
    pub backoff_base: Duration,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(1500),
        }
    }
}

impl ThrottlePolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Delay before the attempt following attempt number `attempt` (1-based)
    ///
    /// Saturates at `Duration::MAX`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base.checked_mul(attempt).unwrap_or(Duration::MAX)
    }

    /// Sum of all waits when every attempt is throttled
    pub fn worst_case_wait(&self) -> Duration {
        (1..self.max_attempts).fold(Duration::ZERO, |total, a| {
            total.saturating_add(self.delay_after(a))
        })
    }
}

/// Failure of one attempt
#[derive(Debug)]
pub enum AttemptError<E> {
    /// The server asked us to slow down; retry if attempts remain
    Throttled,
    /// Anything else; returned immediately
    Fatal(E),
}

/// Failure of the whole retry loop
#[derive(Debug, PartialEq, Eq)]
pub enum RetryError<E> {
    Exhausted { attempts: u32 },
    Fatal(E),
}

/// Run `operation` until it succeeds, fails fatally, or stays throttled for
/// `policy.max_attempts` attempts
///
/// Sleeps only between attempts, so a fully throttled run waits
/// `base * 1 + base * 2 + ... + base * (max_attempts - 1)`.
pub async fn with_throttle_retry<T, E, F, Fut>(
    policy: ThrottlePolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("Request succeeded on attempt {} after throttling", attempt);
                }
                return Ok(value);
            }
            Err(AttemptError::Fatal(error)) => return Err(RetryError::Fatal(error)),
            Err(AttemptError::Throttled) => {
                if attempt >= max_attempts {
                    tracing::warn!("Still throttled after {} attempts, giving up", attempt);
                    return Err(RetryError::Exhausted { attempts: attempt });
                }
                let delay = policy.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Throttled, retrying after backoff"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tokio::time::Instant;

    #[test]
    fn test_policy_delays() {
        let policy = ThrottlePolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(1500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(3000));
        assert_eq!(policy.worst_case_wait(), Duration::from_millis(4500));
        assert_eq!(ThrottlePolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn test_policy_delays_saturate() {
        let policy = ThrottlePolicy::new(4, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.delay_after(1), Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.delay_after(3), Duration::MAX);
        assert_eq!(policy.delay_after(u32::MAX), Duration::MAX);
        assert_eq!(policy.worst_case_wait(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let calls = Rc::new(RefCell::new(0));
        let start = Instant::now();

        let result: Result<&str, RetryError<()>> = {
            let calls = calls.clone();
            with_throttle_retry(ThrottlePolicy::default(), move |_| {
                let calls = calls.clone();
                async move {
                    *calls.borrow_mut() += 1;
                    Ok("ok")
                }
            })
            .await
        };

        assert_eq!(result, Ok("ok"));
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_once_then_success() {
        let start = Instant::now();

        let result: Result<u32, RetryError<()>> =
            with_throttle_retry(ThrottlePolicy::default(), |attempt| async move {
                if attempt == 1 {
                    Err(AttemptError::Throttled)
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500));
        assert!(elapsed < Duration::from_millis(1600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_throttled() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let start = Instant::now();

        let result: Result<(), RetryError<()>> = {
            let calls = calls.clone();
            with_throttle_retry(ThrottlePolicy::default(), move |attempt| {
                let calls = calls.clone();
                async move {
                    calls.borrow_mut().push((attempt, Instant::now()));
                    Err(AttemptError::Throttled)
                }
            })
            .await
        };

        assert_eq!(result, Err(RetryError::Exhausted { attempts: 3 }));
        let calls = calls.borrow();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_millis(1500));
        assert_eq!(calls[2].1 - calls[1].1, Duration::from_millis(3000));
        assert_eq!(start.elapsed(), Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_is_not_retried() {
        let calls = Rc::new(RefCell::new(0));
        let start = Instant::now();

        let result: Result<(), RetryError<u16>> = {
            let calls = calls.clone();
            with_throttle_retry(ThrottlePolicy::default(), move |_| {
                let calls = calls.clone();
                async move {
                    *calls.borrow_mut() += 1;
                    Err(AttemptError::Fatal(500))
                }
            })
            .await
        };

        assert_eq!(result, Err(RetryError::Fatal(500)));
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
