//! Optimistic-concurrency push loop
//!
//! Each attempt prepares its candidate from the freshly fetched remote head
//! and pushes with a lease. A rejected push sleeps a random delay and tries
//! again, up to the configured number of attempts. Errors other than a
//! rejection end the loop immediately.

use crate::config::SyncConfig;
use crate::error::{ReleaseError, Result};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::cell::RefCell;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// Blocks the current run between attempts
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested delays without sleeping
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|d| d.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        let mut delays = self.delays.lock().unwrap_or_else(|e| e.into_inner());
        delays.push(duration);
    }
}

/// How many times to push and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(sync: &SyncConfig) -> Self {
        RetryPolicy {
            max_attempts: sync.push_attempts.max(1),
            min_delay: Duration::from_secs(sync.backoff_min_secs),
            max_delay: Duration::from_secs(sync.backoff_max_secs.max(sync.backoff_min_secs)),
        }
    }

    /// Random delay in `[min_delay, max_delay]`
    pub fn delay<G: Rng + ?Sized>(&self, rng: &mut G) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        if max <= min {
            return self.min_delay;
        }
        Duration::from_millis(rng.random_range(min..=max))
    }
}

/// Result of one push attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    /// The attempt finished; no retry needed
    Done(T),
    /// The lease was stale or the server refused; try again
    Rejected(String),
}

/// Runs push attempts until one is not rejected
pub struct PushRetrier {
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
    rng: RefCell<Box<dyn RngCore>>,
}

impl PushRetrier {
    /// Thread sleeper and an OS-seeded random source
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with(policy, ThreadSleeper, StdRng::from_os_rng())
    }

    pub fn with(
        policy: RetryPolicy,
        sleeper: impl Sleeper + 'static,
        rng: impl RngCore + 'static,
    ) -> Self {
        PushRetrier {
            policy,
            sleeper: Box::new(sleeper),
            rng: RefCell::new(Box::new(rng)),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call `attempt` with the 1-based attempt number until it is not rejected
    pub fn run<T>(&self, what: &str, mut attempt: impl FnMut(u32) -> Result<Attempt<T>>) -> Result<T> {
        let mut last_reason = String::new();

        for number in 1..=self.policy.max_attempts {
            match attempt(number)? {
                Attempt::Done(value) => {
                    if number > 1 {
                        info!(what, attempt = number, "push succeeded after retry");
                    }
                    return Ok(value);
                }
                Attempt::Rejected(reason) => {
                    warn!(what, attempt = number, %reason, "push rejected");
                    last_reason = reason;
                    if number < self.policy.max_attempts {
                        let delay = {
                            let mut rng = self.rng.borrow_mut();
                            self.policy.delay(&mut *rng)
                        };
                        self.sleeper.sleep(delay);
                    }
                }
            }
        }

        Err(ReleaseError::remote(format!(
            "{}: push rejected {} times, last: {}",
            what, self.policy.max_attempts, last_reason
        )))
    }
}

impl Default for PushRetrier {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrier(sleeper: &RecordingSleeper) -> PushRetrier {
        PushRetrier::with(RetryPolicy::default(), sleeper.clone(), StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_delay_stays_in_window() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let delay = policy.delay(&mut rng);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_secs(3));
        }
    }

    #[test]
    fn test_first_success_does_not_sleep() {
        let sleeper = RecordingSleeper::new();
        let value = retrier(&sleeper)
            .run("main", |_| Ok(Attempt::Done(5)))
            .unwrap();
        assert_eq!(value, 5);
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn test_retries_after_rejection() {
        let sleeper = RecordingSleeper::new();
        let value = retrier(&sleeper)
            .run("main", |n| {
                if n < 3 {
                    Ok(Attempt::Rejected("stale".to_string()))
                } else {
                    Ok(Attempt::Done(n))
                }
            })
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let sleeper = RecordingSleeper::new();
        let mut calls = 0;
        let err = retrier(&sleeper)
            .run::<()>("beta", |_| {
                calls += 1;
                Ok(Attempt::Rejected("stale".to_string()))
            })
            .unwrap_err();

        assert_eq!(calls, 3);
        // no sleep after the final attempt
        assert_eq!(sleeper.delays().len(), 2);
        assert!(err.to_string().contains("rejected 3 times"));
    }

    #[test]
    fn test_errors_are_not_retried() {
        let sleeper = RecordingSleeper::new();
        let mut calls = 0;
        let result = retrier(&sleeper).run::<()>("main", |_| {
            calls += 1;
            Err(ReleaseError::backend("fetch failed"))
        });

        assert!(matches!(result, Err(ReleaseError::BackendUnavailable(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from_config(&SyncConfig::default());
        assert_eq!(policy, RetryPolicy::default());
    }
}
