//! Retry scheduling and per-attempt decisions.
//!
//! The attempt loop itself lives in [`Client::call`](crate::Client::call);
//! this module decides how long to wait before each attempt and what to do
//! with each classified response.

use crate::status::{Classification, StatusMatcher};
use crate::{Error, Result};
use std::time::Duration;

/// Default delays between attempts, in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: [u64; 5] = [100, 200, 400, 800, 1600];

/// Longest timeout a call may arm (`i32::MAX` milliseconds).
///
/// Larger configured timeouts are clamped to this value.
pub const MAX_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// Ordered list of delays to wait before each retry.
///
/// The first retry waits `delays[0]`, the second `delays[1]` and so on. Once
/// the list runs out, the last delay is reused.
///
/// # Examples
///
/// ```
/// use fetchwrap::RetryDelay;
/// use std::time::Duration;
///
/// let delay = RetryDelay::from_millis([100, 500]).unwrap();
/// assert_eq!(delay.delay_for_attempt(0), Duration::ZERO);
/// assert_eq!(delay.delay_for_attempt(1), Duration::from_millis(100));
/// assert_eq!(delay.delay_for_attempt(2), Duration::from_millis(500));
/// assert_eq!(delay.delay_for_attempt(7), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryDelay {
    delays: Vec<Duration>,
}

impl RetryDelay {
    /// Creates a schedule from a non-empty list of delays.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `delays` is empty.
    pub fn new(delays: impl IntoIterator<Item = Duration>) -> Result<Self> {
        let delays: Vec<Duration> = delays.into_iter().collect();
        if delays.is_empty() {
            return Err(Error::ConfigurationError(
                "Retry delay list must not be empty".to_string(),
            ));
        }
        Ok(Self { delays })
    }

    /// Creates a schedule from millisecond values.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `millis` is empty.
    pub fn from_millis(millis: impl IntoIterator<Item = u64>) -> Result<Self> {
        Self::new(millis.into_iter().map(Duration::from_millis))
    }

    /// A schedule that waits the same amount before every retry.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delays: vec![delay],
        }
    }

    /// Returns the wait before attempt `attempt` (0-indexed).
    ///
    /// The first attempt never waits.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let index = (attempt - 1).min(self.delays.len() - 1);
        self.delays[index]
    }

    /// The configured delays.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl Default for RetryDelay {
    fn default() -> Self {
        Self {
            delays: DEFAULT_RETRY_DELAY_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}

/// What the attempt loop does after classifying a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The response matched the success rules.
    Succeeded,
    /// The response is retryable and budget remains.
    RetryPending,
    /// Stop with this response; final classification decides the outcome.
    Failed,
}

/// Retry and timeout settings resolved for one call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts allowed after the first.
    pub retries: usize,
    /// Waits between attempts.
    pub delay: RetryDelay,
    /// Statuses that entitle a retry.
    pub statuses: StatusMatcher,
    /// Deadline for the armed timeout window.
    pub timeout: Option<Duration>,
    /// Re-arm the timeout window before every attempt.
    pub timeout_reset: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            delay: RetryDelay::default(),
            statuses: StatusMatcher::retryable(),
            timeout: None,
            timeout_reset: false,
        }
    }
}

impl RetryPolicy {
    /// Decides the next step after attempt `attempt` (0-indexed) was classified.
    pub fn decide(&self, classification: Classification, attempt: usize) -> Decision {
        if classification.success {
            Decision::Succeeded
        } else if classification.retryable && attempt < self.retries {
            Decision::RetryPending
        } else {
            Decision::Failed
        }
    }

    /// The timeout to arm, clamped to [`MAX_TIMEOUT`].
    pub fn armed_timeout(&self) -> Option<Duration> {
        self.timeout.map(|timeout| timeout.min(MAX_TIMEOUT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays() {
        let delay = RetryDelay::default();

        assert_eq!(delay.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(delay.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(delay.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(delay.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(delay.delay_for_attempt(4), Duration::from_millis(800));
        assert_eq!(delay.delay_for_attempt(5), Duration::from_millis(1600));
        assert_eq!(delay.delay_for_attempt(6), Duration::from_millis(1600));
    }

    #[test]
    fn test_empty_delays_rejected() {
        assert!(matches!(
            RetryDelay::new(Vec::new()),
            Err(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_decide() {
        let policy = RetryPolicy {
            retries: 2,
            ..Default::default()
        };
        let retryable = Classification {
            success: false,
            retryable: true,
        };

        assert_eq!(policy.decide(retryable, 0), Decision::RetryPending);
        assert_eq!(policy.decide(retryable, 1), Decision::RetryPending);
        assert_eq!(policy.decide(retryable, 2), Decision::Failed);

        let terminal = Classification {
            success: false,
            retryable: false,
        };
        assert_eq!(policy.decide(terminal, 0), Decision::Failed);

        let ok = Classification {
            success: true,
            retryable: true,
        };
        assert_eq!(policy.decide(ok, 0), Decision::Succeeded);
    }

    #[test]
    fn test_timeout_clamped() {
        let policy = RetryPolicy {
            timeout: Some(Duration::from_secs(60 * 60 * 24 * 365)),
            ..Default::default()
        };
        assert_eq!(policy.armed_timeout(), Some(MAX_TIMEOUT));
        assert_eq!(RetryPolicy::default().armed_timeout(), None);
    }
}
