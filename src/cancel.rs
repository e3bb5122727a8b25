//! Cancellation composition and the per-call timeout.
//!
//! Callers cancel calls with [`CancellationToken`]s. Every call composes the
//! tokens from the client layer, the call layer and the built request with one
//! internal token that only the timeout fires.

use futures::future::{self, Either};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A signal that fires as soon as any of its tokens is cancelled.
///
/// Firing is monotonic: once any token is cancelled the signal stays fired.
///
/// # Examples
///
/// ```
/// use fetchwrap::AbortSignal;
/// use fetchwrap::CancellationToken;
///
/// let a = CancellationToken::new();
/// let b = CancellationToken::new();
/// let signal = AbortSignal::any([a.clone(), b.clone()]);
///
/// assert!(!signal.is_aborted());
/// b.cancel();
/// assert!(signal.is_aborted());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    tokens: Vec<CancellationToken>,
}

impl AbortSignal {
    /// Composes `tokens` into one signal.
    pub fn any(tokens: impl IntoIterator<Item = CancellationToken>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
        }
    }

    /// Returns `true` once any composed token has been cancelled.
    pub fn is_aborted(&self) -> bool {
        self.tokens.iter().any(CancellationToken::is_cancelled)
    }

    /// Resolves when any composed token is cancelled.
    ///
    /// Never resolves for a signal with no tokens.
    pub async fn aborted(&self) {
        if self.tokens.is_empty() {
            return future::pending().await;
        }
        let waits = self.tokens.iter().map(|token| Box::pin(token.cancelled()));
        future::select_all(waits).await;
    }
}

/// Why an in-flight wait or transport call was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AbortReason {
    /// The armed timeout elapsed.
    Timeout,
    /// A caller-supplied token was cancelled.
    Cancelled,
}

/// Per-call controller owning the timeout token and the armed deadline.
#[derive(Debug)]
pub(crate) struct AbortController {
    timeout: CancellationToken,
    signal: AbortSignal,
    deadline: Option<Instant>,
}

impl AbortController {
    pub(crate) fn new(external: impl IntoIterator<Item = CancellationToken>) -> Self {
        let timeout = CancellationToken::new();
        let signal = AbortSignal::any(std::iter::once(timeout.clone()).chain(external));
        Self {
            timeout,
            signal,
            deadline: None,
        }
    }

    /// Arms a deadline `limit` from now, unless one is already armed.
    pub(crate) fn arm(&mut self, limit: Option<Duration>) {
        if self.deadline.is_some() {
            return;
        }
        self.deadline = limit.map(|limit| Instant::now() + limit);
    }

    /// Drops the armed deadline, if any.
    pub(crate) fn clear(&mut self) {
        self.deadline = None;
    }

    fn reason(&self) -> AbortReason {
        if self.timeout.is_cancelled() {
            AbortReason::Timeout
        } else {
            AbortReason::Cancelled
        }
    }

    /// Resolves when the composed signal fires or the deadline passes.
    ///
    /// A passed deadline cancels the internal token, so the composed signal
    /// stays fired afterwards.
    async fn fired(&self) -> AbortReason {
        let expiry = match self.deadline {
            Some(deadline) => Either::Left(tokio::time::sleep_until(deadline)),
            None => Either::Right(future::pending::<()>()),
        };

        tokio::select! {
            _ = self.signal.aborted() => self.reason(),
            _ = expiry => {
                self.timeout.cancel();
                AbortReason::Timeout
            }
        }
    }

    /// Sleeps for `delay`, returning early without error if the call aborts.
    pub(crate) async fn sleep(&self, delay: Duration) {
        if delay.is_zero() || self.signal.is_aborted() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.fired() => {}
        }
    }

    /// Runs `work` unless the call aborts first.
    pub(crate) async fn guard<F>(&self, work: F) -> Result<F::Output, AbortReason>
    where
        F: Future,
    {
        if self.signal.is_aborted() {
            return Err(self.reason());
        }
        tokio::select! {
            biased;
            reason = self.fired() => Err(reason),
            output = work => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_fires_on_any_token() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        let signal = AbortSignal::any([a.clone(), b.clone()]);

        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.aborted().await });
        a.cancel();
        handle.await.unwrap();

        assert!(signal.is_aborted());
        // Stays fired.
        assert!(signal.is_aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_times_out() {
        let mut controller = AbortController::new(Vec::new());
        controller.arm(Some(Duration::from_millis(50)));

        let result = controller
            .guard(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(result, Err(AbortReason::Timeout));

        // The timeout token stays cancelled.
        assert_eq!(controller.guard(async {}).await, Err(AbortReason::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_keeps_existing_deadline() {
        let mut controller = AbortController::new(Vec::new());
        controller.arm(Some(Duration::from_millis(100)));
        let first = controller.deadline;

        tokio::time::advance(Duration::from_millis(40)).await;
        controller.arm(Some(Duration::from_millis(100)));
        assert_eq!(controller.deadline, first);

        controller.clear();
        controller.arm(Some(Duration::from_millis(100)));
        assert!(controller.deadline > first);
    }

    #[tokio::test]
    async fn test_guard_external_cancel() {
        let token = CancellationToken::new();
        let controller = AbortController::new([token.clone()]);
        token.cancel();

        assert_eq!(
            controller.guard(async { 1 }).await,
            Err(AbortReason::Cancelled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_short_circuits() {
        let token = CancellationToken::new();
        let controller = AbortController::new([token.clone()]);
        let start = Instant::now();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        });
        controller.sleep(Duration::from_secs(60)).await;

        assert!(start.elapsed() < Duration::from_secs(60));
    }
}
