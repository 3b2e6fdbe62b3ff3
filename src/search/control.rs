//! Deadlines and cancellation for long scans.
//!
//! Scans call `SearchControl::check` before every row of placements, so a
//! search over a large region with a permissive threshold can still be
//! stopped promptly.

use crate::util::{MatchError, MatchResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag a caller flips to abort in-flight searches.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels every search holding a clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns true once `cancel` has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Deadline and cancellation signal for a single search.
#[derive(Clone, Debug)]
pub struct SearchControl {
    started: Instant,
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl Default for SearchControl {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchControl {
    /// No deadline and no cancel token.
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            deadline: None,
            cancel: None,
        }
    }

    /// Stops the search at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    /// Stops the search once `token` is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails with `Cancelled` or `Timeout` once either limit is hit.
    pub fn check(&self) -> MatchResult<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(MatchError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
                return Err(MatchError::Timeout { elapsed_ms });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CancelToken, SearchControl};
    use crate::util::MatchError;
    use std::time::{Duration, Instant};

    #[test]
    fn unlimited_control_always_passes() {
        assert!(SearchControl::new().check().is_ok());
    }

    #[test]
    fn cancelled_token_stops_search() {
        let token = CancelToken::new();
        let control = SearchControl::new().with_cancel(token.clone());
        assert!(control.check().is_ok());
        token.cancel();
        assert_eq!(control.check(), Err(MatchError::Cancelled));
    }

    #[test]
    fn past_deadline_times_out() {
        let control = SearchControl::new().with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(matches!(control.check(), Err(MatchError::Timeout { .. })));
    }
}
