//! Cooperative cancellation for long searches.
//!
//! Workers poll a [SearchBudget] every few thousand candidates; nothing is
//! interrupted preemptively.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag a caller flips to stop a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Why a search stopped before covering the whole candidate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Cancelled,
    DeadlineExceeded,
}

/// Optional cancellation token plus optional deadline. The default budget never interrupts.
#[derive(Debug, Clone, Default)]
pub struct SearchBudget {
    token: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl SearchBudget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancellation wins over an expired deadline when both apply.
    pub fn check(&self) -> Option<Interruption> {
        if self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(Interruption::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interruption::DeadlineExceeded),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_budget_never_interrupts() {
        assert_eq!(SearchBudget::unlimited().check(), None);
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancelToken::new();
        let budget = SearchBudget::unlimited().with_token(token.clone());
        assert_eq!(budget.check(), None);
        token.cancel();
        assert_eq!(budget.check(), Some(Interruption::Cancelled));
    }

    #[test]
    fn past_deadline_is_exceeded() {
        let budget = SearchBudget::unlimited().with_deadline(Instant::now());
        assert_eq!(budget.check(), Some(Interruption::DeadlineExceeded));
    }

    #[test]
    fn cancellation_takes_precedence_over_deadline() {
        let token = CancelToken::new();
        token.cancel();
        let budget = SearchBudget::unlimited()
            .with_deadline(Instant::now())
            .with_token(token);
        assert_eq!(budget.check(), Some(Interruption::Cancelled));
    }
}
