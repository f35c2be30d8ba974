//! Single-flight refresh coordination.
//!
//! ARCHITECTURE
//! ============
//! One `RefreshCoordinator` per `ResilientClient`. A caller that hits a 401
//! calls [`RefreshCoordinator::join`]: the first caller while `Idle` becomes
//! the leader and flips the phase to `Refreshing` inside the same critical
//! section; every later caller gets a oneshot receiver appended to the queue.
//! The leader runs the refresh and calls [`LeaderGuard::settle`], which flips
//! back to `Idle` and takes the whole queue in one critical section, then
//! answers the waiters front-to-back.
//!
//! INVARIANTS
//! ==========
//! - At most one leader exists at a time.
//! - The queue is non-empty only while `Refreshing`; `settle` empties it in
//!   the same lock scope that sets `Idle`.
//! - The lock is never held across an `.await`.

#[cfg(test)]
#[path = "refresh_test.rs"]
mod tests;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use super::types::ClientError;

/// Outcome delivered to every waiter when the in-flight refresh settles.
pub type RefreshOutcome = Result<(), ClientError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Refreshing,
}

struct CoordinatorState {
    phase: Phase,
    queue: VecDeque<oneshot::Sender<RefreshOutcome>>,
}

pub struct RefreshCoordinator {
    state: Mutex<CoordinatorState>,
}

/// What a caller must do after joining.
pub enum Ticket<'a> {
    /// Run the refresh, then settle through the guard.
    Leader(LeaderGuard<'a>),
    /// Wait for the leader's outcome.
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self { state: Mutex::new(CoordinatorState { phase: Phase::Idle, queue: VecDeque::new() }) }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Observe the phase and either take leadership or enqueue, atomically.
    pub fn join(&self) -> Ticket<'_> {
        let mut state = self.lock();
        match state.phase {
            Phase::Idle => {
                state.phase = Phase::Refreshing;
                Ticket::Leader(LeaderGuard { coordinator: self, settled: false })
            }
            Phase::Refreshing => {
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(tx);
                Ticket::Waiter(rx)
            }
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Number of callers currently waiting on the in-flight refresh.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.phase = Phase::Idle;
            std::mem::take(&mut state.queue)
        };
        let count = waiters.len();
        for tx in waiters {
            // Receiver gone means the caller stopped waiting; nothing to do.
            let _ = tx.send(outcome.clone());
        }
        count
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Leadership of the in-flight refresh.
///
/// Dropping an unsettled guard (leader future cancelled or panicked) settles
/// with a failure so waiters are never stranded and the phase returns to `Idle`.
pub struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    /// Return to `Idle` and answer every queued waiter in enqueue order.
    /// Returns how many waiters were answered.
    pub fn settle(mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("refresh leader dropped before settling; failing waiters");
            self.coordinator
                .settle(&Err(ClientError::RefreshFailed("refresh abandoned".into())));
        }
    }
}
