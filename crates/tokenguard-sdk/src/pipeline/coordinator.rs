//! Single-flight credential refresh
//!
//! [`RefreshCoordinator`] is a two-state machine:
//!
//! - `Idle`: the first caller to ask for a refresh flips the state to
//!   `Refreshing` inside the same critical section that observed `Idle`, then
//!   performs the one refresh call. It is the *leader*.
//! - `Refreshing`: every later caller is appended to a FIFO queue and parks on
//!   a oneshot receiver. No second refresh call is issued.
//!
//! When the refresh settles the leader writes (or clears) the stored
//! credential, then releases the whole queue in arrival order with the same
//! outcome and returns the state to `Idle`, all under one lock acquisition.
//! The lock is a plain mutex and is never held across an `.await`.

use crate::auth::{
    AuthError, AuthResult, Credential, CredentialStore, Refresher, SessionEndReason, SessionEvent,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

type Outcome = AuthResult<Credential>;

/// A caller parked behind an in-flight refresh
struct PendingCall {
    ticket: u64,
    waker: oneshot::Sender<Outcome>,
}

enum RefreshState {
    Idle,
    Refreshing { queue: VecDeque<PendingCall> },
}

enum Role {
    Leader,
    Waiter {
        ticket: u64,
        receiver: oneshot::Receiver<Outcome>,
    },
}

/// Guarantees at most one outstanding refresh call per client
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    refresher: Arc<dyn Refresher>,
    store: Arc<dyn CredentialStore>,
    events: broadcast::Sender<SessionEvent>,
    refresh_timeout: Duration,
    refreshes: AtomicU64,
    next_ticket: AtomicU64,
}

impl RefreshCoordinator {
    /// Capacity of the session event channel
    const EVENT_CAPACITY: usize = 16;

    /// Times a waiter re-enters after its leader was dropped
    pub const MAX_TAKEOVERS: usize = 3;

    pub fn new(
        refresher: Arc<dyn Refresher>,
        store: Arc<dyn CredentialStore>,
        refresh_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(Self::EVENT_CAPACITY);
        Self {
            state: Mutex::new(RefreshState::Idle),
            refresher,
            store,
            events,
            refresh_timeout,
            refreshes: AtomicU64::new(0),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Obtain a fresh credential, either by leading a new refresh or by
    /// joining the one already in flight.
    ///
    /// A missing stored credential does not skip the refresh: the endpoint
    /// may authenticate through a session cookie instead.
    ///
    /// If the leader is dropped before its refresh settles, waiters re-enter
    /// and one of them leads a new refresh, up to [`Self::MAX_TAKEOVERS`]
    /// times. Only then is [`AuthError::RefreshAborted`] returned.
    pub async fn refresh(&self) -> AuthResult<Credential> {
        let mut takeovers = 0;
        loop {
            let (ticket, receiver) = match self.enter() {
                Role::Leader => return self.lead().await,
                Role::Waiter { ticket, receiver } => (ticket, receiver),
            };

            debug!(ticket, "Refresh already in flight, waiting");
            match receiver.await.unwrap_or(Err(AuthError::RefreshAborted)) {
                Err(AuthError::RefreshAborted) if takeovers < Self::MAX_TAKEOVERS => {
                    takeovers += 1;
                    debug!(ticket, takeovers, "Refresh leader went away, re-entering");
                }
                outcome => return outcome,
            }
        }
    }

    /// Whether a refresh is currently in flight
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Number of callers parked behind the in-flight refresh
    pub fn queued(&self) -> usize {
        match &*self.state.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { queue } => queue.len(),
        }
    }

    /// Total refresh calls issued by this coordinator
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub(crate) fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Decide this caller's role in one critical section
    fn enter(&self) -> Role {
        let mut state = self.state.lock();
        match &mut *state {
            RefreshState::Idle => {
                *state = RefreshState::Refreshing {
                    queue: VecDeque::new(),
                };
                Role::Leader
            }
            RefreshState::Refreshing { queue } => {
                let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                let (waker, receiver) = oneshot::channel();
                queue.push_back(PendingCall { ticket, waker });
                Role::Waiter { ticket, receiver }
            }
        }
    }

    async fn lead(&self) -> Outcome {
        let mut leader = LeaderGuard {
            coordinator: self,
            settled: false,
        };

        let attempt = self.refreshes.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            attempt,
            refresher = self.refresher.name(),
            "Starting credential refresh"
        );

        let outcome = match tokio::time::timeout(self.refresh_timeout, self.refresher.refresh()).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AuthError::RefreshTimeout(self.refresh_timeout)),
        };

        let outcome = match outcome {
            Ok(credential) => self
                .store
                .set(credential.clone())
                .await
                .map(|()| credential),
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            warn!(error = %e, "Credential refresh failed, ending session");
            if let Err(clear_err) = self.store.clear().await {
                warn!(error = %clear_err, "Failed to clear credential after refresh failure");
            }
        }

        let released = leader.settle(&outcome);

        match &outcome {
            Ok(_) => {
                info!(released, "Credential refreshed, replaying queued requests");
                self.emit(SessionEvent::Refreshed);
            }
            Err(e) => {
                debug!(released, "Rejected queued requests");
                self.emit(SessionEvent::Ended {
                    reason: SessionEndReason::RefreshFailed(e.clone()),
                });
            }
        }

        outcome
    }

    /// Release every queued caller in arrival order and return to `Idle`
    fn drain(&self, outcome: &Outcome) -> usize {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing { queue } => {
                let released = queue.len();
                for call in queue {
                    debug!(ticket = call.ticket, "Releasing queued request");
                    // The waiter may have been cancelled; nothing to do then
                    let _ = call.waker.send(outcome.clone());
                }
                released
            }
            RefreshState::Idle => 0,
        }
    }

    #[cfg(test)]
    fn queued_tickets(&self) -> Vec<u64> {
        match &*self.state.lock() {
            RefreshState::Idle => Vec::new(),
            RefreshState::Refreshing { queue } => queue.iter().map(|c| c.ticket).collect(),
        }
    }
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("queued", &self.queued())
            .field("refreshes", &self.refresh_count())
            .field("refresh_timeout", &self.refresh_timeout)
            .finish()
    }
}

/// Settles the coordinator if the leading future is dropped mid-refresh,
/// so waiters are never stranded and the state returns to `Idle`.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(&mut self, outcome: &Outcome) -> usize {
        self.settled = true;
        self.coordinator.drain(outcome)
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh leader dropped before the refresh settled, releasing waiters");
            self.coordinator.drain(&Err(AuthError::RefreshAborted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    /// Refresher that blocks until the test opens the gate
    struct GatedRefresher {
        calls: AtomicUsize,
        gate: Semaphore,
        outcome: Outcome,
    }

    impl GatedRefresher {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Semaphore::new(0),
                outcome,
            })
        }

        fn open(&self) {
            self.gate.add_permits(1024);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Refresher for GatedRefresher {
        async fn refresh(&self) -> AuthResult<Credential> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| AuthError::RefreshAborted)?;
            self.outcome.clone()
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    /// Refresher that never answers
    struct HangingRefresher;

    #[async_trait]
    impl Refresher for HangingRefresher {
        async fn refresh(&self) -> AuthResult<Credential> {
            std::future::pending().await
        }

        fn name(&self) -> &str {
            "hanging"
        }
    }

    fn coordinator(
        refresher: Arc<dyn Refresher>,
        store: Arc<MemoryCredentialStore>,
    ) -> Arc<RefreshCoordinator> {
        Arc::new(RefreshCoordinator::new(
            refresher,
            store,
            Duration::from_secs(30),
        ))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..10_000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    fn spawn_callers(
        coordinator: &Arc<RefreshCoordinator>,
        n: usize,
    ) -> Vec<tokio::task::JoinHandle<Outcome>> {
        (0..n)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.refresh().await })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let store = Arc::new(MemoryCredentialStore::with_credential("tok_1"));
        let refresher = GatedRefresher::new(Ok(Credential::new("tok_2")));
        let coordinator = coordinator(refresher.clone(), store.clone());

        let callers = spawn_callers(&coordinator, 5);
        wait_until(|| coordinator.queued() == 4).await;
        assert!(coordinator.is_refreshing());
        assert_eq!(refresher.calls(), 1);

        refresher.open();
        for caller in callers {
            assert_eq!(caller.await.unwrap().unwrap(), Credential::new("tok_2"));
        }

        assert_eq!(refresher.calls(), 1);
        assert_eq!(coordinator.refresh_count(), 1);
        assert!(!coordinator.is_refreshing());
        assert_eq!(store.get().await.unwrap(), Some(Credential::new("tok_2")));
    }

    #[tokio::test]
    async fn test_queue_preserves_arrival_order() {
        let store = Arc::new(MemoryCredentialStore::new());
        let refresher = GatedRefresher::new(Ok(Credential::new("tok_2")));
        let coordinator = coordinator(refresher.clone(), store);

        let callers = spawn_callers(&coordinator, 4);
        wait_until(|| coordinator.queued() == 3).await;

        let tickets = coordinator.queued_tickets();
        let mut sorted = tickets.clone();
        sorted.sort_unstable();
        assert_eq!(tickets, sorted);

        refresher.open();
        for caller in callers {
            caller.await.unwrap().unwrap();
        }
        assert!(coordinator.queued_tickets().is_empty());
    }

    #[tokio::test]
    async fn test_failure_rejects_everyone_and_clears_store() {
        let store = Arc::new(MemoryCredentialStore::with_credential("tok_1"));
        let failure = AuthError::RefreshRejected {
            status: 401,
            message: "refresh cookie expired".into(),
        };
        let refresher = GatedRefresher::new(Err(failure.clone()));
        let coordinator = coordinator(refresher.clone(), store.clone());
        let mut events = coordinator.subscribe();

        let callers = spawn_callers(&coordinator, 3);
        wait_until(|| coordinator.queued() == 2).await;

        refresher.open();
        for caller in callers {
            assert_eq!(caller.await.unwrap(), Err(failure.clone()));
        }

        assert_eq!(refresher.calls(), 1);
        assert_eq!(store.get().await.unwrap(), None);
        assert!(!coordinator.is_refreshing());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Ended {
                reason: SessionEndReason::RefreshFailed(failure),
            }
        );
    }

    #[tokio::test]
    async fn test_returns_to_idle_and_refreshes_again() {
        let store = Arc::new(MemoryCredentialStore::with_credential("tok_1"));
        let refresher = GatedRefresher::new(Ok(Credential::new("tok_2")));
        refresher.open();
        let coordinator = coordinator(refresher.clone(), store);
        let mut events = coordinator.subscribe();

        coordinator.refresh().await.unwrap();
        assert!(!coordinator.is_refreshing());
        coordinator.refresh().await.unwrap();

        assert_eq!(refresher.calls(), 2);
        assert_eq!(coordinator.refresh_count(), 2);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Refreshed);
    }

    #[tokio::test]
    async fn test_refreshes_without_stored_credential() {
        let store = Arc::new(MemoryCredentialStore::new());
        let refresher = GatedRefresher::new(Ok(Credential::new("tok_cookie")));
        refresher.open();
        let coordinator = coordinator(refresher.clone(), store.clone());

        let credential = coordinator.refresh().await.unwrap();

        assert_eq!(credential, Credential::new("tok_cookie"));
        assert_eq!(refresher.calls(), 1);
        assert_eq!(store.get().await.unwrap(), Some(credential));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_refresh_times_out_for_all_waiters() {
        let store = Arc::new(MemoryCredentialStore::with_credential("tok_1"));
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::new(HangingRefresher),
            store.clone(),
            Duration::from_secs(5),
        ));

        let callers = spawn_callers(&coordinator, 3);
        for caller in callers {
            assert_eq!(
                caller.await.unwrap(),
                Err(AuthError::RefreshTimeout(Duration::from_secs(5)))
            );
        }

        assert!(!coordinator.is_refreshing());
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_waiter_takes_over_from_dropped_leader() {
        let store = Arc::new(MemoryCredentialStore::with_credential("tok_1"));
        let refresher = GatedRefresher::new(Ok(Credential::new("tok_2")));
        let coordinator = coordinator(refresher.clone(), store.clone());

        let leader = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        wait_until(|| refresher.calls() == 1).await;

        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        };
        wait_until(|| coordinator.queued() == 1).await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        // The waiter leads a second refresh; the session was never touched
        wait_until(|| refresher.calls() == 2).await;
        assert!(coordinator.is_refreshing());
        assert_eq!(store.get().await.unwrap(), Some(Credential::new("tok_1")));

        refresher.open();
        assert_eq!(waiter.await.unwrap(), Ok(Credential::new("tok_2")));
        assert!(!coordinator.is_refreshing());
        assert_eq!(store.get().await.unwrap(), Some(Credential::new("tok_2")));
    }
}
