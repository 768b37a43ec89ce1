//! Cancellable handles for asynchronous invocations.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::connector::{ConnectorError, ConnectorResult};
use crate::lifecycle::CancellationToken;

/// Observable state of an [`AsyncInvocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl InvocationState {
    pub fn is_terminal(self) -> bool {
        self != InvocationState::Pending
    }
}

enum Slot<T> {
    Pending,
    Completed(T),
    Failed(ConnectorError),
    Cancelled,
    /// The outcome has been handed to a waiter.
    Taken(InvocationState),
}

impl<T> Slot<T> {
    fn state(&self) -> InvocationState {
        match self {
            Slot::Pending => InvocationState::Pending,
            Slot::Completed(_) => InvocationState::Completed,
            Slot::Failed(_) => InvocationState::Failed,
            Slot::Cancelled => InvocationState::Cancelled,
            Slot::Taken(state) => *state,
        }
    }
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
    done: Condvar,
    cancel: CancellationToken,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        // A poisoned slot still holds a coherent state machine value.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle to an invocation executing on a connector-owned worker.
///
/// The handle moves from `Pending` to exactly one of `Completed`, `Failed` or
/// `Cancelled`. Cancelling fires the shared [`CancellationToken`], so the
/// transport stops reading instead of only muting the result.
pub struct AsyncInvocation<T> {
    shared: Arc<Shared<T>>,
}

/// Producer side of an [`AsyncInvocation`], owned by the worker.
///
/// Dropping a completer without calling [`Completer::complete`] fails the
/// handle with [`ConnectorError::Abandoned`].
pub struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> AsyncInvocation<T> {
    /// Create a pending handle and the completer that resolves it.
    pub fn pending() -> (Self, Completer<T>) {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::Pending),
            done: Condvar::new(),
            cancel: CancellationToken::new(),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            Completer {
                shared: Some(shared),
            },
        )
    }

    /// Cancel a pending invocation.
    ///
    /// Returns `false` when the invocation had already reached a terminal state.
    pub fn cancel(&self) -> bool {
        let mut slot = self.shared.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = Slot::Cancelled;
        drop(slot);

        self.shared.cancel.cancel();
        self.shared.done.notify_all();
        tracing::debug!("Invocation cancelled");
        true
    }

    pub fn state(&self) -> InvocationState {
        self.shared.lock().state()
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Block up to `timeout` for a terminal state and return the state observed.
    pub fn wait_timeout(&self, timeout: Duration) -> InvocationState {
        let deadline = Instant::now() + timeout;
        let mut slot = self.shared.lock();
        while matches!(*slot, Slot::Pending) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            slot = match self.shared.done.wait_timeout(slot, deadline - now) {
                Ok((guard, _)) => guard,
                Err(e) => e.into_inner().0,
            };
        }
        slot.state()
    }

    /// Block until the invocation finishes and return its outcome.
    pub fn wait(self) -> ConnectorResult<T> {
        let mut slot = self.shared.lock();
        while matches!(*slot, Slot::Pending) {
            slot = self
                .shared
                .done
                .wait(slot)
                .unwrap_or_else(|e| e.into_inner());
        }
        let state = slot.state();
        match std::mem::replace(&mut *slot, Slot::Taken(state)) {
            Slot::Completed(value) => Ok(value),
            Slot::Failed(error) => Err(error),
            Slot::Cancelled => Err(ConnectorError::Cancelled),
            Slot::Taken(_) | Slot::Pending => Err(ConnectorError::Abandoned),
        }
    }
}

impl<T> fmt::Debug for AsyncInvocation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncInvocation")
            .field("state", &self.state())
            .finish()
    }
}

impl<T> Completer<T> {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared
            .as_ref()
            .map(|s| s.cancel.clone())
            .unwrap_or_default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|s| matches!(*s.lock(), Slot::Cancelled))
    }

    /// Resolve the handle. Returns `false` if it was already terminal, in which
    /// case `result` is dropped.
    pub fn complete(mut self, result: ConnectorResult<T>) -> bool {
        match self.shared.take() {
            Some(shared) => Self::transition(&shared, result),
            None => false,
        }
    }

    fn transition(shared: &Shared<T>, result: ConnectorResult<T>) -> bool {
        let mut slot = shared.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = match result {
            Ok(value) => Slot::Completed(value),
            Err(error) => Slot::Failed(error),
        };
        drop(slot);
        shared.done.notify_all();
        true
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            if Self::transition(&shared, Err(ConnectorError::Abandoned)) {
                tracing::warn!("Invocation worker finished without completing its handle");
            }
        }
    }
}
